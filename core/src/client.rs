//! Typed client for the study API.
//!
//! # Design
//! `StudyClient` pairs a `RequestDispatcher` for writes with a `QueryCache`
//! for reads. Collection reads go through the cache. Every mutation is
//! dispatched immediately and, only on success, invalidates the collection
//! it changed, so the next read observes the server's new state. Nothing is
//! updated optimistically.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::auth::CredentialStore;
use crate::cache::{QueryCache, QueryKey};
use crate::config::ClientConfig;
use crate::dispatcher::RequestDispatcher;
use crate::error::ClientError;
use crate::http::HttpMethod;
use crate::transport::ReqwestTransport;
use crate::types::{
    Dashboard, Journal, NewJournal, NewNote, NewTask, Note, SummarizeRequest, Summary, Task,
    TaskUpdate,
};

pub const TASKS_PATH: &str = "/api/tasks";
pub const NOTES_PATH: &str = "/api/notes";
pub const JOURNALS_PATH: &str = "/api/journals";
pub const SUMMARIZE_PATH: &str = "/api/notes/summarize";

#[derive(Debug, Clone)]
pub struct StudyClient {
    dispatcher: RequestDispatcher,
    cache: QueryCache,
}

impl StudyClient {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        let cache = QueryCache::new(dispatcher.clone());
        Self { dispatcher, cache }
    }

    /// Share an existing cache (and its dispatcher).
    pub fn with_cache(cache: QueryCache) -> Self {
        Self {
            dispatcher: cache.dispatcher().clone(),
            cache,
        }
    }

    /// Client over the network transport.
    pub fn connect(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new()?;
        info!(base_url = config.base_url(), "study client ready");
        Ok(Self::new(RequestDispatcher::new(
            config,
            credentials,
            Arc::new(transport),
        )))
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    // --- tasks ---

    pub async fn tasks(&self) -> Result<Vec<Task>, ClientError> {
        self.list(TASKS_PATH).await
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, ClientError> {
        self.mutate(HttpMethod::Post, TASKS_PATH, Some(task), TASKS_PATH)
            .await
    }

    pub async fn update_task(&self, id: u64, update: &TaskUpdate) -> Result<Task, ClientError> {
        self.mutate(
            HttpMethod::Patch,
            &format!("{TASKS_PATH}/{id}"),
            Some(update),
            TASKS_PATH,
        )
        .await
    }

    /// Flip a task's `completed` flag.
    pub async fn toggle_task(&self, task: &Task) -> Result<Task, ClientError> {
        let update = TaskUpdate {
            completed: Some(!task.completed),
            ..TaskUpdate::default()
        };
        self.update_task(task.id, &update).await
    }

    pub async fn delete_task(&self, id: u64) -> Result<(), ClientError> {
        self.remove(&format!("{TASKS_PATH}/{id}"), TASKS_PATH).await
    }

    // --- notes ---

    pub async fn notes(&self) -> Result<Vec<Note>, ClientError> {
        self.list(NOTES_PATH).await
    }

    pub async fn create_note(&self, note: &NewNote) -> Result<Note, ClientError> {
        self.mutate(HttpMethod::Post, NOTES_PATH, Some(note), NOTES_PATH)
            .await
    }

    pub async fn delete_note(&self, id: u64) -> Result<(), ClientError> {
        self.remove(&format!("{NOTES_PATH}/{id}"), NOTES_PATH).await
    }

    pub async fn summarize_note(&self, note_id: u64) -> Result<Summary, ClientError> {
        self.mutate(
            HttpMethod::Post,
            SUMMARIZE_PATH,
            Some(&SummarizeRequest { note_id }),
            NOTES_PATH,
        )
        .await
    }

    // --- journals ---

    pub async fn journals(&self) -> Result<Vec<Journal>, ClientError> {
        self.list(JOURNALS_PATH).await
    }

    pub async fn create_journal(&self, journal: &NewJournal) -> Result<Journal, ClientError> {
        self.mutate(HttpMethod::Post, JOURNALS_PATH, Some(journal), JOURNALS_PATH)
            .await
    }

    /// Load the three dashboard collections concurrently.
    pub async fn dashboard(&self) -> Result<Dashboard, ClientError> {
        let (tasks, notes, journals) =
            futures::try_join!(self.tasks(), self.notes(), self.journals())?;
        Ok(Dashboard {
            tasks,
            notes,
            journals,
        })
    }

    // A collection read; an empty payload is an empty collection.
    async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ClientError> {
        let payload = self.cache.get(&QueryKey::new(path)).await?;
        Ok(payload.deserialize::<Option<Vec<T>>>()?.unwrap_or_default())
    }

    async fn mutate<B, T>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        invalidates: &str,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = self.dispatcher.request(method, path, body).await?;
        self.cache.invalidate(&QueryKey::new(invalidates));
        payload.deserialize()
    }

    async fn remove(&self, path: &str, invalidates: &str) -> Result<(), ClientError> {
        self.dispatcher
            .request::<()>(HttpMethod::Delete, path, None)
            .await?;
        self.cache.invalidate(&QueryKey::new(invalidates));
        Ok(())
    }
}

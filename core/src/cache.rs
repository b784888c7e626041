//! Keyed query cache over the dispatcher's read path.
//!
//! # Design
//! Entries are keyed by request path and live until invalidated, removed or
//! cleared; with the default options elapsed time never makes an entry
//! stale. A read of a fresh entry does no I/O. Any other read either starts
//! a fetch or joins the fetch already in flight for that path, so concurrent
//! identical reads cost one network call. Fetches run on a spawned task and
//! complete even if every reader goes away.
//!
//! Writes never pass through here. After a mutation the caller invalidates
//! the affected keys and the next read fetches again.
//!
//! Must be used from within a tokio runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, trace, warn};

use crate::dispatcher::{OnUnauthorized, RequestDispatcher};
use crate::error::ClientError;
use crate::payload::Payload;

/// Identifies a cacheable read. The single segment is the request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self(vec![path.into()])
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The request path. Keys with zero or several segments are rejected.
    pub fn path(&self) -> Result<&str, ClientError> {
        match self.0.as_slice() {
            [path] if !path.is_empty() => Ok(path),
            _ => Err(ClientError::InvalidQueryKey(self.to_string())),
        }
    }
}

impl From<&str> for QueryKey {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{segment:?}")?;
        }
        write!(f, "]")
    }
}

/// Cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Age after which a fresh entry is refetched; `None` never expires.
    pub stale_time: Option<Duration>,
    /// Whether `QueryCache::notify_focus` invalidates everything.
    pub refetch_on_focus: bool,
    /// Extra attempts after a failed fetch (transport errors and 5xx only).
    pub retry: u32,
    /// Policy for reads made through `QueryCache::get`.
    pub on_unauthorized: OnUnauthorized,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: None,
            refetch_on_focus: false,
            retry: 0,
            on_unauthorized: OnUnauthorized::Throw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Fresh,
    Stale,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    /// Payload of the most recent successful fetch, `Empty` if none.
    pub data: Payload,
    /// When `data` was fetched.
    pub fetched_at: Option<DateTime<Utc>>,
    pub status: EntryStatus,
    /// Error of the most recent fetch, if it failed.
    pub error: Option<ClientError>,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Payload, ClientError>>>;

struct InFlight {
    id: u64,
    outcome: SharedFetch,
}

#[derive(Default)]
struct Slot {
    entry: Option<CachedEntry>,
    in_flight: Option<InFlight>,
    failed_at: Option<DateTime<Utc>>,
}

struct Inner {
    dispatcher: RequestDispatcher,
    options: QueryOptions,
    slots: Mutex<HashMap<String, Slot>>,
    next_fetch: AtomicU64,
}

/// The application's query cache. Clones share the same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("dispatcher", &self.inner.dispatcher)
            .field("options", &self.inner.options)
            .field("entries", &self.inner.lock().len())
            .finish()
    }
}

impl QueryCache {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self::with_options(dispatcher, QueryOptions::default())
    }

    pub fn with_options(dispatcher: RequestDispatcher, options: QueryOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatcher,
                options,
                slots: Mutex::new(HashMap::new()),
                next_fetch: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> &QueryOptions {
        &self.inner.options
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.inner.dispatcher
    }

    /// Read `key` with the cache's default unauthorized policy.
    pub async fn get(&self, key: &QueryKey) -> Result<Payload, ClientError> {
        self.query(key, self.inner.options.on_unauthorized).await
    }

    /// Read `key`, serving a fresh entry from memory and fetching otherwise.
    ///
    /// Entries hold the raw outcome of their last fetch. `on_unauthorized`
    /// applies to this read only: a cached 401 is `Empty` for a `ReturnNull`
    /// reader and refetched for a `Throw` reader.
    pub async fn query(
        &self,
        key: &QueryKey,
        on_unauthorized: OnUnauthorized,
    ) -> Result<Payload, ClientError> {
        let path = key.path()?;
        let fetch = {
            let mut slots = self.inner.lock();
            let slot = slots.entry(path.to_string()).or_default();
            if let Some(data) = self.inner.serve(slot, on_unauthorized) {
                trace!(path, "cache hit");
                return Ok(data);
            }
            if let Some(in_flight) = &slot.in_flight {
                debug!(path, fetch = in_flight.id, "joining in-flight fetch");
                in_flight.outcome.clone()
            } else {
                let in_flight = Inner::start_fetch(&self.inner, path);
                let outcome = in_flight.outcome.clone();
                slot.in_flight = Some(in_flight);
                outcome
            }
        };
        on_unauthorized.apply(fetch.await)
    }

    /// Mark every entry at or under `prefix` stale. Returns how many paths
    /// were affected. Does no I/O.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let prefix = match prefix.path() {
            Ok(prefix) => prefix,
            Err(err) => {
                warn!(error = %err, "ignoring invalidation");
                return 0;
            }
        };
        let count = self.inner.invalidate_where(|path| path_matches(path, prefix));
        debug!(prefix, count, "invalidated");
        count
    }

    pub fn invalidate_all(&self) -> usize {
        let count = self.inner.invalidate_where(|_| true);
        debug!(count, "invalidated all entries");
        count
    }

    /// Handle the application regaining focus.
    pub fn notify_focus(&self) -> usize {
        if self.inner.options.refetch_on_focus {
            self.invalidate_all()
        } else {
            0
        }
    }

    /// Drop the entry for `key` entirely.
    pub fn remove(&self, key: &QueryKey) -> Option<CachedEntry> {
        let path = key.path().ok()?;
        self.inner.lock().remove(path).and_then(|slot| slot.entry)
    }

    /// Drop every entry, e.g. at logout.
    pub fn clear(&self) {
        self.inner.lock().clear();
        debug!("query cache cleared");
    }

    /// Current entry for `key`, without fetching.
    pub fn peek(&self, key: &QueryKey) -> Option<CachedEntry> {
        let path = key.path().ok()?;
        self.inner.lock().get(path).and_then(|slot| slot.entry.clone())
    }

    pub fn status(&self, key: &QueryKey) -> Option<EntryStatus> {
        self.peek(key).map(|entry| entry.status)
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        let Ok(path) = key.path() else {
            return false;
        };
        self.inner
            .lock()
            .get(path)
            .is_some_and(|slot| slot.in_flight.is_some())
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // What a reader with `on_unauthorized` gets from `slot` without I/O.
    fn serve(&self, slot: &Slot, on_unauthorized: OnUnauthorized) -> Option<Payload> {
        let entry = slot.entry.as_ref()?;
        match entry.status {
            EntryStatus::Fresh if self.within_stale_time(entry.fetched_at) => {
                Some(entry.data.clone())
            }
            EntryStatus::Error
                if on_unauthorized == OnUnauthorized::ReturnNull
                    && entry.error.as_ref().is_some_and(ClientError::is_unauthorized)
                    && self.within_stale_time(slot.failed_at) =>
            {
                Some(Payload::Empty)
            }
            _ => None,
        }
    }

    fn within_stale_time(&self, since: Option<DateTime<Utc>>) -> bool {
        match (self.options.stale_time, since) {
            (None, _) => true,
            (Some(stale_time), Some(since)) => match chrono::Duration::from_std(stale_time) {
                Ok(stale_time) => Utc::now() - since <= stale_time,
                Err(_) => true,
            },
            (Some(_), None) => false,
        }
    }

    // Called with the slot map locked; the spawned task only settles after
    // the caller has stored the returned `InFlight` and released the lock.
    fn start_fetch(this: &Arc<Self>, path: &str) -> InFlight {
        let id = this.next_fetch.fetch_add(1, Ordering::Relaxed);
        debug!(path, fetch = id, "cache miss, fetching");

        let task = {
            let inner = Arc::clone(this);
            let path = path.to_string();
            tokio::spawn(async move {
                let outcome = inner.fetch_with_retry(&path).await;
                inner.settle(&path, id, &outcome);
                outcome
            })
        };

        let inner = Arc::clone(this);
        let path = path.to_string();
        let outcome = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let outcome = Err(ClientError::Transport(format!("fetch task failed: {join_err}")));
                    inner.settle(&path, id, &outcome);
                    outcome
                }
            }
        }
        .boxed()
        .shared();

        InFlight { id, outcome }
    }

    async fn fetch_with_retry(&self, path: &str) -> Result<Payload, ClientError> {
        let mut attempt = 0;
        loop {
            let outcome = self.dispatcher.fetch(path, OnUnauthorized::Throw).await;
            match outcome {
                Err(err) if attempt < self.options.retry && is_retryable(&err) => {
                    attempt += 1;
                    debug!(path, attempt, error = %err, "retrying fetch");
                }
                outcome => return outcome,
            }
        }
    }

    fn settle(&self, path: &str, id: u64, outcome: &Result<Payload, ClientError>) {
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(path) else {
            trace!(path, fetch = id, "entry removed while fetching");
            return;
        };
        if slot.in_flight.as_ref().map(|f| f.id) != Some(id) {
            trace!(path, fetch = id, "detached fetch finished");
            return;
        }
        slot.in_flight = None;

        slot.failed_at = outcome.is_err().then(Utc::now);
        slot.entry = Some(match outcome.clone() {
            Ok(data) => CachedEntry {
                data,
                fetched_at: Some(Utc::now()),
                status: EntryStatus::Fresh,
                error: None,
            },
            Err(err) => {
                let (data, fetched_at) = match slot.entry.take() {
                    Some(previous) => (previous.data, previous.fetched_at),
                    None => (Payload::Empty, None),
                };
                CachedEntry {
                    data,
                    fetched_at,
                    status: EntryStatus::Error,
                    error: Some(err),
                }
            }
        });
    }

    fn invalidate_where(&self, matches: impl Fn(&str) -> bool) -> usize {
        let mut count = 0;
        for (path, slot) in self.lock().iter_mut() {
            if !matches(path) {
                continue;
            }
            if let Some(entry) = slot.entry.as_mut() {
                entry.status = EntryStatus::Stale;
            }
            slot.in_flight = None;
            count += 1;
        }
        count
    }
}

fn path_matches(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

fn is_retryable(err: &ClientError) -> bool {
    match err {
        ClientError::Transport(_) => true,
        ClientError::Request { status, .. } => *status >= 500,
        _ => false,
    }
}

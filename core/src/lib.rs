//! API client core for the studyhub backend.
//!
//! # Overview
//! Builds requests, interprets responses, and caches reads for the study
//! API (tasks, notes, journals). Requests and responses are plain data
//! (`HttpRequest` / `HttpResponse`); a `Transport` performs the round-trip.
//!
//! # Design
//! - `normalize` turns any response into a `Payload` or a bounded
//!   `ClientError::Request`.
//! - `RequestDispatcher` resolves URLs, attaches the bearer token and sends
//!   each request exactly once.
//! - `QueryCache` serves reads from memory until they are invalidated and
//!   coalesces concurrent reads of the same key.
//! - `StudyClient` is the typed surface: reads through the cache, writes
//!   through the dispatcher followed by invalidation.

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod normalize;
pub mod payload;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use auth::{CredentialStore, MemoryCredentials};
pub use cache::{CachedEntry, EntryStatus, QueryCache, QueryKey, QueryOptions};
pub use client::StudyClient;
pub use config::ClientConfig;
pub use dispatcher::{OnUnauthorized, RequestDispatcher};
pub use error::ClientError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use normalize::normalize;
pub use payload::Payload;
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    Dashboard, Journal, NewJournal, NewNote, NewTask, Note, Priority, SummarizeRequest, Summary,
    Task, TaskUpdate,
};

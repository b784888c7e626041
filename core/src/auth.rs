//! Credential store seam.
//!
//! The store is owned by the application: it is filled at login and emptied
//! at logout. The client core only reads the current token when it builds a
//! request.

use std::sync::{PoisonError, RwLock};

pub trait CredentialStore: Send + Sync {
    /// The bearer token to attach, if one is held.
    fn token(&self) -> Option<String>;

    /// Forget the held token.
    fn clear(&self);
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    token: RwLock<Option<String>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_token(token);
        store
    }

    /// Replace the held token. An empty token is stored as no token.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = if token.is_empty() { None } else { Some(token) };
    }
}

impl CredentialStore for MemoryCredentials {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

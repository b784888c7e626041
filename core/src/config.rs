//! Client configuration.

use tracing::{debug, info};

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "STUDYHUB_API_BASE_URL";

/// Process-wide client configuration, read once at startup.
///
/// An empty `base_url` means requests are same-origin and carry relative
/// paths only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Read the base URL from `STUDYHUB_API_BASE_URL`; unset means same-origin.
    pub fn from_env() -> Self {
        match std::env::var(BASE_URL_ENV) {
            Ok(url) => {
                debug!("{BASE_URL_ENV}={url}");
                Self::new(url.trim())
            }
            Err(_) => {
                info!("{BASE_URL_ENV} not set, using same-origin requests");
                Self::default()
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

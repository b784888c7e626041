//! Builds and sends API requests.
//!
//! # Design
//! `build_request` is pure: it resolves the URL and attaches headers, and
//! can be checked without a network. `request` and `fetch` execute the built
//! request exactly once through the `Transport` and pass the response to the
//! normalizer. Nothing here retries; retry policy belongs to the caller.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::normalize::normalize;
use crate::payload::Payload;
use crate::transport::Transport;

/// What a read does with a `401 Unauthorized` response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OnUnauthorized {
    /// Fail with `ClientError::Request { status: 401, .. }`.
    #[default]
    Throw,
    /// Treat the read as "no data" and resolve to `Payload::Empty`.
    ReturnNull,
}

impl OnUnauthorized {
    /// Apply this policy to the outcome of a read that was fetched with
    /// `Throw` semantics.
    pub fn apply(self, outcome: Result<Payload, ClientError>) -> Result<Payload, ClientError> {
        match (self, outcome) {
            (OnUnauthorized::ReturnNull, Err(err)) if err.is_unauthorized() => Ok(Payload::Empty),
            (_, outcome) => outcome,
        }
    }
}

#[derive(Clone)]
pub struct RequestDispatcher {
    config: ClientConfig,
    credentials: Arc<dyn CredentialStore>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("config", &self.config)
            .field("authenticated", &self.credentials.token().is_some())
            .finish_non_exhaustive()
    }
}

impl RequestDispatcher {
    pub fn new(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config: config.clone(),
            credentials,
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Describe a request without sending it.
    pub fn build_request<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<HttpRequest, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let mut headers = Vec::new();
        let body = match body {
            Some(body) => {
                let json = serde_json::to_string(body)
                    .map_err(|e| ClientError::Serialization(e.to_string()))?;
                headers.push(("content-type".to_string(), "application/json".to_string()));
                Some(json)
            }
            None => None,
        };
        if let Some(token) = self.credentials.token() {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        Ok(HttpRequest {
            method,
            url: self.config.url_for(path),
            headers,
            body,
        })
    }

    /// Send a request and return its normalized payload.
    pub async fn request<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<Payload, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.build_request(method, path, body)?;
        normalize(self.send(request).await?)
    }

    /// Read `path` with `GET`.
    pub async fn fetch(
        &self,
        path: &str,
        on_unauthorized: OnUnauthorized,
    ) -> Result<Payload, ClientError> {
        let request = self.build_request::<()>(HttpMethod::Get, path, None)?;
        let response = self.send(request).await?;
        if on_unauthorized == OnUnauthorized::ReturnNull && response.status == 401 {
            debug!(path, "unauthorized read resolved to empty");
            return Ok(Payload::Empty);
        }
        normalize(response)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let method = request.method;
        let url = request.url.clone();
        debug!(%method, %url, "dispatching");

        let response = self.transport.execute(request).await.map_err(|err| {
            warn!(%method, %url, error = %err, "transport failure");
            err
        })?;

        if response.is_success() {
            debug!(%method, %url, status = response.status, "request succeeded");
        } else {
            warn!(%method, %url, status = response.status, "request failed");
        }
        Ok(response)
    }
}

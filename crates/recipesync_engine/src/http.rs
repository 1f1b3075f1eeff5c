//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so the engine
//! does not depend on a particular HTTP library. The CLI ships one built on
//! `reqwest`.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use parking_lot::RwLock;
use recipesync_protocol::{PullRequest, PushRequest};

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a JSON `POST` with `Authorization: Bearer <bearer>`.
    ///
    /// Returns `Err` only when no response was received at all.
    fn post_json(&self, url: &str, bearer: &str, body: Vec<u8>) -> Result<HttpResponse, String>;
}

/// HTTP-based sync transport.
///
/// Uses JSON request and response bodies.
pub struct HttpTransport<C: HttpClient> {
    config: SyncConfig,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(config: SyncConfig, client: C) -> Self {
        Self {
            config,
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn post(&self, url: &str, jwt: &str, body: Vec<u8>) -> SyncResult<Vec<u8>> {
        let response = self.client.post_json(url, jwt, body).map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            SyncError::transport_retryable(e)
        })?;

        if !response.is_success() {
            let message = String::from_utf8_lossy(&response.body).into_owned();
            *self.last_error.write() = Some(format!("{url} -> {}", response.status));
            return Err(SyncError::Server {
                status: response.status,
                message,
            });
        }

        *self.last_error.write() = None;
        Ok(response.body)
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn pull(&self, jwt: &str, request: &PullRequest) -> SyncResult<Vec<u8>> {
        self.post(&self.config.pull_url(), jwt, request.to_json()?)
    }

    fn push(&self, jwt: &str, request: &PushRequest) -> SyncResult<()> {
        self.post(&self.config.push_url(), jwt, request.to_json()?)
            .map(|_| ())
    }
}

/// A loopback HTTP client that routes requests directly to a server object.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST request and returns the response.
    fn handle_post(&self, path: &str, bearer: &str, body: &[u8]) -> HttpResponse;
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn post_json(&self, url: &str, bearer: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        let path = url
            .find("/recipes/")
            .map(|i| &url[i..])
            .unwrap_or(url);

        Ok(self.server.handle_post(path, bearer, &body))
    }
}

//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use recipesync_protocol::{PullRequest, PushRequest};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A sync transport carries pull and push requests to the server.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process fakes for testing, etc.).
pub trait SyncTransport: Send + Sync {
    /// Pulls changes since `request.last_pulled_at`.
    ///
    /// Returns the raw response body of a successful (2xx) exchange.
    /// Decoding is left to the caller.
    fn pull(&self, jwt: &str, request: &PullRequest) -> SyncResult<Vec<u8>>;

    /// Pushes local changes. Any non-2xx answer is an error.
    fn push(&self, jwt: &str, request: &PushRequest) -> SyncResult<()>;
}

impl<T: SyncTransport + ?Sized> SyncTransport for std::sync::Arc<T> {
    fn pull(&self, jwt: &str, request: &PullRequest) -> SyncResult<Vec<u8>> {
        (**self).pull(jwt, request)
    }

    fn push(&self, jwt: &str, request: &PushRequest) -> SyncResult<()> {
        (**self).push(jwt, request)
    }
}

/// Scripted reply for [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Succeed with this body (ignored for push).
    Ok(Vec<u8>),
    /// Fail with a retryable transport error.
    Unreachable(String),
    /// Fail with a server status.
    Status(u16),
}

impl MockReply {
    fn into_result(self) -> SyncResult<Vec<u8>> {
        match self {
            MockReply::Ok(body) => Ok(body),
            MockReply::Unreachable(message) => Err(SyncError::transport_retryable(message)),
            MockReply::Status(status) => Err(SyncError::Server {
                status,
                message: "mock status".into(),
            }),
        }
    }
}

/// A mock transport for testing.
///
/// Replies are queued per endpoint; when a queue is empty the default reply
/// is used (an empty pull body `{"changes":{}}` and a successful push).
#[derive(Debug, Default)]
pub struct MockTransport {
    pull_replies: Mutex<VecDeque<MockReply>>,
    push_replies: Mutex<VecDeque<MockReply>>,
    pushed: Mutex<Vec<PushRequest>>,
    pulled: Mutex<Vec<PullRequest>>,
    pull_calls: AtomicUsize,
    push_calls: AtomicUsize,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a pull reply.
    pub fn queue_pull(&self, reply: MockReply) {
        self.pull_replies.lock().push_back(reply);
    }

    /// Queues a successful pull with a JSON body.
    pub fn queue_pull_body(&self, body: impl Into<Vec<u8>>) {
        self.queue_pull(MockReply::Ok(body.into()));
    }

    /// Queues a push reply.
    pub fn queue_push(&self, reply: MockReply) {
        self.push_replies.lock().push_back(reply);
    }

    /// Number of pull calls made.
    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    /// Number of push calls made.
    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    /// Total number of network calls made.
    pub fn calls(&self) -> usize {
        self.pull_calls() + self.push_calls()
    }

    /// Every push request received, in order.
    pub fn pushed(&self) -> Vec<PushRequest> {
        self.pushed.lock().clone()
    }

    /// Every pull request received, in order.
    pub fn pulled(&self) -> Vec<PullRequest> {
        self.pulled.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn pull(&self, _jwt: &str, request: &PullRequest) -> SyncResult<Vec<u8>> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        self.pulled.lock().push(*request);
        self.pull_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockReply::Ok(br#"{"changes":{}}"#.to_vec()))
            .into_result()
    }

    fn push(&self, _jwt: &str, request: &PushRequest) -> SyncResult<()> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .push_replies
            .lock()
            .pop_front()
            .unwrap_or(MockReply::Ok(Vec::new()));
        reply.into_result()?;
        self.pushed.lock().push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_transport_defaults() {
        let transport = MockTransport::new();
        let body = transport.pull("jwt", &PullRequest::new(None)).unwrap();
        assert_eq!(body, br#"{"changes":{}}"#);
        transport.push("jwt", &PushRequest::new(None, false)).unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(transport.pushed().len(), 1);
        assert_eq!(transport.pulled(), vec![PullRequest::new(None)]);
    }

    #[test]
    fn mock_transport_scripted_failures() {
        let transport = MockTransport::new();
        transport.queue_pull(MockReply::Unreachable("offline".into()));
        transport.queue_push(MockReply::Status(500));

        let pull = transport.pull("jwt", &PullRequest::new(Some(1)));
        assert!(matches!(pull, Err(SyncError::Transport { .. })));

        let push = transport.push("jwt", &PushRequest::new(Some(1), false));
        assert!(matches!(push, Err(SyncError::Server { status: 500, .. })));
        assert!(transport.pushed().is_empty());
        assert_eq!(transport.push_calls(), 1);
    }
}

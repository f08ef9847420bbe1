//! Scripted transport.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use rekey_directory::{DirectoryError, HttpRequest, HttpResponse, Transport};
use serde_json::json;

type Reply = Result<HttpResponse, DirectoryError>;

/// Transport that replays queued replies in order.
///
/// Once the queue is down to its last reply, that reply repeats forever, so
/// "always 400" is a single-element script. Every request is recorded.
/// Clones share the script and the request log.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    /// Transport replaying `replies`.
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
            latency: None,
        }
    }

    /// Transport that always returns `response`.
    pub fn always(response: HttpResponse) -> Self {
        Self::new([Ok(response)])
    }

    /// Delay every reply by `latency` (real Tokio time).
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock();
        if replies.len() > 1
            && let Some(reply) = replies.pop_front()
        {
            return reply;
        }
        replies
            .front()
            .cloned()
            .unwrap_or_else(|| Err(DirectoryError::network("scripted transport has no replies")))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, DirectoryError> {
        self.requests.lock().push(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.next_reply()
    }
}

/// JSON body of a successful lookup returning `(username, kid)` pairs.
///
/// Bundles are derived from the kid as `bundle-<kid>`.
pub fn lookup_body(users: &[(&str, &str)]) -> String {
    let them: Vec<_> = users
        .iter()
        .map(|(username, kid)| {
            json!({
                "basics": { "username": username },
                "public_keys": { "primary": { "kid": kid, "bundle": format!("bundle-{kid}") } },
            })
        })
        .collect();

    json!({ "status": { "code": 0, "name": "OK" }, "them": them }).to_string()
}

//! In-memory directory service.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use rekey_directory::{DirectoryError, HttpRequest, HttpResponse, Transport};
use serde_json::{Value, json};

#[derive(Default)]
struct DirectoryState {
    /// Published kid per lower-cased username.
    users: HashMap<String, String>,
    /// Requested username lists, one per request.
    lookups: Vec<Vec<String>>,
    /// Replies served before consulting the user table.
    injected: Vec<HttpResponse>,
    /// Rotation counter used to mint new kids.
    generation: u64,
}

/// Directory that answers lookups from a user table.
///
/// Unknown users come back as `null` slots, matching the real service.
/// Clones share the same table.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl FakeDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory with `users` published under kid `<user>-kid-0`.
    pub fn with_users(users: &[&str]) -> Self {
        let directory = Self::new();
        for user in users {
            directory.publish(user, &format!("{user}-kid-0"));
        }
        directory
    }

    /// Publish (or replace) the key for `user`.
    pub fn publish(&self, user: &str, kid: &str) {
        self.state.lock().users.insert(user.to_ascii_lowercase(), kid.to_string());
    }

    /// Replace `user`'s key with a freshly minted one and return its kid.
    pub fn rotate(&self, user: &str) -> String {
        let mut state = self.state.lock();
        state.generation += 1;
        let kid = format!("{user}-kid-r{}", state.generation);
        state.users.insert(user.to_ascii_lowercase(), kid.clone());
        kid
    }

    /// Remove `user` from the directory.
    pub fn remove(&self, user: &str) {
        self.state.lock().users.remove(&user.to_ascii_lowercase());
    }

    /// Current kid for `user`.
    pub fn kid(&self, user: &str) -> Option<String> {
        self.state.lock().users.get(&user.to_ascii_lowercase()).cloned()
    }

    /// Serve `response` for the next request instead of the user table.
    pub fn fail_next(&self, response: HttpResponse) {
        self.state.lock().injected.push(response);
    }

    /// Number of lookup requests served.
    pub fn request_count(&self) -> usize {
        self.state.lock().lookups.len()
    }

    /// Usernames requested by each lookup, in order.
    pub fn lookups(&self) -> Vec<Vec<String>> {
        self.state.lock().lookups.clone()
    }
}

#[async_trait]
impl Transport for FakeDirectory {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, DirectoryError> {
        let requested: Vec<String> = request
            .query_param("usernames")
            .unwrap_or_default()
            .split(',')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        let mut state = self.state.lock();
        state.lookups.push(requested.clone());

        if !state.injected.is_empty() {
            return Ok(state.injected.remove(0));
        }

        let them: Vec<Value> = requested
            .iter()
            .map(|name| match state.users.get(&name.to_ascii_lowercase()) {
                Some(kid) => json!({
                    "basics": { "username": name.to_ascii_lowercase() },
                    "public_keys": { "primary": { "kid": kid, "bundle": format!("bundle-{kid}") } },
                }),
                None => Value::Null,
            })
            .collect();

        let body = json!({ "status": { "code": 0, "name": "OK" }, "them": them });
        Ok(HttpResponse::ok(body.to_string()))
    }
}

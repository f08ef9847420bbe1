//! Directory client with retry and response reconciliation.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use rekey_core::{Context, DirectoryKey, Environment, SystemEnv, validate_identity};
use tracing::{debug, warn};

use crate::{
    ClientConfig, DirectoryError, HttpRequest, HttpResponse, LOOKUP_FIELDS,
    ReqwestTransport, Transport, USER_AGENT, parse_retry_after,
    wire::{ApiStatus, LookupResponse, STATUS_INPUT_ERROR, STATUS_NOT_FOUND, STATUS_OK, UserEntry},
};

/// Batched identity → public key lookups.
///
/// Stateless across calls apart from its immutable configuration, so one
/// client can serve any number of concurrent lookups.
#[derive(Debug, Clone)]
pub struct DirectoryClient<T: Transport = ReqwestTransport, E: Environment = SystemEnv> {
    config: ClientConfig,
    transport: T,
    env: E,
}

impl DirectoryClient {
    /// Production client over HTTP with the system clock.
    pub fn new(config: ClientConfig) -> Result<Self, DirectoryError> {
        let config = config.normalized();
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self { config, transport, env: SystemEnv::new() })
    }
}

impl<T: Transport, E: Environment> DirectoryClient<T, E> {
    /// Client over a caller-supplied transport and environment.
    pub fn with_transport(config: ClientConfig, transport: T, env: E) -> Self {
        Self { config: config.normalized(), transport, env }
    }

    /// Effective configuration after defaults were applied.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Look up a single identity.
    pub async fn lookup_user(
        &self,
        ctx: &Context,
        identity: &str,
    ) -> Result<DirectoryKey, DirectoryError> {
        let mut keys = self.lookup_users(ctx, &[identity]).await?;
        keys.pop().ok_or_else(|| DirectoryError::not_found(format!("user {identity} not found")))
    }

    /// Resolve `identities` to their current primary keys.
    ///
    /// Issues one batched request per attempt. Keys come back in the order
    /// the identities were given, with duplicates collapsed.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty list or a malformed identity, before
    ///   any network activity
    /// - `NotFound` naming every identity the directory did not return
    /// - `InvalidResponse` if a returned identity has no key material
    /// - The last retryable error once `max_retries` is exhausted
    /// - `Timeout` as soon as `ctx` is cancelled or its deadline passes,
    ///   including during a backoff wait
    #[tracing::instrument(skip_all, fields(count = identities.len()))]
    pub async fn lookup_users<S: AsRef<str>>(
        &self,
        ctx: &Context,
        identities: &[S],
    ) -> Result<Vec<DirectoryKey>, DirectoryError> {
        let requested = requested_identities(identities)?;
        let request = self.build_request(&requested);

        let mut attempt: u32 = 0;
        loop {
            debug!(attempt, "directory lookup attempt");

            let err = match self.attempt(ctx, &request, &requested).await {
                Ok(keys) => return Ok(keys),
                Err(err) => err,
            };

            if !err.kind().is_retryable() || attempt >= self.config.max_retries {
                return Err(err);
            }

            attempt += 1;
            let delay = err.retry_after().unwrap_or_else(|| self.backoff(attempt));
            warn!(
                attempt,
                kind = %err.kind(),
                delay_ms = delay.as_millis() as u64,
                "directory lookup failed, retrying: {err}"
            );

            ctx.run(self.env.sleep(delay)).await?;
        }
    }

    /// Delay before retry number `attempt` (1-based): `retry_delay * 2^(attempt-1)`.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.config.retry_delay.saturating_mul(factor)
    }

    fn build_request(&self, requested: &[String]) -> HttpRequest {
        HttpRequest {
            url: self.config.lookup_url(),
            query: vec![
                ("usernames".to_string(), requested.join(",")),
                ("fields".to_string(), LOOKUP_FIELDS.to_string()),
            ],
            user_agent: USER_AGENT.to_string(),
        }
    }

    async fn attempt(
        &self,
        ctx: &Context,
        request: &HttpRequest,
        requested: &[String],
    ) -> Result<Vec<DirectoryKey>, DirectoryError> {
        let response = ctx.run(self.transport.get(request)).await??;
        self.interpret(&response, requested)
    }

    fn interpret(
        &self,
        response: &HttpResponse,
        requested: &[String],
    ) -> Result<Vec<DirectoryKey>, DirectoryError> {
        if !response.is_success() {
            let retry_after = response
                .retry_after
                .as_deref()
                .and_then(|value| parse_retry_after(value, self.env.now()));
            let body = String::from_utf8_lossy(&response.body);
            return Err(DirectoryError::from_status(response.status, &body, retry_after));
        }

        let parsed: LookupResponse = serde_json::from_slice(&response.body).map_err(|e| {
            DirectoryError::invalid_response(format!("malformed lookup response: {e}"))
                .with_status(response.status)
                .with_source(e)
        })?;

        check_status(&parsed.status).map_err(|err| err.with_status(response.status))?;
        reconcile(requested, parsed.them).map_err(|err| err.with_status(response.status))
    }
}

/// Validate and de-duplicate the requested identities, keeping first-seen order.
fn requested_identities<S: AsRef<str>>(identities: &[S]) -> Result<Vec<String>, DirectoryError> {
    if identities.is_empty() {
        return Err(DirectoryError::invalid_input("no identities provided"));
    }

    let mut seen = HashSet::with_capacity(identities.len());
    let mut requested = Vec::with_capacity(identities.len());
    for identity in identities {
        let identity = identity.as_ref();
        validate_identity(identity)?;
        if seen.insert(identity) {
            requested.push(identity.to_string());
        }
    }
    Ok(requested)
}

fn check_status(status: &ApiStatus) -> Result<(), DirectoryError> {
    match status.code {
        // Unknown names are reported per identity by `reconcile`.
        STATUS_OK | STATUS_NOT_FOUND => Ok(()),
        STATUS_INPUT_ERROR => Err(DirectoryError::invalid_input(format!(
            "directory rejected input: {}",
            status.desc.as_deref().unwrap_or(&status.name)
        ))),
        code => Err(DirectoryError::unknown(format!(
            "unrecognized directory status {code} ({})",
            status.name
        ))),
    }
}

/// Match response entries to requested identities.
fn reconcile(
    requested: &[String],
    them: Vec<Option<UserEntry>>,
) -> Result<Vec<DirectoryKey>, DirectoryError> {
    let entries: Vec<UserEntry> = them.into_iter().flatten().collect();

    if entries.is_empty() {
        return Err(match requested {
            [only] => DirectoryError::not_found(format!("user {only} not found")),
            _ => DirectoryError::not_found(format!(
                "none of the requested users were found: {}",
                requested.join(", ")
            )),
        });
    }

    let mut by_name: HashMap<String, &UserEntry> = HashMap::with_capacity(entries.len());
    for entry in &entries {
        match entry.username() {
            Some(name) => {
                by_name.entry(name.to_ascii_lowercase()).or_insert(entry);
            },
            None => debug!("ignoring directory entry without username"),
        }
    }

    let mut keys = Vec::with_capacity(requested.len());
    let mut missing = Vec::new();
    let mut keyless = Vec::new();

    for identity in requested {
        let Some(entry) = by_name.get(&identity.to_ascii_lowercase()) else {
            missing.push(identity.as_str());
            continue;
        };
        match entry.primary_key() {
            Some(key) => keys.push(DirectoryKey::new(identity, &key.bundle, &key.kid)),
            None => keyless.push(identity.as_str()),
        }
    }

    let missing_msg = || format!("users not found: {}", missing.join(", "));
    let keyless_msg = || format!("no primary public key published for: {}", keyless.join(", "));

    match (missing.is_empty(), keyless.is_empty()) {
        (true, true) => Ok(keys),
        (true, false) => Err(DirectoryError::invalid_response(keyless_msg())),
        (false, true) => Err(DirectoryError::not_found(missing_msg())),
        (false, false) => {
            Err(DirectoryError::not_found(format!("{}; {}", missing_msg(), keyless_msg())))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ErrorKind,
        wire::{Basics, PrimaryKey, PublicKeys},
    };

    fn entry(name: &str, kid: &str) -> Option<UserEntry> {
        Some(UserEntry {
            basics: Some(Basics { username: name.to_string() }),
            public_keys: Some(PublicKeys {
                primary: Some(PrimaryKey { kid: kid.to_string(), bundle: format!("bundle-{kid}") }),
            }),
        })
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn reconcile_keeps_request_order() {
        let keys = reconcile(
            &names(&["carol", "alice", "bob"]),
            vec![entry("alice", "k1"), entry("bob", "k2"), entry("carol", "k3")],
        )
        .unwrap();

        let order: Vec<_> = keys.iter().map(|k| k.identity.as_str()).collect();
        assert_eq!(order, ["carol", "alice", "bob"]);
        assert_eq!(keys[0].key_id, "k3");
        assert_eq!(keys[0].public_key, "bundle-k3");
    }

    #[test]
    fn reconcile_names_every_missing_identity() {
        let err = reconcile(
            &names(&["alice", "bob", "charlie"]),
            vec![entry("alice", "k1"), None, None],
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.message().contains("bob"));
        assert!(err.message().contains("charlie"));
        assert!(!err.message().contains("alice"));
    }

    #[test]
    fn reconcile_empty_response_messages_differ_by_count() {
        let single = reconcile(&names(&["alice"]), vec![]).unwrap_err();
        let multiple = reconcile(&names(&["alice", "bob"]), vec![None, None]).unwrap_err();

        assert_eq!(single.kind(), ErrorKind::NotFound);
        assert_eq!(multiple.kind(), ErrorKind::NotFound);
        assert_eq!(single.message(), "user alice not found");
        assert!(multiple.message().starts_with("none of the requested users were found"));
    }

    #[test]
    fn reconcile_rejects_keyless_match() {
        let keyless = Some(UserEntry {
            basics: Some(Basics { username: "bob".to_string() }),
            public_keys: None,
        });

        let err = reconcile(&names(&["alice", "bob"]), vec![entry("alice", "k1"), keyless])
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert!(err.message().contains("bob"));
    }

    #[test]
    fn reconcile_reports_missing_and_keyless_together() {
        let keyless = Some(UserEntry {
            basics: Some(Basics { username: "bob".to_string() }),
            public_keys: Some(PublicKeys { primary: None }),
        });

        let err = reconcile(
            &names(&["alice", "bob", "charlie"]),
            vec![entry("alice", "k1"), keyless],
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.message().contains("bob"));
        assert!(err.message().contains("charlie"));
    }

    #[test]
    fn reconcile_matches_case_insensitively() {
        let keys = reconcile(&names(&["Alice"]), vec![entry("alice", "k1")]).unwrap();
        assert_eq!(keys[0].identity, "Alice");
    }

    #[test]
    fn requested_identities_rejects_empty_and_invalid() {
        let empty: [&str; 0] = [];
        assert_eq!(requested_identities(&empty).unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(
            requested_identities(&["alice", "bob,eve"]).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(requested_identities(&[""]).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn requested_identities_dedups_in_order() {
        let requested = requested_identities(&["bob", "alice", "bob"]).unwrap();
        assert_eq!(requested, ["bob", "alice"]);
    }

    #[test]
    fn embedded_status_classification() {
        let status = |code: i64| ApiStatus { code, name: "X".to_string(), desc: None };

        assert!(check_status(&status(STATUS_OK)).is_ok());
        assert!(check_status(&status(STATUS_NOT_FOUND)).is_ok());
        assert_eq!(
            check_status(&status(STATUS_INPUT_ERROR)).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(check_status(&status(999)).unwrap_err().kind(), ErrorKind::Unknown);
    }

    #[test]
    fn backoff_doubles() {
        let client = DirectoryClient::with_transport(
            ClientConfig { retry_delay: Duration::from_millis(100), ..ClientConfig::new() },
            NeverTransport,
            SystemEnv::new(),
        );

        assert_eq!(client.backoff(1), Duration::from_millis(100));
        assert_eq!(client.backoff(2), Duration::from_millis(200));
        assert_eq!(client.backoff(3), Duration::from_millis(400));
        // Saturates instead of overflowing.
        assert!(client.backoff(200) >= client.backoff(3));
    }

    struct NeverTransport;

    #[async_trait::async_trait]
    impl Transport for NeverTransport {
        async fn get(&self, _request: &HttpRequest) -> Result<HttpResponse, DirectoryError> {
            Err(DirectoryError::network("unreachable"))
        }
    }
}

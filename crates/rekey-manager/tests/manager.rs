//! Cache-first resolution through `KeyManager`.

use std::time::Duration;

use rekey_cache::{CacheConfig, CacheStats, KeyCache};
use rekey_core::Context;
use rekey_directory::{ClientConfig, DirectoryClient, ErrorKind, HttpResponse};
use rekey_harness::{FakeDirectory, ManualEnv};
use rekey_manager::{KeyManager, ManagerConfig, ManagerError, Mode};
use tempfile::TempDir;

const TTL: Duration = Duration::from_secs(3600);

struct Fixture {
    _dir: TempDir,
    env: ManualEnv,
    directory: FakeDirectory,
    manager: KeyManager<FakeDirectory, ManualEnv>,
}

fn cache_in(dir: &TempDir, env: &ManualEnv) -> KeyCache<ManualEnv> {
    let config = CacheConfig::new(dir.path().join("keys.json")).with_ttl(TTL);
    KeyCache::with_env(config, env.clone()).unwrap()
}

fn fixture(users: &[&str]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let env = ManualEnv::new();
    let directory = FakeDirectory::with_users(users);
    let client = DirectoryClient::with_transport(
        ClientConfig { max_retries: 0, ..ClientConfig::new() },
        directory.clone(),
        env.clone(),
    );
    let manager = KeyManager::new(client, cache_in(&dir, &env));
    Fixture { _dir: dir, env, directory, manager }
}

fn identities(records: &[rekey_core::PublicKeyRecord]) -> Vec<&str> {
    records.iter().map(|r| r.identity.as_str()).collect()
}

#[tokio::test]
async fn single_miss_is_fetched_then_served_from_cache() {
    let f = fixture(&["alice"]);
    let ctx = Context::new();

    let first = f.manager.get_public_key(&ctx, "alice").await.unwrap();
    let second = f.manager.get_public_key(&ctx, "alice").await.unwrap();

    assert_eq!(first.key_id, "alice-kid-0");
    assert_eq!(first, second);
    assert_eq!(f.directory.request_count(), 1);
}

#[tokio::test]
async fn cached_batch_makes_no_further_calls() {
    let users: Vec<String> = (0..10).map(|i| format!("user{i}")).collect();
    let names: Vec<&str> = users.iter().map(String::as_str).collect();
    let f = fixture(&names);
    let ctx = Context::new();

    let first = f.manager.get_public_keys(&ctx, &names).await.unwrap();
    assert_eq!(f.directory.request_count(), 1);

    let second = f.manager.get_public_keys(&ctx, &names).await.unwrap();
    assert_eq!(f.directory.request_count(), 1);
    assert_eq!(first, second);
    assert_eq!(identities(&second), names);
}

#[tokio::test]
async fn only_misses_are_fetched_in_one_call() {
    let f = fixture(&["alice", "bob", "carol", "dave", "erin"]);
    let ctx = Context::new();
    f.manager.get_public_keys(&ctx, &["bob", "dave"]).await.unwrap();

    let records =
        f.manager.get_public_keys(&ctx, &["erin", "bob", "alice", "dave", "carol"]).await.unwrap();

    assert_eq!(identities(&records), ["erin", "bob", "alice", "dave", "carol"]);
    assert_eq!(f.directory.request_count(), 2);
    assert_eq!(f.directory.lookups()[1], ["erin", "alice", "carol"]);
}

#[tokio::test]
async fn duplicates_keep_their_positions() {
    let f = fixture(&["alice", "bob"]);

    let records =
        f.manager.get_public_keys(&Context::new(), &["bob", "alice", "bob"]).await.unwrap();

    assert_eq!(identities(&records), ["bob", "alice", "bob"]);
    assert_eq!(f.directory.lookups()[0], ["bob", "alice"]);
}

#[tokio::test]
async fn expired_records_are_refetched() {
    let f = fixture(&["alice"]);
    let ctx = Context::new();
    f.manager.get_public_key(&ctx, "alice").await.unwrap();

    f.env.advance(TTL);
    let new_kid = f.directory.rotate("alice");
    let record = f.manager.get_public_key(&ctx, "alice").await.unwrap();

    assert_eq!(record.key_id, new_kid);
    assert_eq!(f.directory.request_count(), 2);
}

#[tokio::test]
async fn failed_fetch_leaves_cache_unchanged() {
    let f = fixture(&["alice", "bob"]);
    let ctx = Context::new();
    f.manager.get_public_key(&ctx, "alice").await.unwrap();
    let before = f.manager.stats();

    let err = f.manager.get_public_keys(&ctx, &["alice", "bob", "ghost"]).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("ghost"));

    f.directory.fail_next(HttpResponse::with_status(503, "down"));
    let err = f.manager.get_public_keys(&ctx, &["bob"]).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::ServerError));

    assert_eq!(f.manager.stats(), before);
    assert!(f.manager.cache().get("bob").is_none());
}

#[tokio::test]
async fn invalid_input_is_rejected_before_lookup() {
    let f = fixture(&["alice"]);
    let ctx = Context::new();

    let err = f.manager.get_public_keys(&ctx, &["alice", "not valid"]).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidInput));

    let empty: [&str; 0] = [];
    let err = f.manager.get_public_keys(&ctx, &empty).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidInput));

    let err = f.manager.get_public_key(&ctx, "").await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidInput));

    assert_eq!(f.directory.request_count(), 0);
}

#[tokio::test]
async fn refresh_bypasses_cache() {
    let f = fixture(&["alice", "bob"]);
    let ctx = Context::new();
    f.manager.get_public_keys(&ctx, &["alice", "bob"]).await.unwrap();

    let new_kid = f.directory.rotate("alice");
    let records = f.manager.refresh_users(&ctx, &["bob", "alice"]).await.unwrap();

    assert_eq!(identities(&records), ["bob", "alice"]);
    assert_eq!(records[1].key_id, new_kid);
    assert_eq!(f.manager.cache().get("alice").unwrap().key_id, new_kid);
    assert_eq!(f.directory.request_count(), 2);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_record() {
    let f = fixture(&["alice"]);
    let ctx = Context::new();
    let cached = f.manager.get_public_key(&ctx, "alice").await.unwrap();

    f.directory.fail_next(HttpResponse::with_status(500, ""));
    let err = f.manager.refresh_user(&ctx, "alice").await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::ServerError));
    assert_eq!(f.manager.cache().get("alice"), Some(cached));
}

#[tokio::test]
async fn invalidation_forces_refetch() {
    let f = fixture(&["alice", "bob"]);
    let ctx = Context::new();
    f.manager.get_public_keys(&ctx, &["alice", "bob"]).await.unwrap();

    assert!(f.manager.invalidate_user("alice").unwrap());
    assert!(!f.manager.invalidate_user("alice").unwrap());
    f.manager.get_public_key(&ctx, "alice").await.unwrap();
    assert_eq!(f.directory.request_count(), 2);

    f.manager.invalidate_all().unwrap();
    assert_eq!(f.manager.stats(), CacheStats::default());
}

#[tokio::test]
async fn prune_through_manager() {
    let f = fixture(&["alice"]);
    f.manager.get_public_key(&Context::new(), "alice").await.unwrap();
    f.env.advance(TTL);

    assert_eq!(f.manager.stats(), CacheStats { total: 1, valid: 0, expired: 1 });
    assert_eq!(f.manager.prune_expired().unwrap(), 1);
    assert_eq!(f.manager.prune_expired().unwrap(), 0);
}

#[tokio::test]
async fn offline_misses_name_every_identity() {
    let dir = tempfile::tempdir().unwrap();
    let env = ManualEnv::new();
    let cache = cache_in(&dir, &env);
    cache.set("alice", "bundle-a", "kid-a").unwrap();
    let manager = KeyManager::offline(cache);

    assert!(manager.is_offline());
    assert_eq!(manager.get_public_key(&Context::new(), "alice").await.unwrap().key_id, "kid-a");

    let err =
        manager.get_public_keys(&Context::new(), &["alice", "bob", "carol"]).await.unwrap_err();
    assert!(err.is_not_found());
    let message = err.to_string();
    assert!(message.contains("bob") && message.contains("carol"), "{message}");
    assert!(!message.contains("alice"), "{message}");
}

#[tokio::test]
async fn offline_expired_record_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let env = ManualEnv::new();
    let cache = cache_in(&dir, &env);
    cache.set("alice", "bundle-a", "kid-a").unwrap();
    let manager = KeyManager::offline(cache);

    env.advance(TTL);
    let err = manager.get_public_key(&Context::new(), "alice").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn offline_refresh_is_a_network_error() {
    let dir = tempfile::tempdir().unwrap();
    let manager = KeyManager::offline(cache_in(&dir, &ManualEnv::new()));

    let err = manager.refresh_user(&Context::new(), "alice").await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Network));

    let err = manager.refresh_users(&Context::new(), &["alice", "bob"]).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Network));
}

#[tokio::test]
async fn open_builds_offline_stack_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = ManagerConfig {
        cache: CacheConfig::new(dir.path().join("keys.json")),
        mode: Mode::Offline,
        ..ManagerConfig::default()
    };

    let manager = KeyManager::open(config).unwrap();

    assert_eq!(manager.mode(), Mode::Offline);
    assert!(manager.client().is_none());
}

#[tokio::test]
async fn open_surfaces_malformed_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.json");
    std::fs::write(&path, "[]").unwrap();

    let err = KeyManager::open(ManagerConfig {
        cache: CacheConfig::new(&path),
        ..ManagerConfig::default()
    })
    .unwrap_err();

    assert!(matches!(err, ManagerError::Cache(_)));
    assert_eq!(err.kind(), None);
}

//! Shared fixture: alice and bob published in a fake directory, a cache in a
//! temporary directory and a manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use rekey_cache::{CacheConfig, KeyCache};
use rekey_directory::{ClientConfig, DirectoryClient};
use rekey_harness::{FakeDirectory, ManualEnv};
use rekey_manager::KeyManager;
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub env: ManualEnv,
    pub directory: FakeDirectory,
    pub manager: Arc<KeyManager<FakeDirectory, ManualEnv>>,
}

pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let env = ManualEnv::new();
    let directory = FakeDirectory::with_users(&["alice", "bob"]);
    let client = DirectoryClient::with_transport(
        ClientConfig { max_retries: 0, ..ClientConfig::new() },
        directory.clone(),
        env.clone(),
    );
    let cache =
        KeyCache::with_env(CacheConfig::new(dir.path().join("keys.json")), env.clone()).unwrap();
    let manager = Arc::new(KeyManager::new(client, cache));
    Fixture { dir, env, directory, manager }
}

pub fn recipients() -> Vec<String> {
    vec!["alice".to_string(), "bob".to_string()]
}

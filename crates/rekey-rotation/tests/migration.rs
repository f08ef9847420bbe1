//! Lazy re-encryption workflow end to end.

mod common;

use std::collections::BTreeMap;

use rekey_core::Context;
use rekey_directory::HttpResponse;
use rekey_harness::{Envelope, FakeCrypto, FakeDirectory, ManualEnv};
use rekey_rotation::{
    KeyStatus, LazyReEncryptor, MigrationConfig, MigrationError, MigrationSummary,
    ReEncryptRequest, ReEncryption,
};

use crate::common::{Fixture, fixture, recipients};

type Workflow = LazyReEncryptor<FakeCrypto, FakeDirectory, ManualEnv>;

fn reencryptor(f: &Fixture, crypto: &FakeCrypto) -> Workflow {
    LazyReEncryptor::new(crypto.clone(), f.manager.clone(), MigrationConfig::new(recipients()))
}

fn stored_message() -> Vec<u8> {
    Envelope::seal(&["alice-kid-0", "bob-kid-0"], Some("sender-kid"), b"secret")
}

#[tokio::test]
async fn no_rotation_means_no_encryption() {
    let f = fixture();
    let crypto = FakeCrypto::holding(&["alice-kid-0"]);

    let result = reencryptor(&f, &crypto)
        .perform_lazy_reencryption(&Context::new(), &stored_message())
        .await
        .unwrap();

    assert_eq!(result.plaintext, b"secret");
    assert!(!result.rotation_detected());
    assert!(matches!(result.reencryption, ReEncryption::NotNeeded));
    assert!(result.new_ciphertext().is_none());
    assert_eq!(crypto.encrypt_calls(), 0);
}

#[tokio::test]
async fn rotation_reencrypts_to_current_keys() {
    let f = fixture();
    let crypto = FakeCrypto::holding(&["alice-kid-0"]);
    let new_kid = f.directory.rotate("alice");

    let result = reencryptor(&f, &crypto)
        .perform_lazy_reencryption(&Context::new(), &stored_message())
        .await
        .unwrap();

    assert!(result.rotation_detected());
    assert!(result.error().is_none());
    let envelope = Envelope::open(result.new_ciphertext().unwrap()).unwrap();
    assert_eq!(envelope.recipients, [new_kid.as_str(), "bob-kid-0"]);
    assert_eq!(envelope.body, b"secret");
    assert_eq!(crypto.encrypt_calls(), 1);
}

#[tokio::test]
async fn detection_failure_still_returns_plaintext() {
    let f = fixture();
    let crypto = FakeCrypto::holding(&["alice-kid-0"]);
    f.directory.fail_next(HttpResponse::with_status(503, "down"));

    let outcome = reencryptor(&f, &crypto)
        .decrypt_with_rotation_check(&Context::new(), &stored_message())
        .await
        .unwrap();

    assert_eq!(outcome.plaintext, b"secret");
    assert_eq!(outcome.key_usage.receiver_key_id, "alice-kid-0");
    assert_eq!(outcome.rotation.receiver_key, KeyStatus::Unknown);
    assert!(!outcome.rotation.needs_reencryption);
    assert!(outcome.rotation.reason.unwrap().contains("rotation check failed"));
}

#[tokio::test]
async fn departed_recipient_degrades_detection_to_unknown() {
    let f = fixture();
    let crypto = FakeCrypto::holding(&["alice-kid-0"]);
    f.directory.remove("bob");

    let outcome = reencryptor(&f, &crypto)
        .decrypt_with_rotation_check(&Context::new(), &stored_message())
        .await
        .unwrap();

    assert_eq!(outcome.plaintext, b"secret");
    assert_eq!(outcome.rotation.receiver_key, KeyStatus::Unknown);
    assert!(!outcome.rotation.needs_reencryption);
    assert_eq!(crypto.encrypt_calls(), 0);
}

#[tokio::test]
async fn cancelled_detection_degrades_to_unknown() {
    let f = fixture();
    let crypto = FakeCrypto::holding(&["alice-kid-0"]);
    let ctx = Context::new();
    ctx.cancel();

    let result =
        reencryptor(&f, &crypto).perform_lazy_reencryption(&ctx, &stored_message()).await.unwrap();

    assert_eq!(result.plaintext, b"secret");
    assert_eq!(result.rotation.receiver_key, KeyStatus::Unknown);
    assert!(matches!(result.reencryption, ReEncryption::NotNeeded));
}

#[tokio::test]
async fn undecryptable_input_is_an_error() {
    let f = fixture();
    let crypto = FakeCrypto::holding(&["someone-else"]);

    let err = reencryptor(&f, &crypto)
        .perform_lazy_reencryption(&Context::new(), &stored_message())
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::Decrypt(_)));
    assert_eq!(f.directory.request_count(), 0);
}

#[tokio::test]
async fn failed_reencryption_is_reported_with_plaintext() {
    let f = fixture();
    let crypto = FakeCrypto::holding(&["alice-kid-0"]);
    crypto.fail_encryption();
    f.directory.rotate("alice");

    let result = reencryptor(&f, &crypto)
        .perform_lazy_reencryption(&Context::new(), &stored_message())
        .await
        .unwrap();

    assert_eq!(result.plaintext, b"secret");
    assert!(result.rotation_detected());
    assert!(result.new_ciphertext().is_none());
    assert!(matches!(result.error(), Some(MigrationError::Encrypt(_))));
}

#[tokio::test]
async fn re_encrypt_never_decrypts() {
    let f = fixture();
    let crypto = FakeCrypto::default();
    let workflow = reencryptor(&f, &crypto);

    let ciphertext = workflow
        .re_encrypt(
            &Context::new(),
            ReEncryptRequest { plaintext: b"fresh".to_vec(), recipients: Some(vec!["bob".into()]) },
        )
        .await
        .unwrap();

    assert_eq!(Envelope::open(&ciphertext).unwrap().recipients, ["bob-kid-0"]);
    assert_eq!(crypto.decrypt_calls(), 0);
}

#[tokio::test]
async fn re_encrypt_without_recipients_fails() {
    let f = fixture();
    let crypto = FakeCrypto::default();
    let workflow =
        LazyReEncryptor::new(crypto.clone(), f.manager.clone(), MigrationConfig::default());

    let err = workflow
        .re_encrypt(
            &Context::new(),
            ReEncryptRequest { plaintext: b"x".to_vec(), recipients: None },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::NoRecipients));
    assert_eq!(crypto.encrypt_calls(), 0);
}

#[tokio::test]
async fn re_encrypt_surfaces_lookup_failure() {
    let f = fixture();
    let crypto = FakeCrypto::default();

    let err = reencryptor(&f, &crypto)
        .re_encrypt(
            &Context::new(),
            ReEncryptRequest { plaintext: b"x".to_vec(), recipients: Some(vec!["ghost".into()]) },
        )
        .await
        .unwrap_err();

    match err {
        MigrationError::KeyLookup(inner) => assert!(inner.is_not_found()),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn batch_results_are_per_item() {
    let f = fixture();
    let crypto = FakeCrypto::holding(&["alice-kid-0"]);
    let new_kid = f.directory.rotate("alice");
    crypto.hold(&new_kid);

    let items = BTreeMap::from([
        ("stale".to_string(), stored_message()),
        ("fresh".to_string(), Envelope::seal(&[new_kid.as_str(), "bob-kid-0"], None, b"new")),
        ("broken".to_string(), b"not an envelope".to_vec()),
    ]);

    let results = reencryptor(&f, &crypto).migrate_encrypted_data(&Context::new(), items).await;

    assert_eq!(results.len(), 3);

    let stale = results["stale"].as_ref().unwrap();
    assert!(stale.rotation_detected());
    assert!(stale.new_ciphertext().is_some());

    let fresh = results["fresh"].as_ref().unwrap();
    assert!(!fresh.rotation_detected());
    assert!(fresh.new_ciphertext().is_none());
    assert_eq!(fresh.rotation.sender_key, KeyStatus::NotApplicable);

    assert!(matches!(results["broken"], Err(MigrationError::Decrypt(_))));

    for result in results.values().filter_map(|r| r.as_ref().ok()) {
        let acted = !matches!(result.reencryption, ReEncryption::NotNeeded);
        assert_eq!(result.rotation_detected(), acted);
        assert!(!(result.new_ciphertext().is_some() && result.error().is_some()));
    }

    assert_eq!(
        MigrationSummary::from_results(&results),
        MigrationSummary { total: 3, reencrypted: 1, unchanged: 1, failed: 1 }
    );
}

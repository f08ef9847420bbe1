//! Transparent crypto provider.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;
use rekey_core::{CryptoError, CryptoProvider, Decrypted, KeyUsageInfo, PublicKeyRecord};
use serde::{Deserialize, Serialize};

/// Fake ciphertext: the plaintext in the clear, tagged with recipient kids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Kids the message was "encrypted" to.
    pub recipients: Vec<String>,
    /// Signing kid, `None` for anonymous senders.
    pub sender: Option<String>,
    /// Message body.
    pub body: Vec<u8>,
}

impl Envelope {
    /// Serialize to ciphertext bytes.
    pub fn seal(recipients: &[&str], sender: Option<&str>, body: &[u8]) -> Vec<u8> {
        let envelope = Self {
            recipients: recipients.iter().map(ToString::to_string).collect(),
            sender: sender.map(str::to_string),
            body: body.to_vec(),
        };
        serde_json::to_vec(&envelope).unwrap_or_default()
    }

    /// Parse ciphertext bytes.
    pub fn open(ciphertext: &[u8]) -> Option<Self> {
        serde_json::from_slice(ciphertext).ok()
    }
}

/// Crypto provider that "decrypts" with whichever held kid appears first in
/// an envelope's recipient list.
///
/// Clones share held keys and call counters.
#[derive(Clone, Default)]
pub struct FakeCrypto {
    held: Arc<Mutex<HashSet<String>>>,
    sender: Option<String>,
    encrypt_calls: Arc<AtomicUsize>,
    decrypt_calls: Arc<AtomicUsize>,
    fail_encrypt: Arc<Mutex<bool>>,
}

impl FakeCrypto {
    /// Provider holding the private halves of `kids`.
    pub fn holding(kids: &[&str]) -> Self {
        let crypto = Self::default();
        for kid in kids {
            crypto.hold(kid);
        }
        crypto
    }

    /// Sign new ciphertexts with `kid`.
    #[must_use]
    pub fn signing_as(mut self, kid: &str) -> Self {
        self.sender = Some(kid.to_string());
        self
    }

    /// Add a private key.
    pub fn hold(&self, kid: &str) {
        self.held.lock().insert(kid.to_string());
    }

    /// Make every subsequent `encrypt` fail.
    pub fn fail_encryption(&self) {
        *self.fail_encrypt.lock() = true;
    }

    /// Number of `encrypt` calls.
    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    /// Number of `decrypt` calls.
    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }
}

impl CryptoProvider for FakeCrypto {
    fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &[PublicKeyRecord],
    ) -> Result<Vec<u8>, CryptoError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_encrypt.lock() {
            return Err(CryptoError::Encrypt("injected failure".to_string()));
        }
        if recipients.is_empty() {
            return Err(CryptoError::Encrypt("no recipients".to_string()));
        }

        let envelope = Envelope {
            recipients: recipients.iter().map(|r| r.key_id.clone()).collect(),
            sender: self.sender.clone(),
            body: plaintext.to_vec(),
        };
        serde_json::to_vec(&envelope).map_err(|e| CryptoError::Encrypt(e.to_string()))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Decrypted, CryptoError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);

        let envelope = Envelope::open(ciphertext)
            .ok_or_else(|| CryptoError::Decrypt("malformed envelope".to_string()))?;

        let held = self.held.lock();
        let receiver = envelope
            .recipients
            .iter()
            .find(|kid| held.contains(*kid))
            .ok_or_else(|| CryptoError::Decrypt("no matching private key".to_string()))?;

        Ok(Decrypted {
            plaintext: envelope.body.clone(),
            key_usage: KeyUsageInfo {
                receiver_key_id: receiver.clone(),
                sender_anonymous: envelope.sender.is_none(),
                sender_key_id: envelope.sender.clone(),
            },
        })
    }
}

//! At-rest obfuscation for the pool record.
//!
//! [`StaticKeyCipher`] derives its key from a secret compiled into the
//! binary. Anyone holding the binary can decrypt the pool, so this only
//! keeps keys out of casual view (a `cat` of the state dir, a screen
//! share). It is not a security boundary. Use [`PlainCipher`] where even
//! that is unwanted.

use anyhow::{Result, anyhow, bail};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use sha2::{Digest, Sha256};

/// Nonce size in bytes for ChaCha20-Poly1305
const NONCE_SIZE: usize = 12;

const APP_SECRET: &[u8] = b"credpool/pool-record/v1";

/// Symmetric seal/open over a text-safe envelope.
pub trait Cipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<String>;
    fn open(&self, sealed: &str) -> Result<Vec<u8>>;
}

/// Identity cipher: the envelope is the UTF-8 plaintext.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainCipher;

impl Cipher for PlainCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<String> {
        String::from_utf8(plaintext.to_vec()).map_err(|e| anyhow!("plaintext is not UTF-8: {e}"))
    }

    fn open(&self, sealed: &str) -> Result<Vec<u8>> {
        Ok(sealed.as_bytes().to_vec())
    }
}

/// ChaCha20-Poly1305 keyed by `SHA-256(secret)`.
///
/// Envelope: base64 of `nonce || ciphertext || tag`, fresh nonce per seal.
#[derive(Clone)]
pub struct StaticKeyCipher {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for StaticKeyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyCipher").finish_non_exhaustive()
    }
}

impl Default for StaticKeyCipher {
    fn default() -> Self {
        Self::from_secret(APP_SECRET)
    }
}

impl StaticKeyCipher {
    /// Cipher keyed by the embedded application secret.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_secret(secret: &[u8]) -> Self {
        let key = Sha256::digest(secret);
        Self {
            cipher: ChaCha20Poly1305::new(&key),
        }
    }
}

impl Cipher for StaticKeyCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| anyhow!("encryption failed: {e}"))?;

        let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(envelope))
    }

    fn open(&self, sealed: &str) -> Result<Vec<u8>> {
        let envelope = BASE64
            .decode(sealed.trim())
            .map_err(|e| anyhow!("envelope is not base64: {e}"))?;
        if envelope.len() <= NONCE_SIZE {
            bail!(
                "envelope too short: expected more than {NONCE_SIZE} bytes, got {}",
                envelope.len()
            );
        }
        let (nonce, ciphertext) = envelope.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| anyhow!("decryption failed: {e}"))
    }
}

//! Capabilities for protecting the Helper's request in transit
//!
//! In Leader/Helper mode the client encrypts the Helper's request before
//! handing everything to the Leader, and the Helper decrypts it. Both sides
//! bind the ciphertext to a shared context string. Any function or closure
//! with the right signature can act as either capability; [`AeadSealer`] is a
//! ready-made AES-128-GCM implementation keyed from a pre-shared secret.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Client-side capability: seal the Helper's serialized request
pub trait RequestEncrypter: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], context_info: &str) -> crate::Result<Vec<u8>>;
}

/// Helper-side capability: open a request sealed by the client
pub trait RequestDecrypter: Send + Sync {
    fn decrypt(&self, ciphertext: &[u8], context_info: &str) -> crate::Result<Vec<u8>>;
}

impl<F> RequestEncrypter for F
where
    F: Fn(&[u8], &str) -> crate::Result<Vec<u8>> + Send + Sync,
{
    fn encrypt(&self, plaintext: &[u8], context_info: &str) -> crate::Result<Vec<u8>> {
        self(plaintext, context_info)
    }
}

impl<F> RequestDecrypter for F
where
    F: Fn(&[u8], &str) -> crate::Result<Vec<u8>> + Send + Sync,
{
    fn decrypt(&self, ciphertext: &[u8], context_info: &str) -> crate::Result<Vec<u8>> {
        self(ciphertext, context_info)
    }
}

const NONCE_BYTES: usize = 12;
const TAG_BYTES: usize = 16;
const SALT_LABEL: &[u8] = b"dpf-pir/transport-salt";

/// AES-128-GCM sealer keyed by HKDF-SHA256 over a 16-byte shared secret
///
/// The context string is both the HKDF info and the AEAD associated data.
/// Output layout: `nonce (12) || ciphertext || tag (16)`.
#[derive(Clone)]
pub struct AeadSealer {
    secret: [u8; 16],
}

impl std::fmt::Debug for AeadSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadSealer").finish_non_exhaustive()
    }
}

impl AeadSealer {
    pub fn new(secret: [u8; 16]) -> Self {
        Self { secret }
    }

    /// Sealer with a fresh random secret, for in-process deployments and tests
    pub fn generate() -> Self {
        let mut secret = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut secret);
        Self { secret }
    }

    fn cipher(&self, context_info: &str) -> crate::Result<Aes128Gcm> {
        let salt = Sha256::digest(SALT_LABEL);
        let hk = Hkdf::<Sha256>::new(Some(salt.as_slice()), &self.secret);
        let mut key = [0u8; 16];
        hk.expand(context_info.as_bytes(), &mut key)
            .map_err(|e| Error::Internal(format!("key derivation failed: {}", e)))?;
        Aes128Gcm::new_from_slice(&key)
            .map_err(|e| Error::Internal(format!("invalid AES key: {}", e)))
    }
}

impl RequestEncrypter for AeadSealer {
    fn encrypt(&self, plaintext: &[u8], context_info: &str) -> crate::Result<Vec<u8>> {
        let cipher = self.cipher(context_info)?;
        let mut nonce = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: context_info.as_bytes(),
                },
            )
            .map_err(|e| Error::Internal(format!("encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_BYTES + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }
}

impl RequestDecrypter for AeadSealer {
    fn decrypt(&self, ciphertext: &[u8], context_info: &str) -> crate::Result<Vec<u8>> {
        if ciphertext.len() < NONCE_BYTES + TAG_BYTES {
            return Err(Error::Internal(format!(
                "sealed request too short: {} bytes",
                ciphertext.len()
            )));
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_BYTES);
        self.cipher(context_info)?
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: context_info.as_bytes(),
                },
            )
            .map_err(|_| Error::Internal("decryption failed".to_string()))
    }
}

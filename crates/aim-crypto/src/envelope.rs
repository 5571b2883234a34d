//! Secure Envelope: an authenticated-encryption framing for persisted state.
//!
//! Mirrors the password-backup scheme in the shield-messenger reference
//! (Argon2id-derived key over a per-file AEAD) but swaps the cipher for
//! XChaCha20-Poly1305 so the 24-byte nonce can be drawn fresh every time
//! without a counter, and pins the KDF parameters the daemon always uses
//! rather than exposing them as caller-chosen knobs.

use aim_core::errors::{AimError, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Magic bytes prefixed to every framed envelope on disk.
const MAGIC: &[u8] = b"AIMENV1\0";

const KDF_NAME: &str = "argon2id";
const ARGON2_TIME_COST: u32 = 2;
const ARGON2_MEMORY_KIB: u32 = 65_536;
const ARGON2_PARALLELISM: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnvelopeMetadata {
    version: u8,
    kdf: String,
    time: u32,
    memory_kb: u32,
    threads: u32,
}

impl EnvelopeMetadata {
    fn canonical() -> Self {
        Self {
            version: 1,
            kdf: KDF_NAME.to_owned(),
            time: ARGON2_TIME_COST,
            memory_kb: ARGON2_MEMORY_KIB,
            threads: ARGON2_PARALLELISM,
        }
    }

    fn matches_canonical(&self) -> bool {
        let canonical = Self::canonical();
        self.version == canonical.version
            && self.kdf == canonical.kdf
            && self.time == canonical.time
            && self.memory_kb == canonical.memory_kb
            && self.threads == canonical.threads
    }
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_TIME_COST, ARGON2_PARALLELISM, Some(KEY_LEN))
        .map_err(|e| AimError::crypto(format!("invalid argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|_| AimError::crypto("key derivation failed"))?;
    Ok(key)
}

/// Encrypt `plaintext` under `passphrase`, producing a self-describing,
/// magic-prefixed envelope.
pub fn encrypt(passphrase: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let mut key = derive_key(passphrase, &salt)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|e| AimError::crypto(e.to_string()))?;
    let nonce = XNonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| AimError::crypto("encryption failed"))?;
    key.zeroize();

    let metadata = EnvelopeMetadata::canonical();
    let metadata_json =
        serde_json::to_vec(&metadata).map_err(|e| AimError::crypto(format!("metadata encode: {e}")))?;

    let mut framed = Vec::with_capacity(
        MAGIC.len() + 4 + metadata_json.len() + SALT_LEN + NONCE_LEN + ciphertext.len(),
    );
    framed.extend_from_slice(MAGIC);
    framed.extend_from_slice(&(metadata_json.len() as u32).to_be_bytes());
    framed.extend_from_slice(&metadata_json);
    framed.extend_from_slice(&salt);
    framed.extend_from_slice(&nonce_bytes);
    framed.extend_from_slice(&ciphertext);
    Ok(framed)
}

/// Decrypt a framed envelope under `passphrase`.
///
/// Any structural anomaly (missing magic, unparseable or non-canonical
/// metadata, malformed salt/nonce lengths, empty ciphertext) is rejected
/// before the AEAD ever runs. A wrong passphrase surfaces as the distinct
/// `AUTH_FAILED`-style crypto error from a failed AEAD open.
pub fn decrypt(passphrase: &str, framed: &[u8]) -> Result<Vec<u8>> {
    if framed.len() < MAGIC.len() + 4 || &framed[..MAGIC.len()] != MAGIC {
        return Err(AimError::crypto("envelope: missing magic prefix"));
    }
    let mut offset = MAGIC.len();

    let meta_len = u32::from_be_bytes(
        framed[offset..offset + 4]
            .try_into()
            .map_err(|_| AimError::crypto("envelope: truncated metadata length"))?,
    ) as usize;
    offset += 4;

    if framed.len() < offset + meta_len + SALT_LEN + NONCE_LEN {
        return Err(AimError::crypto("envelope: truncated metadata or framing"));
    }
    let metadata: EnvelopeMetadata = serde_json::from_slice(&framed[offset..offset + meta_len])
        .map_err(|_| AimError::crypto("envelope: unknown or missing metadata"))?;
    offset += meta_len;

    if !metadata.matches_canonical() {
        return Err(AimError::crypto("envelope: kdf parameters differ from canonical"));
    }

    let salt = &framed[offset..offset + SALT_LEN];
    offset += SALT_LEN;
    let nonce_bytes = &framed[offset..offset + NONCE_LEN];
    offset += NONCE_LEN;
    let ciphertext = &framed[offset..];

    if ciphertext.is_empty() {
        return Err(AimError::crypto("envelope: empty ciphertext"));
    }

    let mut key = derive_key(passphrase, salt)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|e| AimError::crypto(e.to_string()))?;
    let nonce = XNonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| AimError::crypto("AUTH_FAILED"));
    key.zeroize();
    plaintext
}

//! # suve-crypto: Passphrase codec for state files
//!
//! Encrypts and decrypts arbitrary bytes under a user passphrase. The
//! output is self-describing: it starts with a fixed magic prefix so a
//! reader can recognize ciphertext with a constant-length prefix check and
//! fall back to plaintext parsing otherwise.
//!
//! ## Format
//!
//! ```text
//! | "SUVE\x01" | salt (16) | nonce (12) | AES-256-GCM ciphertext + tag |
//! ```
//!
//! The key is derived per file with HKDF-SHA256 from the passphrase and
//! the random salt. The GCM tag covers the whole payload, so tampering
//! and wrong passphrases are indistinguishable from the caller's point of
//! view: both surface as [`CryptoError::DecryptionFailed`].

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

/// Magic prefix stamped on every encrypted payload.
pub const MAGIC: &[u8] = b"SUVE\x01";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// HKDF info string binding derived keys to this codec.
const KDF_INFO: &[u8] = b"suve state file v1";

/// Codec failures.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: wrong passphrase or corrupted data")]
    DecryptionFailed,

    #[error("data is not in the encrypted state-file format")]
    NotEncrypted,
}

/// Constant-length prefix check: true when `bytes` is this codec's output.
pub fn is_encrypted(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Encrypts `plaintext` under `passphrase` with a fresh salt and nonce.
pub fn seal(plaintext: &[u8], passphrase: &str) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(passphrase, &salt)?;
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::EncryptionFailed)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(MAGIC.len() + SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts bytes previously produced by [`seal`].
///
/// Returns [`CryptoError::NotEncrypted`] when the magic prefix is absent
/// and [`CryptoError::DecryptionFailed`] for a wrong passphrase, a
/// truncated payload, or tampered ciphertext. Never panics on malformed
/// input.
pub fn open(bytes: &[u8], passphrase: &str) -> Result<Vec<u8>, CryptoError> {
    if !is_encrypted(bytes) {
        return Err(CryptoError::NotEncrypted);
    }
    let body = &bytes[MAGIC.len()..];
    if body.len() < SALT_LEN + NONCE_LEN {
        return Err(CryptoError::DecryptionFailed);
    }
    let (salt, rest) = body.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase, salt)?;
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::DecryptionFailed)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), passphrase.as_bytes());
    let mut key = [0u8; KEY_LEN];
    hk.expand(KDF_INFO, &mut key)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn round_trips_under_the_same_passphrase() {
        let sealed = seal(b"{\"version\":2}", "pw").unwrap();
        assert!(is_encrypted(&sealed));
        let opened = open(&sealed, "pw").unwrap();
        assert_eq!(opened, b"{\"version\":2}");
    }

    #[test]
    fn wrong_passphrase_is_decryption_failed() {
        let sealed = seal(b"payload", "pw").unwrap();
        assert!(matches!(
            open(&sealed, "wrong"),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn plaintext_is_not_recognized_as_encrypted() {
        assert!(!is_encrypted(b"{\"version\":2}"));
        assert!(matches!(
            open(b"{\"version\":2}", "pw"),
            Err(CryptoError::NotEncrypted)
        ));
    }

    #[test]
    fn truncated_payload_is_decryption_failed() {
        let mut sealed = seal(b"payload", "pw").unwrap();
        sealed.truncate(MAGIC.len() + 4);
        assert!(matches!(
            open(&sealed, "pw"),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_is_decryption_failed() {
        let mut sealed = seal(b"payload", "pw").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            open(&sealed, "pw"),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn two_seals_of_the_same_payload_differ() {
        // Fresh salt and nonce per file.
        let a = seal(b"payload", "pw").unwrap();
        let b = seal(b"payload", "pw").unwrap();
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn seal_open_round_trips(payload in proptest::collection::vec(any::<u8>(), 0..2048),
                                 passphrase in "[ -~]{0,32}") {
            let sealed = seal(&payload, &passphrase).unwrap();
            prop_assert!(is_encrypted(&sealed));
            prop_assert_eq!(open(&sealed, &passphrase).unwrap(), payload);
        }
    }
}

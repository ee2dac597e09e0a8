//! Authenticated encryption of secret payloads.
//!
//! Stored form: `base64(nonce (12 bytes) || ChaCha20Poly1305 ciphertext + tag)`,
//! printable so it can sit in any text column.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};
use thiserror::Error;
use zeroize::Zeroize;

use super::kdf::DerivedKey;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("encryption failed")]
    Encrypt,
    /// Wrong key, tampered data and bad framing all look the same.
    #[error("authentication failed")]
    Authentication,
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(plaintext: &str, key: &DerivedKey) -> Result<String, CryptoError> {
    let cipher =
        ChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Encrypt)?;
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::Encrypt)?;

    let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    framed.extend_from_slice(&nonce);
    framed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(framed))
}

/// Verify and decrypt a stored form, returning the original text.
pub fn open(stored: &str, key: &DerivedKey) -> Result<String, CryptoError> {
    let framed = STANDARD
        .decode(stored)
        .map_err(|_| CryptoError::Authentication)?;
    if framed.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Authentication);
    }
    let (nonce, ciphertext) = framed.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::Authentication)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Authentication)?;

    String::from_utf8(plaintext).map_err(|e| {
        e.into_bytes().zeroize();
        CryptoError::Authentication
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kdf::{derive_key, generate_salt, test_params};

    fn key(passphrase: &str) -> DerivedKey {
        derive_key(passphrase, &generate_salt(), &test_params()).unwrap()
    }

    #[test]
    fn roundtrip_returns_text() {
        let k = key("x");
        let sealed = seal("hello", &k).unwrap();
        let opened: String = open(&sealed, &k).unwrap();
        assert_eq!(opened, "hello");
    }

    #[test]
    fn roundtrip_empty_string() {
        let k = key("x");
        let sealed = seal("", &k).unwrap();
        assert!(!sealed.is_empty());
        assert_eq!(open(&sealed, &k).unwrap(), "");
    }

    #[test]
    fn roundtrip_unicode_and_multiline() {
        let k = key("x");
        for text in [
            "Hello 世界 🔐 Привет مرحبا",
            "line one\nline two\r\n\ttabbed",
            "!@#$%^&*()_+-=[]{}|;':\",./<>?`~",
            "\u{0}nul\u{0}",
        ] {
            assert_eq!(open(&seal(text, &k).unwrap(), &k).unwrap(), text);
        }
    }

    #[test]
    fn roundtrip_large_payload() {
        let k = key("x");
        let text = "A".repeat(50 * 1024);
        assert_eq!(open(&seal(&text, &k).unwrap(), &k).unwrap(), text);
    }

    #[test]
    fn stored_form_is_printable() {
        let sealed = seal("payload", &key("x")).unwrap();
        assert!(sealed.chars().all(|c| c.is_ascii_graphic()));
    }

    #[test]
    fn same_plaintext_seals_differently() {
        let k = key("x");
        assert_ne!(seal("same", &k).unwrap(), seal("same", &k).unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal("payload", &key("right")).unwrap();
        assert!(matches!(
            open(&sealed, &key("wrong")),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn same_passphrase_other_salt_fails() {
        let sealed = seal("payload", &key("same")).unwrap();
        assert!(matches!(
            open(&sealed, &key("same")),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let k = key("x");
        let sealed = seal("payload", &k).unwrap();
        let mut framed = STANDARD.decode(&sealed).unwrap();
        let last = framed.len() - 1;
        framed[last] ^= 0x01;
        let tampered = STANDARD.encode(framed);
        assert!(matches!(
            open(&tampered, &k),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn malformed_stored_forms_fail_uniformly() {
        let k = key("x");
        let truncated = STANDARD.encode([0u8; 27]);
        for stored in ["", "not base64 at all!", "AAAA", truncated.as_str()] {
            assert!(
                matches!(open(stored, &k), Err(CryptoError::Authentication)),
                "expected authentication failure for {stored:?}"
            );
        }
    }

    #[test]
    fn invalid_utf8_plaintext_fails_closed() {
        let k = key("x");
        let cipher = ChaCha20Poly1305::new_from_slice(k.as_bytes()).unwrap();
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher.encrypt(&nonce, b"\xff\xfe\xfd".as_slice()).unwrap();
        let mut framed = nonce.to_vec();
        framed.extend_from_slice(&ciphertext);
        assert!(matches!(
            open(&STANDARD.encode(framed), &k),
            Err(CryptoError::Authentication)
        ));
    }
}

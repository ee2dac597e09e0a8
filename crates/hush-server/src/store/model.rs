use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::ZeroizeOnDrop;

use super::kdf::{KdfParams, Salt};
use crate::token::encode_token;

/// How long an unread secret stays available, in seconds.
pub const SECRET_TTL_SECS: i64 = 10 * 60;

/// Stored in redb as bincode-encoded bytes, keyed by `id`.
/// Every field is written once at creation; a record is deleted, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct SecretRecord {
    #[zeroize(skip)]
    pub id: Uuid,
    /// Per-record random salt for key derivation.
    pub salt: Salt,
    /// Argon2id parameters the key was derived with.
    #[zeroize(skip)]
    pub kdf: KdfParams,
    /// Sealed payload, see [`super::crypto::seal`].
    pub ciphertext: String,
    /// Unix timestamp (seconds) when the record was created.
    pub created_at: i64,
}

impl SecretRecord {
    /// Byte length of the stored ciphertext.
    pub fn size(&self) -> usize {
        self.ciphertext.len()
    }

    pub fn expire_at(&self) -> i64 {
        self.created_at + SECRET_TTL_SECS
    }

    pub fn public_token(&self) -> String {
        encode_token(self.id)
    }

    /// A record is available up to and including `expire_at`.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expire_at()
    }

    pub fn meta(&self, now: i64) -> SecretMeta {
        SecretMeta {
            id: self.id,
            token: self.public_token(),
            size: self.size(),
            created_at: self.created_at,
            expire_at: self.expire_at(),
            available: !self.is_expired(now),
        }
    }
}

/// Metadata returned on admin listings. Never includes the ciphertext or salt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretMeta {
    pub id: Uuid,
    pub token: String,
    pub size: usize,
    pub created_at: i64,
    pub expire_at: i64,
    pub available: bool,
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

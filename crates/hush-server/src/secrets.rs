//! Create-once, read-once secrets.
//!
//! A secret is sealed under a key derived from the sharer's passphrase and a
//! salt unique to the record. Revealing it re-derives the key, opens the
//! ciphertext and, only once that succeeds, removes the record before handing
//! the plaintext back. A wrong passphrase leaves the record as it was.

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{
    derive_key, generate_salt, open, seal, unix_now, CryptoError, KdfParams, SecretMeta,
    SecretRecord, Store, TakeResult,
};
use crate::token::decode_token;

/// Largest accepted payload, in UTF-8 bytes.
pub const DEFAULT_MAX_SECRET_BYTES: usize = 50 * 1024;

/// Limits and cost parameters applied when creating secrets.
#[derive(Debug, Clone)]
pub struct Policy {
    pub max_secret_bytes: usize,
    pub kdf: KdfParams,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_secret_bytes: DEFAULT_MAX_SECRET_BYTES,
            kdf: KdfParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("nothing to share")]
    EmptyPayload,
    #[error("a passphrase is required")]
    EmptyPassphrase,
    #[error("secret is {size} bytes; the maximum is {max} bytes")]
    TooLarge { size: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum CreateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("could not seal secret: {0}")]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum RevealError {
    /// Malformed token, unknown id, expired or already revealed.
    #[error("secret not found or expired")]
    NotFound,
    #[error("wrong passphrase")]
    WrongPassphrase,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Check a payload and passphrase before anything is derived or stored.
pub fn validate(
    plaintext: &str,
    passphrase: &str,
    max_secret_bytes: usize,
) -> Result<(), ValidationError> {
    if plaintext.is_empty() {
        return Err(ValidationError::EmptyPayload);
    }
    if passphrase.is_empty() {
        return Err(ValidationError::EmptyPassphrase);
    }
    let size = plaintext.len();
    if size > max_secret_bytes {
        return Err(ValidationError::TooLarge {
            size,
            max: max_secret_bytes,
        });
    }
    Ok(())
}

/// Secret lifecycle on top of a [`Store`]. Stateless apart from storage;
/// clone freely across tasks.
#[derive(Clone)]
pub struct Secrets {
    store: Store,
    policy: Policy,
    clock: fn() -> i64,
}

impl Secrets {
    pub fn new(store: Store, policy: Policy) -> Self {
        Self::with_clock(store, policy, unix_now)
    }

    /// Like [`Secrets::new`] with a custom source of unix seconds.
    pub fn with_clock(store: Store, policy: Policy, clock: fn() -> i64) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Seal `plaintext` under `passphrase` and persist it as a new record.
    ///
    /// Blocks for the duration of key derivation; run it off the async runtime.
    pub fn create_secret(
        &self,
        plaintext: &str,
        passphrase: &str,
    ) -> Result<SecretRecord, CreateError> {
        validate(plaintext, passphrase, self.policy.max_secret_bytes)?;

        let salt = generate_salt();
        let key = derive_key(passphrase, &salt, &self.policy.kdf)?;
        let ciphertext = seal(plaintext, &key)?;
        drop(key);

        // A v4 id clash is astronomically unlikely; retry rather than overwrite.
        loop {
            let record = SecretRecord {
                id: Uuid::new_v4(),
                salt,
                kdf: self.policy.kdf,
                ciphertext: ciphertext.clone(),
                created_at: (self.clock)(),
            };
            if self.store.insert(&record)? {
                info!(
                    id = %record.id,
                    size = record.size(),
                    expire_at = record.expire_at(),
                    "secret created"
                );
                return Ok(record);
            }
        }
    }

    /// Open the secret behind `token` and delete it.
    ///
    /// Blocks for the duration of key derivation; run it off the async runtime.
    pub fn reveal_secret(&self, token: &str, passphrase: &str) -> Result<String, RevealError> {
        let id = decode_token(token).map_err(|e| {
            debug!(error = %e, "reveal: malformed token");
            RevealError::NotFound
        })?;

        let Some(record) = self.store.get_available(id, (self.clock)())? else {
            debug!(%id, "reveal: no available secret");
            return Err(RevealError::NotFound);
        };

        // No storage transaction is held while the key is derived.
        let plaintext = derive_key(passphrase, &record.salt, &record.kdf)
            .and_then(|key| open(&record.ciphertext, &key))
            .map_err(|_| {
                info!(%id, "reveal: wrong passphrase");
                RevealError::WrongPassphrase
            })?;

        match self.store.take(id, (self.clock)())? {
            TakeResult::Taken(_) => {
                info!(%id, "secret revealed and deleted");
                Ok(plaintext)
            }
            TakeResult::Expired => {
                info!(%id, "reveal: secret expired during reveal; deleted");
                Err(RevealError::NotFound)
            }
            TakeResult::Missing => {
                debug!(%id, "reveal: secret consumed concurrently");
                Err(RevealError::NotFound)
            }
        }
    }

    /// Metadata of the secret behind `token` if it can still be revealed.
    pub fn peek(&self, token: &str) -> anyhow::Result<Option<SecretMeta>> {
        let Ok(id) = decode_token(token) else {
            return Ok(None);
        };
        let now = (self.clock)();
        Ok(self.store.get_available(id, now)?.map(|r| r.meta(now)))
    }

    /// Delete the secret behind `token` regardless of its state.
    pub fn delete_secret(&self, token: &str) -> anyhow::Result<bool> {
        let Ok(id) = decode_token(token) else {
            return Ok(false);
        };
        let existed = self.store.delete(id)?;
        if existed {
            info!(%id, "secret deleted");
        }
        Ok(existed)
    }
}

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use super::crypto::CryptoError;

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

pub type Salt = [u8; SALT_LEN];

/// Argon2id cost parameters. Stored on every record so that raising the
/// defaults never invalidates secrets created under older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Check that argon2 accepts these parameters.
    pub fn validate(&self) -> Result<(), CryptoError> {
        self.argon2().map(|_| ())
    }

    fn argon2(&self) -> Result<Argon2<'static>, CryptoError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// 32-byte symmetric key derived from a passphrase. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Fresh random salt from the OS CSPRNG.
pub fn generate_salt() -> Salt {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive the key for one record. A pure function of its arguments: the same
/// passphrase, salt and parameters always give the same key.
pub fn derive_key(
    passphrase: &str,
    salt: &Salt,
    params: &KdfParams,
) -> Result<DerivedKey, CryptoError> {
    let mut output = [0u8; KEY_LEN];
    params
        .argon2()?
        .hash_password_into(passphrase.as_bytes(), salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(DerivedKey(output))
}

#[cfg(test)]
pub(crate) fn test_params() -> KdfParams {
    KdfParams {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    }
}

pub mod crypto;
pub mod db;
pub mod kdf;
pub mod model;

pub use crypto::{open, seal, CryptoError};
pub use db::{Store, TakeResult};
pub use kdf::{derive_key, generate_salt, DerivedKey, KdfParams, Salt};
pub use model::{unix_now, SecretMeta, SecretRecord, SECRET_TTL_SECS};

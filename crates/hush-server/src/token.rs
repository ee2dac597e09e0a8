//! Public tokens for secrets.
//!
//! A token is the raw 16 bytes of a record id in URL-safe base64 with the
//! padding stripped. It is a representation only: unguessability comes from
//! the id being drawn from a CSPRNG, not from this encoding.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;
use uuid::Uuid;

/// Length of every token produced by [`encode_token`].
pub const TOKEN_LEN: usize = 22;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token must be 22 characters, got {0}")]
    Length(usize),
    #[error("token is not url-safe base64")]
    Encoding,
}

/// Encode a record id as a 22-character URL-safe token.
pub fn encode_token(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

/// Decode a token back into the record id.
///
/// Total over arbitrary input: anything that is not the canonical encoding of
/// 16 bytes is a [`TokenError`]. Non-canonical trailing bits are rejected, so
/// every id has exactly one token.
pub fn decode_token(token: &str) -> Result<Uuid, TokenError> {
    if token.len() != TOKEN_LEN {
        return Err(TokenError::Length(token.len()));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| TokenError::Encoding)?;
    let bytes: [u8; 16] = bytes.try_into().map_err(|_| TokenError::Encoding)?;
    Ok(Uuid::from_bytes(bytes))
}

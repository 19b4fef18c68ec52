//! Payload codec: text-safe transcoding of binary payloads.
//!
//! Chat message bodies are text with a hard per-message character limit.
//! Payloads are carried as RFC 4648 base64 (standard alphabet, padded):
//! printable ASCII, one byte per character, so the encoded length of `n`
//! raw bytes is exactly `4 * ceil(n / 3)`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid UTF-8 text")]
    NotText,
}

/// Encode raw bytes into message-safe text.
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode message text back into raw bytes.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(text.as_bytes())?)
}

/// Decode encoded text held as raw bytes (e.g. a downloaded attachment).
pub fn decode_bytes(encoded: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let text = std::str::from_utf8(encoded).map_err(|_| DecodeError::NotText)?;
    decode(text)
}

/// Exact encoded length of `raw_len` bytes.
pub const fn encoded_len(raw_len: usize) -> usize {
    raw_len.div_ceil(3) * 4
}

/// Largest raw byte count whose encoding fits in `body_limit` characters.
///
/// Zero when the limit cannot hold a single base64 quantum.
pub const fn max_chunk_bytes(body_limit: usize) -> usize {
    (body_limit / 4) * 3
}

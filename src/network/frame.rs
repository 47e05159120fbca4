use crate::{AppError, AppResult};

/// Width of the length prefix on the wire.
pub const LENGTH_PREFIX_SIZE: usize = std::mem::size_of::<i32>();

/// Largest payload accepted unless configured otherwise.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1024;

// The prefix is written in the sender's native byte order. Two hosts with
// different endianness cannot talk to each other; there is no negotiation
// and no version field to detect it.

/// Encodes the length prefix for a payload of `len` bytes.
pub fn encode_length(len: usize) -> AppResult<[u8; LENGTH_PREFIX_SIZE]> {
    let len = i32::try_from(len).map_err(|_| {
        AppError::MalformedProtocol(format!("payload of {} bytes does not fit the prefix", len))
    })?;
    Ok(len.to_ne_bytes())
}

/// Decodes a length prefix and checks `0 <= length <= max_len`.
///
/// A length outside that range cannot be skipped over, since the stream has
/// no resynchronisation marker. The caller must give up on the connection.
pub fn decode_length(prefix: [u8; LENGTH_PREFIX_SIZE], max_len: usize) -> AppResult<usize> {
    let body_size = i32::from_ne_bytes(prefix);
    if body_size < 0 {
        return Err(AppError::MalformedProtocol(format!(
            "frame size {} less than 0",
            body_size
        )));
    }
    let body_size = body_size as usize;
    if body_size > max_len {
        return Err(AppError::MalformedProtocol(format!(
            "Frame of length {} is too large.",
            body_size
        )));
    }
    Ok(body_size)
}

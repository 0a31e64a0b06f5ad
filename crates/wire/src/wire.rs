// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed JSON framing for `EventMessage`/`WorkItem` traffic
//! carried over a Worker's stdio pipes.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message of {0} bytes exceeds the {1} byte frame limit")]
    TooLarge(usize, usize),
}

/// Hard cap on a single frame. Generous for lifecycle/pubsub payloads,
/// small enough to bound memory if a peer sends garbage.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Serialize `value` to raw JSON bytes (no length prefix).
pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// Deserialize raw JSON bytes.
pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write `payload` prefixed with its length as a 4-byte big-endian `u32`.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::TooLarge(payload.len(), MAX_FRAME_BYTES));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a single length-prefixed frame.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::TooLarge(len, MAX_FRAME_BYTES));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write a single serializable value as one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin, T: serde::Serialize>(
    writer: &mut W,
    value: &T,
) -> Result<(), ProtocolError> {
    let encoded = encode(value)?;
    write_message(writer, &encoded).await
}

/// Read one length-prefixed frame and deserialize it.
pub async fn read_frame<R: AsyncRead + Unpin, T: serde::de::DeserializeOwned>(
    reader: &mut R,
) -> Result<T, ProtocolError> {
    let bytes = read_message(reader).await?;
    decode(&bytes)
}

/// Blocking counterpart of [`write_message`], used by the Worker binary's
/// single-threaded stdio loop where pulling in a tokio runtime buys
/// nothing.
pub fn write_message_sync<W: std::io::Write>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::TooLarge(payload.len(), MAX_FRAME_BYTES));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Blocking counterpart of [`read_message`].
pub fn read_message_sync<R: std::io::Read>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::TooLarge(len, MAX_FRAME_BYTES));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Blocking counterpart of [`write_frame`].
pub fn write_frame_sync<W: std::io::Write, T: serde::Serialize>(
    writer: &mut W,
    value: &T,
) -> Result<(), ProtocolError> {
    let encoded = encode(value)?;
    write_message_sync(writer, &encoded)
}

/// Blocking counterpart of [`read_frame`].
pub fn read_frame_sync<R: std::io::Read, T: serde::de::DeserializeOwned>(
    reader: &mut R,
) -> Result<T, ProtocolError> {
    let bytes = read_message_sync(reader)?;
    decode(&bytes)
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;

use std::io::{self, ErrorKind};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::frame::{decode_length, encode_length, LENGTH_PREFIX_SIZE};
use crate::{AppError, AppResult};

fn is_connection_lost(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
    )
}

/// Reads wire units from the inbound half of a connection.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    buffer: BytesMut,
    max_message_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_message_len: usize) -> FrameReader<R> {
        FrameReader {
            reader,
            buffer: BytesMut::with_capacity(max_message_len),
            max_message_len,
        }
    }

    /// Reads one wire unit and returns its payload.
    ///
    /// Returns `PeerLost` when the connection goes away while waiting for a
    /// length prefix, `MalformedProtocol` for an out-of-range length (the
    /// body is left unread) and `TransportRead` for every other failure,
    /// including a connection that closes in the middle of a body.
    pub async fn read_frame(&mut self) -> AppResult<Bytes> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        if let Err(err) = self.reader.read_exact(&mut prefix).await {
            return Err(if is_connection_lost(&err) {
                AppError::PeerLost
            } else {
                AppError::TransportRead(format!("data length: {}", err))
            });
        }
        let body_size = decode_length(prefix, self.max_message_len)?;

        self.buffer.clear();
        self.buffer.resize(body_size, 0);
        self.reader
            .read_exact(&mut self.buffer[..])
            .await
            .map_err(|e| AppError::TransportRead(format!("{} byte body: {}", body_size, e)))?;
        Ok(self.buffer.split().freeze())
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes wire units to the outbound half of a connection.
///
/// Unbuffered: a failed write must not leave part of a dropped message
/// queued in front of the next one.
#[derive(Debug)]
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> FrameWriter<W> {
        FrameWriter { writer }
    }

    /// Writes the length prefix, then the payload, as two transport writes.
    ///
    /// If the prefix cannot be written the payload is never sent. Returns the
    /// number of payload bytes handed to the transport.
    pub async fn write_frame(&mut self, payload: &[u8]) -> AppResult<usize> {
        let prefix = encode_length(payload.len())?;
        self.writer
            .write_all(&prefix)
            .await
            .map_err(|e| AppError::TransportWrite(format!("size of msg: {}", e)))?;
        self.writer
            .write_all(payload)
            .await
            .map_err(|e| AppError::TransportWrite(format!("msg body: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| AppError::TransportWrite(format!("flush: {}", e)))?;
        Ok(payload.len())
    }

    /// Flushes and closes the write direction.
    pub async fn shutdown(&mut self) -> AppResult<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

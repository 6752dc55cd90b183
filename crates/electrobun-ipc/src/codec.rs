//! Newline-delimited JSON framing.
//!
//! Outbound messages are serialized once and written in slices of at most
//! [`CHUNK_SIZE`] bytes followed by a lone `\n`. A single large write into a
//! FIFO can exceed the kernel pipe buffer and leave the reader's readiness
//! notification unfired, so writers must never hand more than one chunk to
//! the OS at a time.
//!
//! Inbound bytes are accumulated until a newline appears; the line before it
//! is one message. Malformed lines are logged and skipped without disturbing
//! the framing of what follows.

use bytes::BytesMut;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{trace, warn};

/// Upper bound for a single write into a channel.
pub const CHUNK_SIZE: usize = 4096;

/// Message terminator, always written on its own.
pub const TERMINATOR: &[u8] = b"\n";

/// A message serialized to its wire text, ready to be chunked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    text: String,
}

impl EncodedMessage {
    pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<Self, serde_json::Error> {
        // serde_json never emits a raw newline in compact mode; control
        // characters inside strings are escaped.
        Ok(Self {
            text: serde_json::to_string(message)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Body split on byte boundaries. No empty trailing chunk is produced
    /// when the length is an exact multiple of [`CHUNK_SIZE`].
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.text.as_bytes().chunks(CHUNK_SIZE)
    }

    /// Every write needed to put this message on a pipe: the body chunks,
    /// then the terminator.
    pub fn writes(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks().chain(std::iter::once(TERMINATOR))
    }
}

/// Write one encoded message, chunk by chunk.
pub async fn write_message<W>(writer: &mut W, message: &EncodedMessage) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    for chunk in message.writes() {
        writer.write_all(chunk).await?;
    }
    writer.flush().await
}

/// Splits an inbound byte stream into JSON values, one per line.
#[derive(Debug, Default)]
pub struct JsonLineCodec {
    /// Offset already scanned for a newline in the current buffer.
    next_index: usize,
}

impl JsonLineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for JsonLineCodec {
    type Item = serde_json::Value;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = buf[self.next_index..].iter().position(|b| *b == b'\n') else {
                self.next_index = buf.len();
                return Ok(None);
            };

            let line = buf.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let text = line[..line.len() - 1].trim_ascii();
            if text.is_empty() {
                continue;
            }

            match serde_json::from_slice(text) {
                Ok(value) => {
                    trace!(bytes = text.len(), "frame decoded");
                    return Ok(Some(value));
                }
                Err(e) => {
                    warn!(bytes = text.len(), error = %e, "discarding malformed frame");
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(value) = self.decode(buf)? {
            return Ok(Some(value));
        }
        if !buf.trim_ascii().is_empty() {
            warn!(bytes = buf.len(), "discarding unterminated frame at end of stream");
        }
        buf.clear();
        self.next_index = 0;
        Ok(None)
    }
}

/// Lazily decode a byte stream into JSON values. The stream ends when the
/// reader reports end-of-data; it cannot be restarted.
pub fn decode_stream<R: AsyncRead>(reader: R) -> FramedRead<R, JsonLineCodec> {
    FramedRead::new(reader, JsonLineCodec::new())
}

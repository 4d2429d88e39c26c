use std::io;

use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Longest line accepted from a peer, excluding the terminator.
pub const MAX_LINE_LENGTH: usize = 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("line longer than {MAX_LINE_LENGTH} bytes")]
    LineTooLong,
}

impl From<LinesCodecError> for CodecError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => Self::LineTooLong,
            LinesCodecError::Io(err) => Self::Io(err),
        }
    }
}

/// Newline-delimited UTF-8 text frames.
///
/// Unlike a bare `LinesCodec`, bytes left over when the stream ends are an
/// error instead of a final line: a message only counts once its `\n` arrived.
#[derive(Debug)]
pub struct PingCodec {
    lines: LinesCodec,
}

impl PingCodec {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }
}

impl Default for PingCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PingCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.lines.decode(src).map_err(Into::into)
    }
}

impl Encoder<&str> for PingCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.lines.encode(item, dst).map_err(Into::into)
    }
}

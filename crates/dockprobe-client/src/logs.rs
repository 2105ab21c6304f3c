//! Demultiplexing of container log streams.
//!
//! For containers without a TTY the daemon interleaves stdout and stderr in
//! one body, each chunk prefixed with an 8-byte header:
//!
//! ```text
//! ┌─────────┬────────────────┬──────────────────┬────────────────┐
//! │ channel │ reserved       │ length (u32, BE) │ payload        │
//! │ 1 byte  │ 3 bytes, zero  │ 4 bytes          │ `length` bytes │
//! └─────────┴────────────────┴──────────────────┴────────────────┘
//! ```
//!
//! The stream ends at end-of-body; there is no terminator frame.

use std::fmt;
use thiserror::Error;

/// Size of a frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Output channel a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    /// Standard output.
    Stdout = 1,
    /// Standard error.
    Stderr = 2,
}

impl TryFrom<u8> for Channel {
    type Error = u8;

    fn try_from(id: u8) -> Result<Self, u8> {
        match id {
            1 => Ok(Self::Stdout),
            2 => Ok(Self::Stderr),
            other => Err(other),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// A single decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFrame<'a> {
    /// Channel tag.
    pub channel: Channel,
    /// Payload bytes.
    pub payload: &'a [u8],
}

/// Framing violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer than [`HEADER_LEN`] bytes remained where a header was expected.
    #[error("truncated frame header at offset {offset}: {available} of 8 bytes available")]
    TruncatedHeader {
        /// Byte offset of the frame.
        offset: usize,
        /// Bytes left in the stream.
        available: usize,
    },

    /// The payload is shorter than the header declares.
    #[error(
        "truncated frame at offset {offset}: header declares {declared} payload bytes, {available} available"
    )]
    TruncatedFrame {
        /// Byte offset of the frame.
        offset: usize,
        /// Length from the header.
        declared: usize,
        /// Payload bytes left in the stream.
        available: usize,
    },

    /// The channel tag is neither stdout nor stderr.
    #[error("unrecognized channel id {id} at offset {offset}")]
    UnrecognizedChannel {
        /// Byte offset of the frame.
        offset: usize,
        /// The tag found.
        id: u8,
    },
}

/// Iterator over the frames of a fully buffered log stream.
///
/// Yields at most one error, after which it is exhausted.
#[derive(Debug, Clone)]
pub struct LogFrames<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> LogFrames<'a> {
    /// Creates an iterator over `buf`.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            done: false,
        }
    }

    fn fail(&mut self, error: FrameError) -> Option<Result<LogFrame<'a>, FrameError>> {
        self.done = true;
        Some(Err(error))
    }
}

impl<'a> Iterator for LogFrames<'a> {
    type Item = Result<LogFrame<'a>, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let offset = self.offset;
        let rest = &self.buf[offset..];
        if rest.is_empty() {
            self.done = true;
            return None;
        }

        let Some((header, body)) = rest.split_first_chunk::<HEADER_LEN>() else {
            return self.fail(FrameError::TruncatedHeader {
                offset,
                available: rest.len(),
            });
        };

        let channel = match Channel::try_from(header[0]) {
            Ok(channel) => channel,
            Err(id) => return self.fail(FrameError::UnrecognizedChannel { offset, id }),
        };
        let declared = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let Some(payload) = body.get(..declared) else {
            return self.fail(FrameError::TruncatedFrame {
                offset,
                declared,
                available: body.len(),
            });
        };

        self.offset += HEADER_LEN + declared;
        Some(Ok(LogFrame { channel, payload }))
    }
}

/// Demultiplexed output as raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLogs {
    /// Concatenated stdout payloads in frame order.
    pub stdout: Vec<u8>,
    /// Concatenated stderr payloads in frame order.
    pub stderr: Vec<u8>,
}

impl RawLogs {
    fn push(&mut self, frame: LogFrame<'_>) {
        match frame.channel {
            Channel::Stdout => self.stdout.extend_from_slice(frame.payload),
            Channel::Stderr => self.stderr.extend_from_slice(frame.payload),
        }
    }

    /// Decodes both channels as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidUtf8`] naming the first channel that
    /// does not decode; the raw bytes are kept as the partial result.
    pub fn decode(self) -> Result<DemuxedLogs, ProtocolError> {
        let stdout = match String::from_utf8(self.stdout) {
            Ok(text) => text,
            Err(e) => {
                return Err(ProtocolError::InvalidUtf8 {
                    channel: Channel::Stdout,
                    source: e.utf8_error(),
                    partial: Self {
                        stdout: e.into_bytes(),
                        stderr: self.stderr,
                    },
                });
            }
        };
        let stderr = match String::from_utf8(self.stderr) {
            Ok(text) => text,
            Err(e) => {
                return Err(ProtocolError::InvalidUtf8 {
                    channel: Channel::Stderr,
                    source: e.utf8_error(),
                    partial: Self {
                        stdout: stdout.into_bytes(),
                        stderr: e.into_bytes(),
                    },
                });
            }
        };
        Ok(DemuxedLogs { stdout, stderr })
    }
}

/// Demultiplexed output decoded as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemuxedLogs {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

/// A malformed log stream.
///
/// Carries whatever was demultiplexed before the problem was found.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Bad framing.
    #[error("malformed log stream: {source}")]
    Frame {
        /// What was wrong with the frame.
        #[source]
        source: FrameError,
        /// Output from the frames before it.
        partial: RawLogs,
    },

    /// A channel's bytes are not UTF-8.
    #[error("{channel} log output is not valid UTF-8: {source}")]
    InvalidUtf8 {
        /// Channel that failed to decode.
        channel: Channel,
        /// Decoder error.
        #[source]
        source: std::str::Utf8Error,
        /// All demultiplexed bytes.
        partial: RawLogs,
    },
}

impl ProtocolError {
    /// Output demultiplexed before the failure.
    #[must_use]
    pub const fn partial(&self) -> &RawLogs {
        match self {
            Self::Frame { partial, .. } | Self::InvalidUtf8 { partial, .. } => partial,
        }
    }

    /// Consumes the error, returning the partial output.
    #[must_use]
    pub fn into_partial(self) -> RawLogs {
        match self {
            Self::Frame { partial, .. } | Self::InvalidUtf8 { partial, .. } => partial,
        }
    }
}

/// Splits a buffered log stream into stdout and stderr bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::Frame`] on a truncated frame or an unknown
/// channel tag.
pub fn demux_raw(stream: &[u8]) -> Result<RawLogs, ProtocolError> {
    let mut logs = RawLogs::default();
    for frame in LogFrames::new(stream) {
        match frame {
            Ok(frame) => logs.push(frame),
            Err(source) => {
                tracing::debug!(
                    stdout_len = logs.stdout.len(),
                    stderr_len = logs.stderr.len(),
                    "log stream rejected: {}",
                    source
                );
                return Err(ProtocolError::Frame {
                    source,
                    partial: logs,
                });
            }
        }
    }
    Ok(logs)
}

/// Splits a buffered log stream into stdout and stderr text.
///
/// # Errors
///
/// Returns a [`ProtocolError`] on bad framing or non-UTF-8 output.
pub fn demux_logs(stream: &[u8]) -> Result<DemuxedLogs, ProtocolError> {
    demux_raw(stream)?.decode()
}

/// Encodes one frame.
///
/// Returns `None` if the payload does not fit a 32-bit length.
#[must_use]
pub fn encode_frame(channel: Channel, payload: &[u8]) -> Option<Vec<u8>> {
    let len = u32::try_from(payload.len()).ok()?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(channel as u8);
    frame.extend_from_slice(&[0, 0, 0]);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Some(frame)
}

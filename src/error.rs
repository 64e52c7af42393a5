//! Error types for the MPEG audio decoder
//!
//! Errors are split by how a caller is expected to react to them:
//! header and frame-level errors are recoverable (skip the frame and
//! resynchronize), end-of-stream means "no more frames", and internal
//! errors indicate a decoder defect that should abort the stream.

use thiserror::Error;

use crate::header::Layer;

/// Main error type for the decoder
#[derive(Debug, Error)]
pub enum DecoderError {
    /// Frame header could not be parsed, resynchronize on the next byte
    #[error("Invalid frame header: {0}")]
    Header(#[from] HeaderError),

    /// The protected part of a frame failed its CRC-16 check
    #[error("CRC mismatch: frame carries 0x{expected:04X}, computed 0x{computed:04X}")]
    CrcMismatch { expected: u16, computed: u16 },

    /// Side information or sample data ran past the declared frame length
    #[error("Frame data overruns the declared frame length")]
    FrameOverrun,

    /// A layer this decoder does not implement
    #[error("Unsupported layer: {0}")]
    UnsupportedLayer(Layer),

    /// A forbidden bit allocation code
    #[error("Invalid bit allocation {value} in subband {subband}")]
    InvalidAllocation { subband: usize, value: u32 },

    /// The byte source has no more data
    #[error("End of stream")]
    EndOfStream,

    /// Invariant violation inside the decoder
    #[error("Internal decoder error: {0}")]
    Internal(String),

    /// Rejected decoder configuration
    #[error("Invalid decoder configuration: {0}")]
    InvalidConfig(String),

    /// WAVE output errors
    #[error("WAVE output error: {0}")]
    Wave(#[from] WaveError),

    /// I/O failure of the byte source other than running out of data
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecoderError {
    /// Whether the caller can skip the current frame and keep decoding
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DecoderError::Header(_)
                | DecoderError::CrcMismatch { .. }
                | DecoderError::FrameOverrun
                | DecoderError::UnsupportedLayer(_)
                | DecoderError::InvalidAllocation { .. }
        )
    }

    /// Whether the byte source is exhausted
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DecoderError::EndOfStream)
    }
}

/// Frame header errors, all of them recoverable by resynchronizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The 11-bit sync pattern is missing
    #[error("Sync pattern not found in header word 0x{0:08X}")]
    BadSync(u32),

    /// MPEG version bits are set to the reserved value
    #[error("Reserved MPEG version")]
    ReservedVersion,

    /// Layer bits are set to the reserved value
    #[error("Reserved layer")]
    ReservedLayer,

    /// Free-format bitrate (index 0), frame length cannot be derived
    #[error("Free-format bitrate is not supported")]
    FreeFormat,

    /// Bitrate index 15, or a bitrate not allowed with this channel mode
    #[error("Invalid bitrate index {0}")]
    BadBitrate(u8),

    /// Sample-rate index 3
    #[error("Reserved sample-rate index")]
    ReservedSampleRate,
}

/// WAVE writer errors
#[derive(Debug, Error)]
pub enum WaveError {
    /// Only mono and stereo are supported
    #[error("Invalid channel count: {0} (expected 1 or 2)")]
    InvalidChannels(u16),

    /// Only 8 and 16 bits per sample are supported
    #[error("Invalid bits per sample: {0} (expected 8 or 16)")]
    InvalidBitsPerSample(u16),

    /// A sample rate of zero
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// The stream changed sample rate or channel count after the header was written
    #[error("Output format changed from {from_rate} Hz/{from_channels} ch to {to_rate} Hz/{to_channels} ch")]
    FormatChanged {
        from_rate: u32,
        from_channels: u16,
        to_rate: u32,
        to_channels: u16,
    },

    /// A chunk required to read the format back is missing
    #[error("Missing '{0}' chunk")]
    MissingChunk(&'static str),

    /// Error reported by the RIFF writer or reader
    #[error("RIFF error: {0}")]
    Riff(#[from] hound::Error),

    /// Underlying sink failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Specialized result types for different modules
pub type DecodeResult<T> = std::result::Result<T, DecoderError>;
pub type HeaderResult<T> = std::result::Result<T, HeaderError>;
pub type WaveResult<T> = std::result::Result<T, WaveError>;

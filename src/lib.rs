//! # Maponus
//!
//! A pure Rust decoder for MPEG-1 and MPEG-2 audio Layer I and Layer II.
//! Frames are read from any `std::io::Read` source, decoded subband by
//! subband and turned into 16-bit PCM by a polyphase synthesis filterbank.
//! The PCM goes to an in-memory interleaved buffer, a WAVE file or an
//! audio device through the `Player`.
//!
//! ```no_run
//! use std::fs::File;
//! use maponus_rs::{decode_to_wav, DecoderConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let input = File::open("input.mp2")?;
//! let output = File::create("output.wav")?;
//! let (summary, _) = decode_to_wav(input, output, DecoderConfig::default(), None)?;
//! println!("{} frames", summary.frames_decoded);
//! # Ok(())
//! # }
//! ```

pub mod bitstream;
pub mod buffer;
pub mod crc;
pub mod decoder;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod error;
pub mod header;
pub mod player;
pub mod subband;
pub mod synthesis;
pub mod tables;
pub mod wave;

pub use buffer::{Buffer16BitStereo, OutputBuffer};
pub use decoder::{DecodeSummary, Decoder, DecoderConfig, OutputChannels};
pub use error::{DecodeResult, DecoderError, HeaderError, WaveError};
pub use header::{ChannelMode, FrameHeader, Layer, MpegVersion};
pub use player::{AudioDevice, MemoryDevice, Player};
pub use synthesis::Equalizer;
pub use wave::{decode_to_wav, read_wave_spec, WaveFileBuffer, WaveSpec, WaveWriter};

//! Per-frame decode trace
//!
//! Collects one record per decoded frame and saves them as JSON, for
//! comparing decoder runs against each other or against a reference dump.
//!
//! This module is only available when the "diagnostics" feature is enabled.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::header::{ChannelMode, FrameHeader, Layer, MpegVersion};

/// What was decoded from one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Frame number (0-based, counting decoded frames only)
    pub frame_index: u64,
    /// Stream offset of the frame header in bytes
    pub byte_offset: u64,
    /// Layer number, 1 or 2
    pub layer: u8,
    /// MPEG version as text ("1", "2", "2.5")
    pub version: String,
    /// Bitrate in kbps
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    /// Channel mode as text
    pub mode: String,
    /// Bytes skipped while searching for this frame's sync word
    pub resync_bytes: usize,
    /// Largest absolute PCM value produced by the frame
    pub peak: f32,
}

impl FrameRecord {
    pub fn new(
        frame_index: u64,
        byte_offset: u64,
        header: &FrameHeader,
        resync_bytes: usize,
        peak: f32,
    ) -> Self {
        let layer = match header.layer {
            Layer::Layer1 => 1,
            Layer::Layer2 => 2,
            Layer::Layer3 => 3,
        };
        let version = match header.version {
            MpegVersion::Mpeg1 => "1",
            MpegVersion::Mpeg2 => "2",
            MpegVersion::Mpeg2p5 => "2.5",
        };
        let mode = match header.mode {
            ChannelMode::Stereo => "stereo",
            ChannelMode::JointStereo => "joint_stereo",
            ChannelMode::DualChannel => "dual_channel",
            ChannelMode::SingleChannel => "mono",
        };
        Self {
            frame_index,
            byte_offset,
            layer,
            version: version.to_string(),
            bitrate_kbps: header.bitrate_kbps(),
            sample_rate: header.sample_rate(),
            mode: mode.to_string(),
            resync_bytes,
            peak,
        }
    }
}

/// Frame records of one decode run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeTrace {
    /// When tracing started
    pub created_at: DateTime<Utc>,
    pub frames: Vec<FrameRecord>,
}

impl DecodeTrace {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            frames: Vec::new(),
        }
    }

    pub fn record(&mut self, record: FrameRecord) {
        self.frames.push(record);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total bytes skipped for resynchronization
    pub fn total_resync_bytes(&self) -> usize {
        self.frames.iter().map(|f| f.resync_bytes).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Save the trace as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = self.to_json()?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(json.as_bytes())?;
        log::info!("Decode trace saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Load a trace written by `save_to_file`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Default for DecodeTrace {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Device-wide constants

use crate::backends::camera::types::FrameGeometry;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raster encodings published into shared memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputEncoding {
    /// Planar YUV 4:2:0
    I420,
    /// Packed 32-bit ARGB
    Argb,
}

impl OutputEncoding {
    /// Publication order within one frame
    pub const ALL: [OutputEncoding; 2] = [OutputEncoding::I420, OutputEncoding::Argb];

    /// Get display name for the encoding
    pub fn display_name(&self) -> &'static str {
        match self {
            OutputEncoding::I420 => "I420",
            OutputEncoding::Argb => "ARGB",
        }
    }

    /// Default shared memory name when none is configured
    pub fn default_region_name(&self) -> &'static str {
        match self {
            OutputEncoding::I420 => DEFAULT_I420_REGION,
            OutputEncoding::Argb => DEFAULT_ARGB_REGION,
        }
    }

    /// Bytes needed for one frame of the given geometry
    ///
    /// - I420: `width * height * 3 / 2`
    /// - ARGB: `width * height * 4`
    pub fn frame_size(&self, geometry: FrameGeometry) -> usize {
        let pixels = geometry.pixel_count();
        match self {
            OutputEncoding::I420 => pixels * 3 / 2,
            OutputEncoding::Argb => pixels * 4,
        }
    }
}

/// Default shared memory name for I420 frames
pub const DEFAULT_I420_REGION: &str = "video0.i420";

/// Default shared memory name for ARGB frames
pub const DEFAULT_ARGB_REGION: &str = "video0.argb";

/// Capacity of the multipart header line buffer
pub const MAX_HEADER_LINE: usize = 1000;

/// Capacity of the compressed frame buffer (8 MiB)
pub const MAX_JPEG_FRAME: usize = 8 * 1024 * 1024;

/// Connection establishment timeout for the camera URL
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Minimum average throughput before the stream counts as stalled (bytes/s)
pub const LOW_SPEED_LIMIT: u64 = 60;

/// Window over which [`LOW_SPEED_LIMIT`] is evaluated
pub const LOW_SPEED_TIME: Duration = Duration::from_secs(30);

/// FourCC stored in recorded image readings
pub const FOURCC_JFIF: &str = "jfif";

/// Data type id of an image reading message
pub const IMAGE_READING_ID: i32 = 1055;

/// Data type id of a recorder command message
pub const RECORDER_COMMAND_ID: i32 = 11;

/// UDP port of the control session
pub const CONTROL_SESSION_PORT: u16 = 12175;

/// First three octets of the control session multicast group; the session id is the last
pub const CONTROL_SESSION_GROUP_PREFIX: [u8; 3] = [225, 0, 0];

/// Recording file extension
pub const RECORDING_EXTENSION: &str = "rec";

/// Extracted frames between two progress log lines
pub const STATS_LOG_INTERVAL: u64 = 100;

/// Bounded queue between the control listener and the recorder task
pub const CONTROL_QUEUE_DEPTH: usize = 16;

// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the camera backend

//! Shared types for the MJPEG camera backend

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Frame dimensions, fixed for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in one frame
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Wall-clock time with microsecond resolution
///
/// Matches the layout used by recorded envelopes and the shared memory
/// header: seconds and microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeStamp {
    pub seconds: i32,
    pub microseconds: i32,
}

impl TimeStamp {
    pub const fn new(seconds: i32, microseconds: i32) -> Self {
        Self {
            seconds,
            microseconds,
        }
    }

    /// Current system time
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            seconds: since_epoch.as_secs() as i32,
            microseconds: since_epoch.subsec_micros() as i32,
        }
    }

    /// Total microseconds since the epoch
    pub fn to_micros(&self) -> i64 {
        self.seconds as i64 * 1_000_000 + self.microseconds as i64
    }
}

/// A complete compressed frame cut out of the multipart stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFrame {
    /// Stored payload bytes, at most the extractor's frame capacity
    pub data: Bytes,
    /// Length announced by the part's content-length header
    pub declared_len: usize,
}

impl ExtractedFrame {
    /// True when the announced length exceeded the buffer capacity
    pub fn is_truncated(&self) -> bool {
        self.data.len() < self.declared_len
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for ExtractedFrame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Startup configuration
//!
//! Built once from the command line and fixed for the process lifetime.

use crate::backends::camera::multipart::ParserLimits;
use crate::backends::camera::types::FrameGeometry;
use crate::constants::{
    CONNECT_TIMEOUT, DEFAULT_ARGB_REGION, DEFAULT_I420_REGION, LOW_SPEED_LIMIT, LOW_SPEED_TIME,
    OutputEncoding,
};
use crate::errors::ConfigError;
use crate::media::decoders::OutputSelection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use crate::pipelines::recorder::RecordingMode;

/// Camera connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// MJPEG stream URL
    pub url: String,
    /// Maximum time to establish the connection
    pub connect_timeout: Duration,
    /// Minimum average bytes/s before the stream counts as stalled (0 disables)
    pub low_speed_limit: u64,
    /// Window over which `low_speed_limit` is evaluated
    pub low_speed_time: Duration,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: CONNECT_TIMEOUT,
            low_speed_limit: LOW_SPEED_LIMIT,
            low_speed_time: LOW_SPEED_TIME,
        }
    }
}

/// Recording file and session control settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfig {
    pub mode: RecordingMode,
    /// Explicit file name; a timestamped name is generated when absent
    pub rec: Option<String>,
    /// Appended to every generated or explicit file name
    pub suffix: String,
    /// Directory recordings are created in
    pub directory: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            mode: RecordingMode::Continuous,
            rec: None,
            suffix: String::new(),
            directory: PathBuf::from("."),
        }
    }
}

impl RecordingConfig {
    /// Interpret the `--remote`, `--cid`, `--rec` and `--recsuffix` flags
    pub fn from_flags(
        remote: bool,
        cid: Option<u8>,
        rec: Option<String>,
        suffix: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mode = if remote {
            let cid = cid.ok_or(ConfigError::MissingControlSession)?;
            RecordingMode::Remote { cid }
        } else {
            RecordingMode::Continuous
        };

        Ok(Self {
            mode,
            rec: rec.filter(|name| !name.is_empty()),
            suffix: suffix.unwrap_or_default(),
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub transport: TransportConfig,
    /// Expected geometry of every frame
    pub geometry: FrameGeometry,
    /// Sender identity stamped on recorded envelopes
    pub sender_stamp: u32,
    /// Shared memory name for I420 frames
    pub i420_name: String,
    /// Shared memory name for ARGB frames
    pub argb_name: String,
    /// Encodings written into shared memory
    pub outputs: OutputSelection,
    pub recording: RecordingConfig,
    /// Extractor buffer capacities
    pub limits: ParserLimits,
    /// Debug logging and per-frame messages
    pub verbose: bool,
}

impl Config {
    pub fn new(url: impl Into<String>, geometry: FrameGeometry) -> Self {
        Self {
            transport: TransportConfig::new(url),
            geometry,
            sender_stamp: 0,
            i420_name: DEFAULT_I420_REGION.to_string(),
            argb_name: DEFAULT_ARGB_REGION.to_string(),
            outputs: OutputSelection::default(),
            recording: RecordingConfig::default(),
            limits: ParserLimits::default(),
            verbose: false,
        }
    }

    pub fn region_name(&self, encoding: OutputEncoding) -> &str {
        match encoding {
            OutputEncoding::I420 => &self.i420_name,
            OutputEncoding::Argb => &self.argb_name,
        }
    }

    /// Data size of the shared region for `encoding`
    pub fn region_size(&self, encoding: OutputEncoding) -> usize {
        encoding.frame_size(self.geometry)
    }

    /// Reject configurations the device cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        if self.geometry.is_empty() {
            return Err(ConfigError::ZeroGeometry(self.geometry));
        }
        if self.geometry.width % 2 != 0 || self.geometry.height % 2 != 0 {
            return Err(ConfigError::OddGeometry(self.geometry));
        }

        for encoding in OutputEncoding::ALL {
            if self.region_name(encoding).trim_start_matches('/').is_empty() {
                return Err(ConfigError::EmptyRegionName(encoding.display_name()));
            }
        }
        let i420 = self.i420_name.trim_start_matches('/');
        if i420 == self.argb_name.trim_start_matches('/') {
            return Err(ConfigError::DuplicateRegionName(i420.to_string()));
        }

        Ok(())
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! MJPEG-over-HTTP camera backend
//!
//! - [`http`]: connection handling and stall detection
//! - [`multipart`]: frame extraction from the multipart body
//! - [`types`]: geometry, timestamps and extracted frames

pub mod http;
pub mod multipart;
pub mod types;

pub use http::MjpegHttpSource;
pub use multipart::{ParserLimits, StreamParser, StreamState};
pub use types::{ExtractedFrame, FrameGeometry, TimeStamp};

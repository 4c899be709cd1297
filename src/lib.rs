// SPDX-License-Identifier: MPL-2.0

//! MJPEG-over-HTTP camera device publishing frames into shared memory
//!
//! The device reads a camera's multipart MJPEG stream, cuts it into JPEG
//! frames, decodes and converts each frame to I420 and ARGB, and publishes
//! both into POSIX shared memory for other processes. Raw frames can be
//! recorded as envelopes, continuously or under remote control.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: HTTP camera transport, frame extraction, control channel
//! - [`media`]: JPEG decoding, color conversion and envelope formats
//! - [`pipelines`]: Frame pipeline, shared memory publisher and recorder
//! - [`config`]: Startup configuration
//! - [`storage`]: Recording file naming and scanning

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use backends::camera::{ExtractedFrame, FrameGeometry, StreamParser, StreamState, TimeStamp};
pub use config::Config;
pub use constants::OutputEncoding;
pub use errors::{AppError, AppResult};
pub use pipelines::{FramePipeline, Recorder, SharedFramePublisher};

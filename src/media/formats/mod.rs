// SPDX-License-Identifier: MPL-2.0

//! Format and wire utilities
//!
//! - [`conversions`]: RGB24 → I420 → ARGB colorspace conversion
//! - [`envelope`]: framed envelopes used for recordings and control messages
//! - [`proto`]: the protobuf subset those envelopes are encoded with

pub mod conversions;
pub mod envelope;
pub mod proto;

pub use envelope::{Envelope, ImageReading, RecorderCommand};

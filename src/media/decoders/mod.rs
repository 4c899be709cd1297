// SPDX-License-Identifier: GPL-3.0-only

//! Frame decoding
//!
//! Compressed camera frames are decoded by [`jpeg::FrameDecoder`], which
//! validates geometry and produces the I420 and ARGB rasters.

pub mod jpeg;

pub use jpeg::{DecodedFrame, FrameCodec, FrameDecoder, JpegCodec, OutputSelection, ProbeInfo};

// SPDX-License-Identifier: MPL-2.0

//! Media processing utilities for decoding, color conversion and envelopes
//!
//! # Decoding
//!
//! Camera frames arrive as JPEG. The [`decoders`] module probes and decodes
//! them, rejecting frames whose size differs from the configured geometry.
//!
//! # Color Space Conversion
//!
//! Decoded RGB is converted to I420 (planar YUV 4:2:0) and from there to
//! packed ARGB by [`formats::conversions`].
//!
//! # Envelopes
//!
//! Recordings and control messages share one framed, protobuf-encoded
//! envelope format, see [`formats::envelope`].

pub mod decoders;
pub mod formats;

pub use decoders::{FrameDecoder, JpegCodec, OutputSelection};
pub use formats::{Envelope, ImageReading, RecorderCommand};

// SPDX-License-Identifier: GPL-3.0-only

//! Publication of decoded frames into the shared regions
//!
//! Per frame, the I420 region is claimed, stamped, written, released and
//! notified before the ARGB region is touched. Disabled encodings still
//! claim and stamp their region so consumers always see consistent
//! timestamps; only the pixel copy is skipped.

use super::shared_memory::SharedFrameBuffer;
use crate::backends::camera::types::TimeStamp;
use crate::constants::OutputEncoding;
use crate::media::decoders::DecodedFrame;
use tracing::warn;

/// Owner of the I420 and ARGB regions
pub struct SharedFramePublisher<B> {
    i420: B,
    argb: B,
}

impl<B: SharedFrameBuffer> SharedFramePublisher<B> {
    pub fn new(i420: B, argb: B) -> Self {
        Self { i420, argb }
    }

    pub fn region(&self, encoding: OutputEncoding) -> &B {
        match encoding {
            OutputEncoding::I420 => &self.i420,
            OutputEncoding::Argb => &self.argb,
        }
    }

    /// Publish one frame, I420 first
    pub fn publish(&self, timestamp: TimeStamp, frame: &DecodedFrame<'_>) {
        for encoding in OutputEncoding::ALL {
            let region = self.region(encoding);
            let pixels = frame.encoding(encoding);

            region.write_locked(timestamp, &mut |data| {
                let Some(pixels) = pixels else {
                    return;
                };
                match data.get_mut(..pixels.len()) {
                    Some(target) => target.copy_from_slice(pixels),
                    None => warn!(
                        region = region.name(),
                        frame_bytes = pixels.len(),
                        region_bytes = data.len(),
                        "Frame larger than shared memory, skipped"
                    ),
                }
            });
            region.notify_all();
        }
    }
}

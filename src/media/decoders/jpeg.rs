// SPDX-License-Identifier: GPL-3.0-only

//! JPEG frame decoding with geometry validation
//!
//! [`FrameDecoder`] turns one compressed frame into the raster encodings
//! published into shared memory. The JPEG library itself sits behind
//! [`FrameCodec`]; [`JpegCodec`] is the implementation backed by `image`.
//!
//! Conversion order is fixed: JPEG → RGB24 → I420 → ARGB. ARGB is derived
//! from I420, so I420 is computed whenever either encoding is requested.

use crate::backends::camera::types::FrameGeometry;
use crate::constants::OutputEncoding;
use crate::errors::DecodeError;
use crate::media::formats::conversions::{i420_to_argb, rgb24_to_i420};
use image::codecs::jpeg::JpegDecoder;
use image::{DynamicImage, ImageDecoder};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Header information read without decoding the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeInfo {
    pub geometry: FrameGeometry,
}

/// JPEG library operations the decoder relies on
pub trait FrameCodec: Send {
    /// Read the embedded geometry without a full decode
    fn probe(&mut self, jpeg: &[u8]) -> Result<ProbeInfo, DecodeError>;

    /// Decode into packed RGB24, `rgb` holds exactly `width * height * 3` bytes
    fn decode_rgb(
        &mut self,
        jpeg: &[u8],
        geometry: FrameGeometry,
        rgb: &mut [u8],
    ) -> Result<(), DecodeError>;
}

/// [`FrameCodec`] backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegCodec;

impl FrameCodec for JpegCodec {
    fn probe(&mut self, jpeg: &[u8]) -> Result<ProbeInfo, DecodeError> {
        let decoder =
            JpegDecoder::new(Cursor::new(jpeg)).map_err(|e| DecodeError::Codec(e.to_string()))?;
        let (width, height) = decoder.dimensions();
        Ok(ProbeInfo {
            geometry: FrameGeometry::new(width, height),
        })
    }

    fn decode_rgb(
        &mut self,
        jpeg: &[u8],
        geometry: FrameGeometry,
        rgb: &mut [u8],
    ) -> Result<(), DecodeError> {
        let decoder =
            JpegDecoder::new(Cursor::new(jpeg)).map_err(|e| DecodeError::Codec(e.to_string()))?;
        let image = DynamicImage::from_decoder(decoder)
            .map_err(|e| DecodeError::Codec(e.to_string()))?
            .into_rgb8();

        let decoded = FrameGeometry::new(image.width(), image.height());
        if decoded != geometry {
            return Err(DecodeError::GeometryMismatch {
                expected: geometry,
                found: decoded,
            });
        }
        let raw = image.as_raw();
        if raw.len() != rgb.len() {
            return Err(DecodeError::Codec(format!(
                "decoded {} RGB bytes into a {} byte buffer",
                raw.len(),
                rgb.len()
            )));
        }
        rgb.copy_from_slice(raw);
        Ok(())
    }
}

/// Which encodings are produced and published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSelection {
    pub i420: bool,
    pub argb: bool,
}

impl Default for OutputSelection {
    fn default() -> Self {
        Self {
            i420: true,
            argb: true,
        }
    }
}

impl OutputSelection {
    pub fn is_enabled(&self, encoding: OutputEncoding) -> bool {
        match encoding {
            OutputEncoding::I420 => self.i420,
            OutputEncoding::Argb => self.argb,
        }
    }

    /// I420 is needed for its own output and as the source of ARGB
    pub fn needs_i420(&self) -> bool {
        self.i420 || self.argb
    }
}

/// Rasters of one decoded frame, borrowed from the decoder's scratch buffers
#[derive(Debug, Clone, Copy)]
pub struct DecodedFrame<'a> {
    pub geometry: FrameGeometry,
    /// `None` when I420 output is disabled
    pub i420: Option<&'a [u8]>,
    /// `None` when ARGB output is disabled
    pub argb: Option<&'a [u8]>,
}

impl DecodedFrame<'_> {
    pub fn encoding(&self, encoding: OutputEncoding) -> Option<&[u8]> {
        match encoding {
            OutputEncoding::I420 => self.i420,
            OutputEncoding::Argb => self.argb,
        }
    }
}

/// Geometry-checked JPEG decoder with reusable conversion buffers
pub struct FrameDecoder<C> {
    codec: C,
    geometry: FrameGeometry,
    outputs: OutputSelection,
    rgb: Vec<u8>,
    i420: Vec<u8>,
    argb: Vec<u8>,
}

impl<C: FrameCodec> FrameDecoder<C> {
    pub fn new(codec: C, geometry: FrameGeometry, outputs: OutputSelection) -> Self {
        let sized = |enabled: bool, encoding: OutputEncoding| {
            if enabled {
                vec![0u8; encoding.frame_size(geometry)]
            } else {
                Vec::new()
            }
        };
        Self {
            codec,
            geometry,
            outputs,
            rgb: vec![0u8; geometry.pixel_count() * 3],
            i420: sized(outputs.needs_i420(), OutputEncoding::I420),
            argb: sized(outputs.argb, OutputEncoding::Argb),
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn outputs(&self) -> OutputSelection {
        self.outputs
    }

    /// Decode one frame
    ///
    /// Empty buffers and frames whose probed size differs from the
    /// configured geometry are rejected before any decoding work.
    pub fn decode(&mut self, jpeg: &[u8]) -> Result<DecodedFrame<'_>, DecodeError> {
        if jpeg.is_empty() {
            return Err(DecodeError::EmptyFrame);
        }

        let probe = self.codec.probe(jpeg)?;
        if probe.geometry != self.geometry {
            return Err(DecodeError::GeometryMismatch {
                expected: self.geometry,
                found: probe.geometry,
            });
        }

        self.codec.decode_rgb(jpeg, self.geometry, &mut self.rgb)?;

        if self.outputs.needs_i420() {
            rgb24_to_i420(&self.rgb, self.geometry, &mut self.i420)?;
        }
        if self.outputs.argb {
            i420_to_argb(&self.i420, self.geometry, &mut self.argb)?;
        }

        Ok(DecodedFrame {
            geometry: self.geometry,
            i420: self.outputs.i420.then_some(self.i420.as_slice()),
            argb: self.outputs.argb.then_some(self.argb.as_slice()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    fn encode_jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let pixels: Vec<u8> = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 95)
            .write_image(&pixels, width, height, ExtendedColorType::Rgb8)
            .unwrap();
        jpeg
    }

    #[test]
    fn test_probe_reads_geometry() {
        let jpeg = encode_jpeg(32, 16, [10, 200, 30]);
        let info = JpegCodec.probe(&jpeg).unwrap();
        assert_eq!(info.geometry, FrameGeometry::new(32, 16));
    }

    #[test]
    fn test_probe_rejects_garbage() {
        assert!(matches!(
            JpegCodec.probe(&[0x00, 0x01, 0x02]),
            Err(DecodeError::Codec(_))
        ));
    }

    #[test]
    fn test_decode_produces_both_encodings() {
        let geometry = FrameGeometry::new(16, 16);
        let jpeg = encode_jpeg(16, 16, [128, 128, 128]);
        let mut decoder = FrameDecoder::new(JpegCodec, geometry, OutputSelection::default());

        let frame = decoder.decode(&jpeg).unwrap();
        let i420 = frame.i420.unwrap();
        let argb = frame.argb.unwrap();
        assert_eq!(i420.len(), 16 * 16 * 3 / 2);
        assert_eq!(argb.len(), 16 * 16 * 4);
        // Mid grey stays roughly mid grey through the lossy chain
        assert!((110..=146).contains(&argb[2]));
        assert_eq!(argb[3], 255);
    }

    #[test]
    fn test_geometry_mismatch_is_rejected() {
        let jpeg = encode_jpeg(16, 8, [0, 0, 0]);
        let mut decoder = FrameDecoder::new(
            JpegCodec,
            FrameGeometry::new(640, 480),
            OutputSelection::default(),
        );
        assert_eq!(
            decoder.decode(&jpeg).unwrap_err(),
            DecodeError::GeometryMismatch {
                expected: FrameGeometry::new(640, 480),
                found: FrameGeometry::new(16, 8),
            }
        );
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let mut decoder = FrameDecoder::new(
            JpegCodec,
            FrameGeometry::new(16, 16),
            OutputSelection::default(),
        );
        assert_eq!(decoder.decode(&[]).unwrap_err(), DecodeError::EmptyFrame);
    }

    #[test]
    fn test_argb_only_still_converts_through_i420() {
        let geometry = FrameGeometry::new(16, 16);
        let jpeg = encode_jpeg(16, 16, [255, 255, 255]);
        let outputs = OutputSelection {
            i420: false,
            argb: true,
        };
        let mut decoder = FrameDecoder::new(JpegCodec, geometry, outputs);

        let frame = decoder.decode(&jpeg).unwrap();
        assert!(frame.i420.is_none());
        assert!(frame.argb.unwrap()[..4].iter().take(3).all(|&c| c > 240));
    }
}

// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for recording files
//!
//! Recordings are append-only sequences of framed envelopes. A crash or a
//! full disk can leave a partial envelope behind, so readers resynchronise
//! on the next frame header instead of giving up.

use crate::backends::camera::types::TimeStamp;
use crate::constants::RECORDING_EXTENSION;
use crate::media::formats::envelope::{ENVELOPE_HEADER_LEN, ENVELOPE_MAGIC, decode_framed};
use crate::media::formats::{Envelope, ImageReading};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// File name for a new recording
///
/// An explicit `rec` name is used as is (plus `suffix`); otherwise the name
/// is the local time as `YYYY-MM-DD_HHMMSS`, then `suffix`, then `.rec`.
pub fn recording_file_name(rec: Option<&str>, suffix: &str, now: DateTime<Local>) -> String {
    match rec.filter(|name| !name.is_empty()) {
        Some(name) => format!("{name}{suffix}"),
        None => format!(
            "{}{suffix}.{RECORDING_EXTENSION}",
            now.format("%Y-%m-%d_%H%M%S")
        ),
    }
}

/// An envelope found in a recording, with its byte offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedEnvelope {
    pub offset: usize,
    pub envelope: Envelope,
}

/// Iterator over the envelopes of a recording buffer
///
/// Bytes that do not start a decodable envelope are skipped up to the next
/// frame header and counted in [`EnvelopeScanner::skipped`].
pub struct EnvelopeScanner<'a> {
    data: &'a [u8],
    offset: usize,
    skipped: usize,
}

impl<'a> EnvelopeScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            skipped: 0,
        }
    }

    /// Bytes discarded while resynchronising so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn next_header_after(&self, position: usize) -> Option<usize> {
        self.data
            .get(position + 1..)?
            .windows(ENVELOPE_MAGIC.len())
            .position(|window| window == ENVELOPE_MAGIC)
            .map(|found| position + 1 + found)
    }
}

impl Iterator for EnvelopeScanner<'_> {
    type Item = ScannedEnvelope;

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset < self.data.len() {
            let remaining = &self.data[self.offset..];
            if remaining.len() >= ENVELOPE_HEADER_LEN {
                match decode_framed(remaining) {
                    Ok((envelope, consumed)) => {
                        let offset = self.offset;
                        self.offset += consumed;
                        return Some(ScannedEnvelope { offset, envelope });
                    }
                    Err(e) => debug!(offset = self.offset, error = %e, "Resynchronising recording"),
                }
            }

            match self.next_header_after(self.offset) {
                Some(next) => {
                    self.skipped += next - self.offset;
                    self.offset = next;
                }
                None => {
                    self.skipped += self.data.len() - self.offset;
                    self.offset = self.data.len();
                }
            }
        }
        None
    }
}

/// Decoded contents of a recording file
#[derive(Debug, Clone, Default)]
pub struct RecordingContents {
    pub envelopes: Vec<ScannedEnvelope>,
    pub total_bytes: usize,
    pub skipped_bytes: usize,
}

/// Aggregate view of a recording, printed by `inspect`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordingSummary {
    pub envelopes: usize,
    pub image_readings: usize,
    pub image_bytes: usize,
    pub first_sample: Option<TimeStamp>,
    pub last_sample: Option<TimeStamp>,
    pub total_bytes: usize,
    pub skipped_bytes: usize,
}

impl RecordingContents {
    pub fn parse(data: &[u8]) -> Self {
        let mut scanner = EnvelopeScanner::new(data);
        let envelopes = scanner.by_ref().collect();
        Self {
            envelopes,
            total_bytes: data.len(),
            skipped_bytes: scanner.skipped(),
        }
    }

    pub fn summary(&self) -> RecordingSummary {
        let mut summary = RecordingSummary {
            envelopes: self.envelopes.len(),
            total_bytes: self.total_bytes,
            skipped_bytes: self.skipped_bytes,
            ..RecordingSummary::default()
        };

        for scanned in &self.envelopes {
            let envelope = &scanned.envelope;
            if envelope.data_type == ImageReading::DATA_TYPE {
                summary.image_readings += 1;
                if let Ok(reading) = ImageReading::decode(&envelope.serialized_data) {
                    summary.image_bytes += reading.data.len();
                }
            }
            let sample = envelope.sample_time_stamp;
            summary.first_sample = Some(summary.first_sample.map_or(sample, |t| t.min(sample)));
            summary.last_sample = Some(summary.last_sample.map_or(sample, |t| t.max(sample)));
        }

        summary
    }
}

/// Load and scan a recording file
pub fn read_recording(path: &Path) -> std::io::Result<RecordingContents> {
    let data = std::fs::read(path)?;
    let contents = RecordingContents::parse(&data);
    debug!(
        path = %path.display(),
        envelopes = contents.envelopes.len(),
        skipped = contents.skipped_bytes,
        "Read recording"
    );
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_timestamped_name() {
        let now = local(2024, 3, 5, 7, 8, 9);
        assert_eq!(recording_file_name(None, "", now), "2024-03-05_070809.rec");
        assert_eq!(
            recording_file_name(None, "-front", now),
            "2024-03-05_070809-front.rec"
        );
    }

    #[test]
    fn test_explicit_name_keeps_suffix_without_extension() {
        let now = local(2024, 3, 5, 7, 8, 9);
        assert_eq!(recording_file_name(Some("drive.rec"), "", now), "drive.rec");
        assert_eq!(recording_file_name(Some("drive"), ".part2", now), "drive.part2");
        // An empty name falls back to the timestamp
        assert_eq!(recording_file_name(Some(""), "", now), "2024-03-05_070809.rec");
    }

    #[test]
    fn test_scanner_empty_input() {
        let mut scanner = EnvelopeScanner::new(&[]);
        assert!(scanner.next().is_none());
        assert_eq!(scanner.skipped(), 0);
    }

    #[test]
    fn test_scanner_skips_leading_garbage() {
        let envelope = Envelope {
            data_type: 11,
            sender_stamp: 3,
            ..Envelope::default()
        };
        let mut data = vec![0x00, 0x0D, 0x42];
        let start = data.len();
        data.extend(envelope.to_framed().unwrap());

        let mut scanner = EnvelopeScanner::new(&data);
        let found = scanner.next().unwrap();
        assert_eq!(found.offset, start);
        assert_eq!(found.envelope, envelope);
        assert!(scanner.next().is_none());
        assert_eq!(scanner.skipped(), start);
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Frame pipeline: extractor → recorder → decoder → publisher
//!
//! [`FramePipeline::push`] is driven synchronously by the transport with
//! every received chunk. Each completed frame is timestamped, offered to the
//! recorder (raw bytes, independent of decode success), decoded against the
//! configured geometry and, if accepted, published. Per-frame failures are
//! logged and counted; they never stop the stream.

use super::publisher::SharedFramePublisher;
use super::recorder::Recorder;
use super::shared_memory::SharedFrameBuffer;
use crate::backends::camera::multipart::StreamParser;
use crate::backends::camera::types::{ExtractedFrame, TimeStamp};
use crate::constants::STATS_LOG_INTERVAL;
use crate::errors::{DecodeError, RecordingError};
use crate::media::decoders::{FrameCodec, FrameDecoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Counters shared between the pipeline and the run loop
#[derive(Debug, Default)]
pub struct PipelineStats {
    bytes_received: AtomicU64,
    frames_extracted: AtomicU64,
    frames_truncated: AtomicU64,
    frames_recorded: AtomicU64,
    frames_published: AtomicU64,
    geometry_mismatches: AtomicU64,
    decode_failures: AtomicU64,
    recording_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub bytes_received: u64,
    pub frames_extracted: u64,
    pub frames_truncated: u64,
    pub frames_recorded: u64,
    pub frames_published: u64,
    pub geometry_mismatches: u64,
    pub decode_failures: u64,
    pub recording_failures: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            bytes_received: load(&self.bytes_received),
            frames_extracted: load(&self.frames_extracted),
            frames_truncated: load(&self.frames_truncated),
            frames_recorded: load(&self.frames_recorded),
            frames_published: load(&self.frames_published),
            geometry_mismatches: load(&self.geometry_mismatches),
            decode_failures: load(&self.decode_failures),
            recording_failures: load(&self.recording_failures),
        }
    }

    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Owner of every per-frame stage, fed by the transport
pub struct FramePipeline<C, B> {
    parser: StreamParser,
    decoder: FrameDecoder<C>,
    publisher: SharedFramePublisher<B>,
    recorder: Arc<Recorder>,
    stats: Arc<PipelineStats>,
}

impl<C: FrameCodec, B: SharedFrameBuffer> FramePipeline<C, B> {
    pub fn new(
        parser: StreamParser,
        decoder: FrameDecoder<C>,
        publisher: SharedFramePublisher<B>,
        recorder: Arc<Recorder>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            parser,
            decoder,
            publisher,
            recorder,
            stats,
        }
    }

    pub fn parser(&self) -> &StreamParser {
        &self.parser
    }

    pub fn publisher(&self) -> &SharedFramePublisher<B> {
        &self.publisher
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Feed received bytes, processing every frame they complete
    ///
    /// Returns the number of frames completed by this chunk.
    pub fn push(&mut self, data: &[u8]) -> usize {
        self.stats
            .bytes_received
            .fetch_add(data.len() as u64, Ordering::Relaxed);

        let frames = self.parser.feed(data);
        let count = frames.len();
        for frame in frames {
            self.process(frame);
        }
        count
    }

    fn process(&mut self, frame: ExtractedFrame) {
        let timestamp = TimeStamp::now();
        let extracted = PipelineStats::bump(&self.stats.frames_extracted);
        debug!(
            micros = timestamp.to_micros(),
            bytes = frame.len(),
            "Acquired new frame"
        );

        if frame.is_truncated() {
            PipelineStats::bump(&self.stats.frames_truncated);
            warn!(
                declared = frame.declared_len,
                stored = frame.len(),
                "Frame exceeds buffer capacity, truncated"
            );
        }

        let geometry = self.decoder.geometry();
        match self.recorder.record(&frame.data, geometry, timestamp) {
            Ok(true) => {
                PipelineStats::bump(&self.stats.frames_recorded);
            }
            Ok(false) => {}
            Err(e @ RecordingError::Write { .. }) => {
                PipelineStats::bump(&self.stats.recording_failures);
                error!(error = %e, "Recording stopped after write failure");
            }
            Err(e) => {
                PipelineStats::bump(&self.stats.recording_failures);
                warn!(error = %e, "Frame left out of the recording");
            }
        }

        match self.decoder.decode(&frame.data) {
            Ok(decoded) => {
                self.publisher.publish(timestamp, &decoded);
                PipelineStats::bump(&self.stats.frames_published);
            }
            Err(DecodeError::GeometryMismatch { expected, found }) => {
                PipelineStats::bump(&self.stats.geometry_mismatches);
                warn!(%expected, %found, "Frame geometry mismatch, dropped");
            }
            Err(e) => {
                PipelineStats::bump(&self.stats.decode_failures);
                warn!(error = %e, "Failed to decode frame");
            }
        }

        if extracted % STATS_LOG_INTERVAL == 0 {
            let snapshot = self.stats.snapshot();
            info!(
                extracted = snapshot.frames_extracted,
                published = snapshot.frames_published,
                recorded = snapshot.frames_recorded,
                mismatches = snapshot.geometry_mismatches,
                bytes = snapshot.bytes_received,
                "Pipeline progress"
            );
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing pipelines
//!
//! ```text
//! network bytes ──► StreamParser ──► ExtractedFrame ─┬─► Recorder ──► .rec file
//!                                                    │
//!                                                    └─► FrameDecoder ──► SharedFramePublisher
//!                                                                           ├─► I420 region
//!                                                                           └─► ARGB region
//! ```
//!
//! [`frame_pipeline::FramePipeline`] runs all stages for every chunk on the
//! receive context. The [`recorder::Recorder`] is additionally driven by
//! the control task.

pub mod frame_pipeline;
pub mod publisher;
pub mod recorder;
pub mod shared_memory;

pub use frame_pipeline::{FramePipeline, PipelineStats, StatsSnapshot};
pub use publisher::SharedFramePublisher;
pub use recorder::{ControlCommand, Recorder, RecordingMode};
pub use shared_memory::{SharedFrameBuffer, SharedMemory};

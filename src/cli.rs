// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides the two things the binary can do:
//! - Run the device: stream the camera into shared memory and record
//! - Inspect a recording file

use mjpeg_shm_camera::backends::camera::http::MjpegHttpSource;
use mjpeg_shm_camera::backends::camera::multipart::StreamParser;
use mjpeg_shm_camera::backends::control::ControlChannel;
use mjpeg_shm_camera::config::{Config, RecordingMode};
use mjpeg_shm_camera::constants::OutputEncoding;
use mjpeg_shm_camera::errors::{AppError, AppResult, TransportError};
use mjpeg_shm_camera::media::decoders::{FrameDecoder, JpegCodec};
use mjpeg_shm_camera::media::formats::ImageReading;
use mjpeg_shm_camera::pipelines::{
    FramePipeline, PipelineStats, Recorder, SharedFramePublisher, SharedMemory,
};
use mjpeg_shm_camera::storage::read_recording;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Why the camera stream stopped
enum StopReason {
    Interrupted,
    StreamEnded(u64),
    Failed(TransportError),
}

impl StopReason {
    /// Log why streaming stopped; every stop after startup is a clean exit
    fn conclude(self) -> AppResult<()> {
        match self {
            StopReason::Interrupted => {}
            StopReason::StreamEnded(bytes) => info!(bytes, "Camera stream ended"),
            // A lost camera ends the pipeline like a closed stream does
            StopReason::Failed(e) => error!(error = %e, "Camera stream failed"),
        }
        Ok(())
    }
}

/// Run the device until Ctrl+C, end of stream or a transport failure
pub fn run_device(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    config.validate().map_err(AppError::from)?;
    debug!(
        config = %serde_json::to_string(&config).unwrap_or_default(),
        "Configuration"
    );

    // Both regions must exist before the camera is contacted
    let i420 = create_region(&config, OutputEncoding::I420)?;
    let argb = create_region(&config, OutputEncoding::Argb)?;
    info!(
        url = %config.transport.url,
        i420 = i420.name(),
        i420_size = i420.size(),
        argb = argb.name(),
        argb_size = argb.size(),
        "Camera frames available in shared memory"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("mjpeg-shm-camera")
        .build()?;
    runtime.block_on(stream_camera(config, SharedFramePublisher::new(i420, argb)))
}

fn create_region(config: &Config, encoding: OutputEncoding) -> AppResult<SharedMemory> {
    let region = SharedMemory::create(config.region_name(encoding), config.region_size(encoding))?;
    Ok(region)
}

async fn stream_camera(
    config: Config,
    publisher: SharedFramePublisher<SharedMemory>,
) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = Arc::new(Recorder::new(config.recording.clone(), config.sender_stamp));
    recorder.begin().map_err(AppError::from)?;

    let control = match config.recording.mode {
        RecordingMode::Remote { cid } => Some(ControlChannel::spawn(cid, Arc::clone(&recorder))?),
        RecordingMode::Continuous => None,
    };

    let stats = Arc::new(PipelineStats::new());
    let mut pipeline = FramePipeline::new(
        StreamParser::with_limits(config.limits),
        FrameDecoder::new(JpegCodec, config.geometry, config.outputs),
        publisher,
        Arc::clone(&recorder),
        Arc::clone(&stats),
    );
    let source = MjpegHttpSource::new(config.transport.clone()).map_err(AppError::from)?;

    // Set up Ctrl+C handler
    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_signal.notify_one();
    })?;

    // The pipeline, and with it the shared memory, lives inside the task
    let mut stream = tokio::spawn(async move {
        source
            .stream(|chunk| {
                tokio::task::block_in_place(|| {
                    pipeline.push(chunk);
                })
            })
            .await
    });

    let reason = tokio::select! {
        joined = &mut stream => match joined {
            Ok(Ok(bytes)) => StopReason::StreamEnded(bytes),
            Ok(Err(e)) => StopReason::Failed(e),
            Err(e) => return Err(e.into()),
        },
        _ = shutdown.notified() => {
            info!("Stopping on Ctrl+C");
            stream.abort();
            let _ = stream.await;
            StopReason::Interrupted
        }
    };

    if let Some(control) = control {
        control.shutdown().await;
    }
    recorder.shutdown();

    let snapshot = stats.snapshot();
    info!(
        stats = %serde_json::to_string(&snapshot).unwrap_or_default(),
        "Final statistics"
    );

    Ok(reason.conclude()?)
}

/// Print every envelope of a recording followed by a summary
pub fn inspect_recording(path: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let contents = read_recording(path).map_err(AppError::from)?;
    let summary = contents.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Recording: {}", path.display());
    println!();
    for (index, scanned) in contents.envelopes.iter().enumerate() {
        let envelope = &scanned.envelope;
        let sample = envelope.sample_time_stamp;
        let mut line = format!(
            "  [{index}] @{} type={} sample={}.{:06} sender={}",
            scanned.offset,
            envelope.data_type,
            sample.seconds,
            sample.microseconds,
            envelope.sender_stamp
        );
        if envelope.data_type == ImageReading::DATA_TYPE {
            match ImageReading::decode(&envelope.serialized_data) {
                Ok(reading) => line.push_str(&format!(
                    " {} {}x{} {} bytes",
                    reading.fourcc,
                    reading.width,
                    reading.height,
                    reading.data.len()
                )),
                Err(e) => line.push_str(&format!(" <invalid image reading: {e}>")),
            }
        }
        println!("{line}");
    }

    println!();
    println!("Envelopes:      {}", summary.envelopes);
    println!("Image readings: {}", summary.image_readings);
    println!("Image bytes:    {}", summary.image_bytes);
    if let (Some(first), Some(last)) = (summary.first_sample, summary.last_sample) {
        let span = (last.to_micros() - first.to_micros()) as f64 / 1_000_000.0;
        println!("Duration:       {span:.3}s");
    }
    println!(
        "File size:      {} bytes ({} skipped)",
        summary.total_bytes, summary.skipped_bytes
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failures_exit_cleanly() {
        let stalled = TransportError::Stalled {
            bytes: 5,
            seconds: 30,
            limit: 60,
        };
        assert!(StopReason::Failed(stalled).conclude().is_ok());
        assert!(StopReason::Failed(TransportError::Status(503)).conclude().is_ok());
        assert!(StopReason::StreamEnded(1024).conclude().is_ok());
        assert!(StopReason::Interrupted.conclude().is_ok());
    }
}

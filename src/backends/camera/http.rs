// SPDX-License-Identifier: GPL-3.0-only

//! HTTP transport for MJPEG cameras
//!
//! Opens the camera URL and hands every body chunk, as received, to a byte
//! sink. Chunks carry no alignment guarantee; reassembly is up to
//! [`super::multipart::StreamParser`].
//!
//! The transport enforces two limits:
//! - a connect timeout for establishing the connection
//! - a minimum average throughput over a sliding window (stall detection)
//!
//! Either one ends the stream with an error. Nothing is retried.

use crate::config::TransportConfig;
use crate::errors::TransportError;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Minimum-throughput watchdog over consecutive fixed windows
#[derive(Debug, Clone)]
pub struct ThroughputMonitor {
    limit: u64,
    window: Duration,
    window_start: Instant,
    window_bytes: u64,
}

impl ThroughputMonitor {
    /// Returns `None` when monitoring is disabled (zero limit or window)
    pub fn new(limit: u64, window: Duration, now: Instant) -> Option<Self> {
        if limit == 0 || window.is_zero() {
            return None;
        }
        Some(Self {
            limit,
            window,
            window_start: now,
            window_bytes: 0,
        })
    }

    /// End of the current window
    pub fn deadline(&self) -> Instant {
        self.window_start + self.window
    }

    pub fn record(&mut self, bytes: usize) {
        self.window_bytes += bytes as u64;
    }

    /// Close the window if it has elapsed, failing when its rate was too low
    pub fn check(&mut self, now: Instant) -> Result<(), TransportError> {
        if now < self.deadline() {
            return Ok(());
        }

        let elapsed = now.duration_since(self.window_start);
        let rate = self.window_bytes as f64 / elapsed.as_secs_f64();
        if rate < self.limit as f64 {
            return Err(TransportError::Stalled {
                bytes: self.window_bytes,
                seconds: elapsed.as_secs(),
                limit: self.limit,
            });
        }

        self.window_start = now;
        self.window_bytes = 0;
        Ok(())
    }
}

/// Streaming reader for a camera's multipart HTTP body
pub struct MjpegHttpSource {
    client: reqwest::Client,
    config: TransportConfig,
}

impl MjpegHttpSource {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Stream the body into `sink` until the server closes the connection
    ///
    /// Returns the number of body bytes received.
    pub async fn stream<F>(&self, mut sink: F) -> Result<u64, TransportError>
    where
        F: FnMut(&[u8]),
    {
        info!(url = %self.config.url, "Connecting to camera");

        let request = self.client.get(&self.config.url).send();
        let watched = self.config.low_speed_limit > 0 && !self.config.low_speed_time.is_zero();
        let mut response = if watched {
            tokio::time::timeout(self.config.low_speed_time, request)
                .await
                .map_err(|_| TransportError::Stalled {
                    bytes: 0,
                    seconds: self.config.low_speed_time.as_secs(),
                    limit: self.config.low_speed_limit,
                })??
        } else {
            request.await?
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Camera rejected request");
            return Err(TransportError::Status(status.as_u16()));
        }
        debug!(headers = ?response.headers(), "Camera response headers");

        let mut monitor = ThroughputMonitor::new(
            self.config.low_speed_limit,
            self.config.low_speed_time,
            Instant::now(),
        );
        let mut total = 0u64;

        loop {
            let next = match &monitor {
                Some(monitor) => {
                    let deadline = tokio::time::Instant::from_std(monitor.deadline());
                    tokio::time::timeout_at(deadline, response.chunk()).await.ok()
                }
                None => Some(response.chunk().await),
            };

            match next {
                Some(Ok(Some(chunk))) => {
                    total += chunk.len() as u64;
                    if let Some(monitor) = monitor.as_mut() {
                        monitor.record(chunk.len());
                    }
                    sink(&chunk);
                }
                Some(Ok(None)) => {
                    info!(bytes = total, "Camera closed the stream");
                    return Ok(total);
                }
                Some(Err(e)) => return Err(e.into()),
                // Window elapsed without data; evaluated below
                None => {}
            }

            if let Some(monitor) = monitor.as_mut() {
                monitor.check(Instant::now())?;
            }
        }
    }
}

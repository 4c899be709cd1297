// SPDX-License-Identifier: GPL-3.0-only

//! Append-only recording of raw camera frames
//!
//! Every extracted frame is wrapped into an [`ImageReading`] envelope and
//! appended to the active recording file, flushed after each write. The
//! session is either open from launch to exit ([`RecordingMode::Continuous`])
//! or opened, rotated and closed by control commands
//! ([`RecordingMode::Remote`]), never both.
//!
//! The session lives behind one mutex shared by the receive context
//! (appending frames) and the control task (swapping the file). The lock is
//! held only to check the session and write or swap it; envelopes are
//! serialized before taking it.

use crate::backends::camera::types::{FrameGeometry, TimeStamp};
use crate::config::RecordingConfig;
use crate::errors::RecordingError;
use crate::media::formats::{Envelope, ImageReading};
use crate::storage::recording_file_name;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// How the recording session is controlled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingMode {
    /// Record unconditionally from launch to exit
    Continuous,
    /// Record only between start and stop commands on control session `cid`
    Remote { cid: u8 },
}

impl RecordingMode {
    pub fn is_remote(&self) -> bool {
        matches!(self, RecordingMode::Remote { .. })
    }
}

/// Commands delivered by the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Open a new recording, closing the current one first
    Start,
    /// Close the current recording
    Stop,
}

impl ControlCommand {
    /// Map a wire command value; unknown values yield `None`
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(ControlCommand::Start),
            2 => Some(ControlCommand::Stop),
            _ => None,
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            ControlCommand::Start => 1,
            ControlCommand::Stop => 2,
        }
    }
}

#[derive(Default)]
struct RecordingSession {
    file: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl RecordingSession {
    /// Flush and close the open file, returning its path
    fn close(&mut self) -> Option<PathBuf> {
        let path = self.path.take();
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                warn!(error = %e, "Failed to flush recording before closing");
            }
            if let Some(path) = &path {
                info!(path = %path.display(), "Closed recording");
            }
        }
        path
    }
}

/// Runtime-toggleable writer of recorded frames
pub struct Recorder {
    config: RecordingConfig,
    sender_stamp: u32,
    session: Mutex<RecordingSession>,
    /// Mirrors `session.file.is_some()` for a lock-free idle check
    active: AtomicBool,
    recorded: AtomicU64,
}

impl Recorder {
    pub fn new(config: RecordingConfig, sender_stamp: u32) -> Self {
        Self {
            config,
            sender_stamp,
            session: Mutex::new(RecordingSession::default()),
            active: AtomicBool::new(false),
            recorded: AtomicU64::new(0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Frames appended across all sessions
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.lock_session().path.clone()
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, RecordingSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open the launch-time session in continuous mode
    ///
    /// Remote mode waits for a start command instead.
    pub fn begin(&self) -> Result<Option<PathBuf>, RecordingError> {
        match self.config.mode {
            RecordingMode::Continuous => self.start_session().map(Some),
            RecordingMode::Remote { cid } => {
                info!(cid, "Waiting for recorder commands");
                Ok(None)
            }
        }
    }

    /// Open a new recording file, closing the current one first
    pub fn start_session(&self) -> Result<PathBuf, RecordingError> {
        let name = recording_file_name(
            self.config.rec.as_deref(),
            &self.config.suffix,
            chrono::Local::now(),
        );
        let path = self.config.directory.join(name);

        let mut session = self.lock_session();
        session.close();
        self.active.store(false, Ordering::Release);

        let file = File::create(&path).map_err(|source| RecordingError::Create {
            path: path.display().to_string(),
            source,
        })?;
        session.file = Some(BufWriter::new(file));
        session.path = Some(path.clone());
        self.active.store(true, Ordering::Release);

        info!(path = %path.display(), "Created recording");
        Ok(path)
    }

    /// Close the current recording, if any
    pub fn stop_session(&self) -> Option<PathBuf> {
        let mut session = self.lock_session();
        self.active.store(false, Ordering::Release);
        session.close()
    }

    /// Apply a control command; continuous recordings ignore commands
    pub fn handle_command(&self, command: ControlCommand) {
        if !self.config.mode.is_remote() {
            debug!(?command, "Ignoring recorder command in continuous mode");
            return;
        }

        match command {
            ControlCommand::Start => {
                if let Err(e) = self.start_session() {
                    error!(error = %e, "Failed to start recording");
                }
            }
            ControlCommand::Stop => {
                if self.stop_session().is_none() {
                    debug!("Stop command without an open recording");
                }
            }
        }
    }

    /// Append one raw frame to the active recording
    ///
    /// Returns `Ok(false)` without touching the file system when no session
    /// is open or the frame is empty. A failed write closes the session.
    pub fn record(
        &self,
        frame: &Bytes,
        geometry: FrameGeometry,
        sample_time: TimeStamp,
    ) -> Result<bool, RecordingError> {
        if frame.is_empty() || !self.is_active() {
            return Ok(false);
        }

        let reading = ImageReading::jfif(geometry, frame.clone());
        let envelope = Envelope {
            data_type: ImageReading::DATA_TYPE,
            serialized_data: reading.encode(),
            sent: TimeStamp::now(),
            sample_time_stamp: sample_time,
            sender_stamp: self.sender_stamp,
            ..Envelope::default()
        };
        let framed = envelope.to_framed()?;

        let mut session = self.lock_session();
        let Some(file) = session.file.as_mut() else {
            return Ok(false);
        };

        if let Err(source) = file.write_all(&framed).and_then(|()| file.flush()) {
            let path = session
                .path
                .as_deref()
                .map(Path::display)
                .map(|p| p.to_string())
                .unwrap_or_default();
            session.file = None;
            session.path = None;
            self.active.store(false, Ordering::Release);
            return Err(RecordingError::Write { path, source });
        }

        self.recorded.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Flush and close any open recording
    pub fn shutdown(&self) {
        self.stop_session();
    }
}

// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use mjpeg_shm_camera::backends::camera::types::FrameGeometry;
use mjpeg_shm_camera::config::{Config, RecordingConfig};
use mjpeg_shm_camera::constants::{
    CONNECT_TIMEOUT, DEFAULT_ARGB_REGION, DEFAULT_I420_REGION, LOW_SPEED_LIMIT, LOW_SPEED_TIME,
};
use mjpeg_shm_camera::media::decoders::OutputSelection;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

mod cli;

#[derive(Parser)]
#[command(name = "mjpeg-shm-camera")]
#[command(about = "Publish frames from an MJPEG-over-HTTP camera into shared memory")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// URL of the MJPEG stream
    #[arg(long, required = true)]
    url: Option<String>,

    /// Width of the camera frames
    #[arg(long, required = true)]
    width: Option<u32>,

    /// Height of the camera frames
    #[arg(long, required = true)]
    height: Option<u32>,

    /// Shared memory name for I420 frames
    #[arg(long = "name.i420", default_value = DEFAULT_I420_REGION)]
    name_i420: String,

    /// Shared memory name for ARGB frames
    #[arg(long = "name.argb", default_value = DEFAULT_ARGB_REGION)]
    name_argb: String,

    /// Sender stamp written into recorded envelopes
    #[arg(long, default_value_t = 0)]
    id: u32,

    /// Control session id (multicast group 225.0.0.<cid>)
    #[arg(long)]
    cid: Option<u8>,

    /// Record only on start/stop commands from the control session
    #[arg(long, requires = "cid")]
    remote: bool,

    /// Recording file name (default: YYYY-MM-DD_HHMMSS.rec)
    #[arg(long)]
    rec: Option<String>,

    /// Suffix appended to the recording file name
    #[arg(long)]
    recsuffix: Option<String>,

    /// Do not write I420 frames into shared memory
    #[arg(long = "skip.i420")]
    skip_i420: bool,

    /// Do not write ARGB frames into shared memory
    #[arg(long = "skip.argb")]
    skip_argb: bool,

    /// Debug logging including every acquired frame
    #[arg(long)]
    verbose: bool,

    /// Connection timeout in milliseconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT.as_millis() as u64)]
    connect_timeout_ms: u64,

    /// Minimum average throughput in bytes/s (0 disables stall detection)
    #[arg(long, default_value_t = LOW_SPEED_LIMIT)]
    low_speed_limit: u64,

    /// Seconds over which the minimum throughput is measured
    #[arg(long, default_value_t = LOW_SPEED_TIME.as_secs())]
    low_speed_time: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the envelopes stored in a recording file
    Inspect {
        /// Recording file to read
        file: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn into_config(self) -> Result<Config, Box<dyn std::error::Error>> {
        let (Some(url), Some(width), Some(height)) = (self.url, self.width, self.height) else {
            return Err("--url, --width and --height are required".into());
        };

        let mut config = Config::new(url, FrameGeometry::new(width, height));
        config.sender_stamp = self.id;
        config.i420_name = self.name_i420;
        config.argb_name = self.name_argb;
        config.outputs = OutputSelection {
            i420: !self.skip_i420,
            argb: !self.skip_argb,
        };
        config.recording =
            RecordingConfig::from_flags(self.remote, self.cid, self.rec, self.recsuffix)?;
        config.transport.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        config.transport.low_speed_limit = self.low_speed_limit;
        config.transport.low_speed_time = Duration::from_secs(self.low_speed_time);
        config.verbose = self.verbose;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cli = Cli::parse();

    // Initialize logging
    // RUST_LOG overrides the default, e.g. RUST_LOG=mjpeg_shm_camera=trace
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    match cli.command.take() {
        Some(Commands::Inspect { file, json }) => cli::inspect_recording(&file, json),
        None => {
            info!(version = env!("GIT_VERSION"), "Starting mjpeg-shm-camera");
            cli::run_device(cli.into_config()?)
        }
    }
}

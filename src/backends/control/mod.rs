// SPDX-License-Identifier: GPL-3.0-only

//! Control channel for remote recording
//!
//! Listens on the UDP multicast group `225.0.0.<cid>:12175` for framed
//! envelopes. [`RecorderCommand`] envelopes are translated into
//! [`ControlCommand`]s and posted into a bounded queue; a dispatcher task
//! owns the receiving end and applies each command to the [`Recorder`].
//! The listener itself never touches recorder state.

use crate::constants::{CONTROL_QUEUE_DEPTH, CONTROL_SESSION_GROUP_PREFIX, CONTROL_SESSION_PORT};
use crate::media::formats::envelope::{ENVELOPE_HEADER_LEN, ENVELOPE_MAGIC, decode_framed};
use crate::media::formats::RecorderCommand;
use crate::pipelines::recorder::{ControlCommand, Recorder};
use std::io;
use std::mem::size_of;
use std::net::Ipv4Addr;
use std::os::fd::FromRawFd;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Largest datagram accepted on the control session
const MAX_DATAGRAM: usize = 65_535;

/// Consecutive receive failures after which the listener gives up
const MAX_RECEIVE_FAILURES: u32 = 8;

/// Delay before retrying a failed receive, doubled per consecutive failure
const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Retry pacing for a socket that keeps failing
#[derive(Debug, Default)]
struct ReceiveBackoff {
    failures: u32,
}

impl ReceiveBackoff {
    fn succeeded(&mut self) {
        self.failures = 0;
    }

    /// Delay before the next attempt, or `None` once the socket is given up
    fn failed(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= MAX_RECEIVE_FAILURES {
            return None;
        }
        Some(RECEIVE_RETRY_DELAY * 2u32.pow(self.failures - 1))
    }
}

/// Multicast group of control session `cid`
pub fn group_address(cid: u8) -> Ipv4Addr {
    let [a, b, c] = CONTROL_SESSION_GROUP_PREFIX;
    Ipv4Addr::new(a, b, c, cid)
}

/// Bind a reusable socket to the control port and join the session group
///
/// `SO_REUSEADDR` lets several processes on one host share the session.
pub fn bind_control_socket(cid: u8) -> io::Result<UdpSocket> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // Owns the descriptor from here on, closing it on every error path
    let socket = unsafe { std::net::UdpSocket::from_raw_fd(fd) };

    let enable: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&enable as *const libc::c_int).cast(),
            size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    let address = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: CONTROL_SESSION_PORT.to_be(),
        sin_addr: libc::in_addr {
            s_addr: u32::from(Ipv4Addr::UNSPECIFIED).to_be(),
        },
        sin_zero: [0; 8],
    };
    let rc = unsafe {
        libc::bind(
            fd,
            (&address as *const libc::sockaddr_in).cast(),
            size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    socket.join_multicast_v4(&group_address(cid), &Ipv4Addr::UNSPECIFIED)?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket)
}

/// Extract every recorder command carried by one datagram
///
/// A datagram may hold several framed envelopes back to back. Envelopes of
/// other data types and unknown command values are skipped; parsing stops
/// at the first malformed envelope.
pub fn commands_in_datagram(datagram: &[u8]) -> Vec<ControlCommand> {
    let mut commands = Vec::new();
    let mut offset = 0;

    while datagram.len() - offset >= ENVELOPE_HEADER_LEN {
        let (envelope, consumed) = match decode_framed(&datagram[offset..]) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(error = %e, offset, "Ignoring malformed control data");
                break;
            }
        };
        offset += consumed;

        if envelope.data_type != RecorderCommand::DATA_TYPE {
            continue;
        }
        match RecorderCommand::decode(&envelope.serialized_data) {
            Ok(message) => match ControlCommand::from_value(message.command) {
                Some(command) => commands.push(command),
                None => debug!(value = message.command, "Ignoring unknown recorder command"),
            },
            Err(e) => debug!(error = %e, "Ignoring malformed recorder command"),
        }
    }

    commands
}

/// Receive datagrams until the queue is closed
async fn listen(socket: UdpSocket, commands: mpsc::Sender<ControlCommand>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut backoff = ReceiveBackoff::default();
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => {
                backoff.succeeded();
                received
            }
            Err(e) => match backoff.failed() {
                Some(delay) => {
                    warn!(error = %e, ?delay, "Control session receive failed");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                None => {
                    error!(error = %e, "Control session keeps failing, no longer listening");
                    return;
                }
            },
        };
        if buf[..len].starts_with(&ENVELOPE_MAGIC) {
            for command in commands_in_datagram(&buf[..len]) {
                debug!(?command, %from, "Received recorder command");
                if commands.send(command).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Apply queued commands to the recorder until every sender is gone
pub async fn dispatch(mut commands: mpsc::Receiver<ControlCommand>, recorder: Arc<Recorder>) {
    while let Some(command) = commands.recv().await {
        let recorder = Arc::clone(&recorder);
        // File creation and flushing block; keep them off the runtime workers
        let applied = tokio::task::spawn_blocking(move || recorder.handle_command(command));
        if let Err(e) = applied.await {
            warn!(error = %e, "Recorder command task failed");
        }
    }
    debug!("Control dispatcher finished");
}

/// Running listener and dispatcher for one control session
pub struct ControlChannel {
    cid: u8,
    listener: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl ControlChannel {
    /// Join session `cid` and start forwarding commands to `recorder`
    pub fn spawn(cid: u8, recorder: Arc<Recorder>) -> io::Result<Self> {
        let socket = bind_control_socket(cid)?;
        let (tx, rx) = mpsc::channel(CONTROL_QUEUE_DEPTH);

        info!(
            cid,
            group = %group_address(cid),
            port = CONTROL_SESSION_PORT,
            "Joined control session"
        );

        Ok(Self {
            cid,
            listener: tokio::spawn(listen(socket, tx)),
            dispatcher: tokio::spawn(dispatch(rx, recorder)),
        })
    }

    /// Stop listening and wait for queued commands to be applied
    pub async fn shutdown(self) {
        self.listener.abort();
        let _ = self.listener.await;
        if let Err(e) = self.dispatcher.await {
            warn!(error = %e, "Control dispatcher ended abnormally");
        }
        info!(cid = self.cid, "Left control session");
    }
}

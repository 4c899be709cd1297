// SPDX-License-Identifier: GPL-3.0-only

//! Multipart MJPEG frame extraction
//!
//! The camera answers with a `multipart/x-mixed-replace` body where every
//! part carries one JPEG:
//!
//! ```text
//! --boundary\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: 4\r\n
//! \r\n
//! <4 payload bytes>\r\n
//! --boundary\r\n
//! ...
//! ```
//!
//! [`StreamParser`] tracks this grammar byte by byte, so header lines and
//! payloads may be split across any number of network reads. Only the
//! content-length header and blank-line boundaries are interpreted.
//!
//! Both buffers are bounded. Header bytes beyond [`ParserLimits::max_header_line`]
//! and payload bytes beyond [`ParserLimits::max_frame_size`] are counted but
//! not stored; see [`ExtractedFrame::is_truncated`].

use super::types::ExtractedFrame;
use crate::constants::{MAX_HEADER_LINE, MAX_JPEG_FRAME};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tracing::trace;

const CONTENT_LENGTH_PREFIX: &[u8] = b"content-length:";
const BOUNDARY_PREFIX: &[u8] = b"--";

/// Position of the parser within the multipart grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Before the first boundary line
    AwaitingMainHeader,
    /// Reading the header lines of a part
    AwaitingFrameHeader,
    /// Collecting payload bytes until the declared length is reached
    InFrame,
}

/// Buffer capacities of a [`StreamParser`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserLimits {
    /// Bytes kept per header line; the rest of a longer line is dropped
    pub max_header_line: usize,
    /// Bytes kept per frame; the rest of a larger frame is dropped
    pub max_frame_size: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_header_line: MAX_HEADER_LINE,
            max_frame_size: MAX_JPEG_FRAME,
        }
    }
}

/// Byte-stream state machine emitting complete JPEG payloads
#[derive(Debug)]
pub struct StreamParser {
    state: StreamState,
    limits: ParserLimits,
    /// Current header line, terminator included while accumulating
    line: Vec<u8>,
    /// Last byte seen in header mode, used for CRLF detection
    previous_byte: Option<u8>,
    /// Header lines seen since the last completed frame
    header_lines: u32,
    /// Stored prefix of the pending frame
    frame: BytesMut,
    /// Payload bytes seen for the pending frame, stored or not
    write_index: usize,
    /// Most recently parsed content-length
    expected_len: usize,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    /// Create a parser with the default 1000-byte line and 8 MiB frame capacity
    pub fn new() -> Self {
        Self::with_limits(ParserLimits::default())
    }

    /// Create a parser with explicit buffer capacities
    pub fn with_limits(limits: ParserLimits) -> Self {
        Self {
            state: StreamState::AwaitingMainHeader,
            limits,
            line: Vec::with_capacity(limits.max_header_line),
            previous_byte: None,
            header_lines: 0,
            frame: BytesMut::new(),
            write_index: 0,
            expected_len: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Content-length announced for the pending frame
    pub fn expected_len(&self) -> usize {
        self.expected_len
    }

    /// Feed received bytes and collect every frame they complete
    pub fn feed(&mut self, data: &[u8]) -> Vec<ExtractedFrame> {
        let mut frames = Vec::new();
        self.feed_with(data, |frame| frames.push(frame));
        frames
    }

    /// Feed received bytes, invoking `on_frame` synchronously per completed frame
    ///
    /// Frames are delivered in stream order, on the exact byte that reaches
    /// the declared content-length.
    pub fn feed_with<F>(&mut self, data: &[u8], mut on_frame: F)
    where
        F: FnMut(ExtractedFrame),
    {
        let mut pos = 0;
        while pos < data.len() {
            match self.state {
                StreamState::InFrame => {
                    pos += self.consume_payload(&data[pos..], &mut on_frame);
                }
                StreamState::AwaitingMainHeader | StreamState::AwaitingFrameHeader => {
                    self.consume_header_byte(data[pos], &mut on_frame);
                    pos += 1;
                }
            }
        }
    }

    fn consume_header_byte<F>(&mut self, byte: u8, on_frame: &mut F)
    where
        F: FnMut(ExtractedFrame),
    {
        if self.line.len() < self.limits.max_header_line {
            self.line.push(byte);
        }

        let terminated = byte == b'\n' && self.previous_byte == Some(b'\r');
        self.previous_byte = Some(byte);

        if terminated {
            self.finish_line(on_frame);
        }
    }

    fn finish_line<F>(&mut self, on_frame: &mut F)
    where
        F: FnMut(ExtractedFrame),
    {
        let line = strip_terminator(&self.line);
        let content_length = starts_with_ignore_case(line, CONTENT_LENGTH_PREFIX)
            .then(|| parse_content_length(&line[CONTENT_LENGTH_PREFIX.len()..]));
        let is_boundary = line.starts_with(BOUNDARY_PREFIX);
        let is_blank = line.is_empty();

        let seen_headers = self.header_lines;
        self.line.clear();
        self.header_lines += 1;

        // Checked in this order: content-length, boundary, blank line
        if let Some(len) = content_length {
            trace!(len, "Content-Length header");
            self.expected_len = len;
        }
        if is_boundary {
            trace!("Multipart boundary");
            self.state = StreamState::AwaitingFrameHeader;
        }
        if is_blank && seen_headers > 0 && self.state == StreamState::AwaitingFrameHeader {
            self.enter_frame(on_frame);
        }
    }

    fn enter_frame<F>(&mut self, on_frame: &mut F)
    where
        F: FnMut(ExtractedFrame),
    {
        self.state = StreamState::InFrame;
        self.write_index = 0;
        self.frame.clear();
        self.frame
            .reserve(self.expected_len.min(self.limits.max_frame_size));

        if self.expected_len == 0 {
            self.complete_frame(on_frame);
        }
    }

    /// Returns the number of bytes taken from `chunk`
    fn consume_payload<F>(&mut self, chunk: &[u8], on_frame: &mut F) -> usize
    where
        F: FnMut(ExtractedFrame),
    {
        let remaining = self.expected_len.saturating_sub(self.write_index);
        if remaining == 0 {
            self.complete_frame(on_frame);
            return 0;
        }

        let take = remaining.min(chunk.len());
        let room = self.limits.max_frame_size.saturating_sub(self.frame.len());
        let store = take.min(room);
        self.frame.extend_from_slice(&chunk[..store]);
        self.write_index += take;

        if self.write_index >= self.expected_len {
            self.complete_frame(on_frame);
        }
        take
    }

    fn complete_frame<F>(&mut self, on_frame: &mut F)
    where
        F: FnMut(ExtractedFrame),
    {
        let frame = ExtractedFrame {
            data: self.frame.split().freeze(),
            declared_len: self.expected_len,
        };
        trace!(len = frame.declared_len, "Frame complete");

        self.state = StreamState::AwaitingFrameHeader;
        self.header_lines = 0;
        self.write_index = 0;
        self.expected_len = 0;
        self.line.clear();
        self.previous_byte = None;

        on_frame(frame);
    }
}

/// Drop a trailing `\n` and `\r`, whichever of them were stored
fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn starts_with_ignore_case(line: &[u8], prefix: &[u8]) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Leading whitespace skipped, leading digits taken, no digits yields 0
fn parse_content_length(value: &[u8]) -> usize {
    value
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .fold(0usize, |acc, b| {
            acc.saturating_mul(10).saturating_add((b - b'0') as usize)
        })
}

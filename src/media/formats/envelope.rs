// SPDX-License-Identifier: GPL-3.0-only

//! Self-describing envelopes for recordings and control messages
//!
//! On disk and on the control session every envelope is framed as:
//!
//! ```text
//! 0x0D 0xA4 | payload length (3 bytes, little endian) | protobuf payload
//! ```
//!
//! The payload is an [`Envelope`] message whose `serialized_data` holds the
//! wrapped message, identified by `data_type`.

use super::proto::{ProtoReader, ProtoWriter};
use crate::backends::camera::types::{FrameGeometry, TimeStamp};
use crate::constants::{FOURCC_JFIF, IMAGE_READING_ID, RECORDER_COMMAND_ID};
use crate::errors::EnvelopeError;
use bytes::{BufMut, Bytes, BytesMut};

/// Frame header magic
pub const ENVELOPE_MAGIC: [u8; 2] = [0x0D, 0xA4];

/// Magic plus the 24-bit length
pub const ENVELOPE_HEADER_LEN: usize = 5;

/// Largest payload the 24-bit length can describe
pub const MAX_ENVELOPE_PAYLOAD: usize = 0x00FF_FFFF;

/// Timestamped wrapper around one serialized message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub data_type: i32,
    pub serialized_data: Bytes,
    pub sent: TimeStamp,
    pub received: TimeStamp,
    pub sample_time_stamp: TimeStamp,
    pub sender_stamp: u32,
}

impl Envelope {
    /// Protobuf payload without the frame header
    pub fn encode(&self) -> Bytes {
        let mut writer = ProtoWriter::new();
        writer
            .int32(1, self.data_type)
            .bytes(2, &self.serialized_data)
            .bytes(3, &encode_timestamp(self.sent))
            .bytes(4, &encode_timestamp(self.received))
            .bytes(5, &encode_timestamp(self.sample_time_stamp))
            .uint32(6, self.sender_stamp);
        writer.finish()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, EnvelopeError> {
        let mut envelope = Envelope::default();
        for field in ProtoReader::new(payload) {
            let (number, value) = field?;
            match number {
                1 => envelope.data_type = value.as_i32()?,
                2 => envelope.serialized_data = Bytes::copy_from_slice(value.as_bytes()?),
                3 => envelope.sent = decode_timestamp(value.as_bytes()?)?,
                4 => envelope.received = decode_timestamp(value.as_bytes()?)?,
                5 => envelope.sample_time_stamp = decode_timestamp(value.as_bytes()?)?,
                6 => envelope.sender_stamp = value.as_u32()?,
                _ => {}
            }
        }
        Ok(envelope)
    }

    /// Header plus payload, ready to append to a recording
    pub fn to_framed(&self) -> Result<Bytes, EnvelopeError> {
        frame_payload(&self.encode())
    }
}

/// Prefix an encoded payload with the envelope frame header
pub fn frame_payload(payload: &[u8]) -> Result<Bytes, EnvelopeError> {
    if payload.len() > MAX_ENVELOPE_PAYLOAD {
        return Err(EnvelopeError::PayloadTooLarge(payload.len()));
    }
    let mut buf = BytesMut::with_capacity(ENVELOPE_HEADER_LEN + payload.len());
    buf.put_slice(&ENVELOPE_MAGIC);
    let len = (payload.len() as u32).to_le_bytes();
    buf.put_slice(&len[..3]);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Decode one framed envelope at the start of `data`
///
/// Returns the envelope and the number of bytes it occupied.
pub fn decode_framed(data: &[u8]) -> Result<(Envelope, usize), EnvelopeError> {
    let payload_len = framed_payload_len(data)?;
    let end = ENVELOPE_HEADER_LEN + payload_len;
    let payload = data.get(ENVELOPE_HEADER_LEN..end).ok_or(EnvelopeError::Truncated)?;
    Ok((Envelope::decode(payload)?, end))
}

/// Payload length announced by the frame header at the start of `data`
pub fn framed_payload_len(data: &[u8]) -> Result<usize, EnvelopeError> {
    if data.len() < ENVELOPE_HEADER_LEN {
        return Err(EnvelopeError::Truncated);
    }
    if data[..2] != ENVELOPE_MAGIC {
        return Err(EnvelopeError::InvalidHeader);
    }
    Ok(u32::from_le_bytes([data[2], data[3], data[4], 0]) as usize)
}

fn encode_timestamp(ts: TimeStamp) -> Bytes {
    let mut writer = ProtoWriter::new();
    writer.int32(1, ts.seconds).int32(2, ts.microseconds);
    writer.finish()
}

fn decode_timestamp(data: &[u8]) -> Result<TimeStamp, EnvelopeError> {
    let mut ts = TimeStamp::default();
    for field in ProtoReader::new(data) {
        let (number, value) = field?;
        match number {
            1 => ts.seconds = value.as_i32()?,
            2 => ts.microseconds = value.as_i32()?,
            _ => {}
        }
    }
    Ok(ts)
}

/// Compressed camera image as stored in recordings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReading {
    pub fourcc: String,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl ImageReading {
    pub const DATA_TYPE: i32 = IMAGE_READING_ID;

    /// Wrap a raw JPEG frame
    pub fn jfif(geometry: FrameGeometry, data: Bytes) -> Self {
        Self {
            fourcc: FOURCC_JFIF.to_string(),
            width: geometry.width,
            height: geometry.height,
            data,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut writer = ProtoWriter::new();
        writer
            .string(1, &self.fourcc)
            .uint32(2, self.width)
            .uint32(3, self.height)
            .bytes(4, &self.data);
        writer.finish()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, EnvelopeError> {
        let mut reading = ImageReading::default();
        for field in ProtoReader::new(payload) {
            let (number, value) = field?;
            match number {
                1 => {
                    reading.fourcc = String::from_utf8(value.as_bytes()?.to_vec())
                        .map_err(|e| EnvelopeError::Malformed(e.to_string()))?
                }
                2 => reading.width = value.as_u32()?,
                3 => reading.height = value.as_u32()?,
                4 => reading.data = Bytes::copy_from_slice(value.as_bytes()?),
                _ => {}
            }
        }
        Ok(reading)
    }
}

/// Remote start/stop request for the recorder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderCommand {
    pub command: u8,
}

impl RecorderCommand {
    pub const DATA_TYPE: i32 = RECORDER_COMMAND_ID;

    pub fn encode(&self) -> Bytes {
        let mut writer = ProtoWriter::new();
        writer.uint32(1, self.command as u32);
        writer.finish()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, EnvelopeError> {
        let mut command = RecorderCommand::default();
        for field in ProtoReader::new(payload) {
            let (number, value) = field?;
            if number == 1 {
                command.command = value.as_u32()? as u8;
            }
        }
        Ok(command)
    }
}

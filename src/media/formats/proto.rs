// SPDX-License-Identifier: GPL-3.0-only

//! Minimal protobuf wire encoding
//!
//! Only what envelopes and their payload messages need: varints (with
//! zigzag for signed fields) and length-delimited fields. The reader also
//! understands fixed 32/64-bit fields so unknown ones can be skipped.

use crate::errors::EnvelopeError;
use bytes::{BufMut, Bytes, BytesMut};

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LENGTH_DELIMITED: u8 = 2;
const WIRE_FIXED32: u8 = 5;

pub fn zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

pub fn unzigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

pub fn put_varint(buf: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Decode a varint at the start of `data`, returning the value and its length
pub fn read_varint(data: &[u8]) -> Result<(u64, usize), EnvelopeError> {
    let mut value = 0u64;
    for (i, byte) in data.iter().enumerate().take(10) {
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if data.len() < 10 {
        Err(EnvelopeError::Truncated)
    } else {
        Err(EnvelopeError::Malformed("varint longer than 10 bytes".into()))
    }
}

/// Field-by-field message builder
#[derive(Debug, Default)]
pub struct ProtoWriter {
    buf: BytesMut,
}

impl ProtoWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn put_key(&mut self, field: u32, wire_type: u8) {
        put_varint(&mut self.buf, ((field as u64) << 3) | wire_type as u64);
    }

    pub fn uint32(&mut self, field: u32, value: u32) -> &mut Self {
        self.put_key(field, WIRE_VARINT);
        put_varint(&mut self.buf, value as u64);
        self
    }

    /// Signed field, zigzag encoded
    pub fn int32(&mut self, field: u32, value: i32) -> &mut Self {
        self.put_key(field, WIRE_VARINT);
        put_varint(&mut self.buf, zigzag32(value) as u64);
        self
    }

    pub fn bytes(&mut self, field: u32, value: &[u8]) -> &mut Self {
        self.put_key(field, WIRE_LENGTH_DELIMITED);
        put_varint(&mut self.buf, value.len() as u64);
        self.buf.put_slice(value);
        self
    }

    pub fn string(&mut self, field: u32, value: &str) -> &mut Self {
        self.bytes(field, value.as_bytes())
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Decoded field payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Fixed64(u64),
    LengthDelimited(&'a [u8]),
    Fixed32(u32),
}

impl<'a> FieldValue<'a> {
    pub fn as_u32(&self) -> Result<u32, EnvelopeError> {
        match self {
            FieldValue::Varint(v) => Ok(*v as u32),
            FieldValue::Fixed32(v) => Ok(*v),
            other => Err(EnvelopeError::Malformed(format!("expected integer, got {other:?}"))),
        }
    }

    pub fn as_i32(&self) -> Result<i32, EnvelopeError> {
        self.as_u32().map(unzigzag32)
    }

    pub fn as_bytes(&self) -> Result<&'a [u8], EnvelopeError> {
        match self {
            FieldValue::LengthDelimited(data) => Ok(data),
            other => Err(EnvelopeError::Malformed(format!("expected bytes, got {other:?}"))),
        }
    }
}

/// Iterator over the `(field number, value)` pairs of an encoded message
#[derive(Debug, Clone)]
pub struct ProtoReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ProtoReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], EnvelopeError> {
        let end = self.pos.checked_add(len).ok_or(EnvelopeError::Truncated)?;
        let slice = self.data.get(self.pos..end).ok_or(EnvelopeError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn varint(&mut self) -> Result<u64, EnvelopeError> {
        let (value, len) = read_varint(&self.data[self.pos..])?;
        self.pos += len;
        Ok(value)
    }

    fn next_field(&mut self) -> Result<(u32, FieldValue<'a>), EnvelopeError> {
        let key = self.varint()?;
        let field = (key >> 3) as u32;
        let value = match (key & 0x07) as u8 {
            WIRE_VARINT => FieldValue::Varint(self.varint()?),
            WIRE_FIXED64 => {
                let raw = self.take(8)?;
                let raw = raw.try_into().map_err(|_| EnvelopeError::Truncated)?;
                FieldValue::Fixed64(u64::from_le_bytes(raw))
            }
            WIRE_LENGTH_DELIMITED => {
                let len = self.varint()? as usize;
                FieldValue::LengthDelimited(self.take(len)?)
            }
            WIRE_FIXED32 => {
                let raw = self.take(4)?;
                let raw = raw.try_into().map_err(|_| EnvelopeError::Truncated)?;
                FieldValue::Fixed32(u32::from_le_bytes(raw))
            }
            other => {
                return Err(EnvelopeError::Malformed(format!(
                    "unsupported wire type {other}"
                )));
            }
        };
        if field == 0 {
            return Err(EnvelopeError::Malformed("field number 0".into()));
        }
        Ok((field, value))
    }
}

impl<'a> Iterator for ProtoReader<'a> {
    type Item = Result<(u32, FieldValue<'a>), EnvelopeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let item = self.next_field();
        if item.is_err() {
            // Stop after the first error
            self.pos = self.data.len();
        }
        Some(item)
    }
}

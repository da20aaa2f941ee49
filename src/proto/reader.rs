//! Top-level field reader.
//!
//! Walks the fields of a protobuf message without a schema. Used to verify
//! merge output and to inspect database files; the merge path itself never
//! reads existing bytes.

use super::format::{WireType, CATEGORY_CODE_FIELD, CATEGORY_RECORD_FIELD};
use super::varint::decode_varint;
use crate::{Error, Result};

/// Value of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

/// One field of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    /// Field number from the tag
    pub number: u32,
    /// Wire type from the tag
    pub wire_type: WireType,
    /// Offset of the tag within the message
    pub offset: usize,
    /// Raw bytes of the whole field, tag included
    pub raw: &'a [u8],
    /// Decoded value
    pub value: FieldValue<'a>,
}

impl<'a> Field<'a> {
    /// Payload of a length-delimited field.
    pub fn bytes(&self) -> Option<&'a [u8]> {
        match self.value {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Iterator over the fields of a message.
///
/// Yields `Err` once on malformed input and then stops.
pub struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Start reading at `offset`.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            pos: offset,
            failed: false,
        }
    }

    fn read_field(&mut self) -> Result<Field<'a>> {
        let start = self.pos;
        let (key, pos) = decode_varint(self.data, start)?;
        let wire = (key & 0x07) as u8;
        let number = (key >> 3) as u32;
        let wire_type = WireType::from_u8(wire).ok_or(Error::UnsupportedWireType {
            wire_type: wire,
            offset: start,
        })?;

        let (value, end) = match wire_type {
            WireType::Varint => {
                let (v, end) = decode_varint(self.data, pos)?;
                (FieldValue::Varint(v), end)
            }
            WireType::Fixed64 => {
                let bytes = self.take_bytes(start, pos, 8)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(bytes);
                (FieldValue::Fixed64(u64::from_le_bytes(arr)), pos + 8)
            }
            WireType::Fixed32 => {
                let bytes = self.take_bytes(start, pos, 4)?;
                let mut arr = [0u8; 4];
                arr.copy_from_slice(bytes);
                (FieldValue::Fixed32(u32::from_le_bytes(arr)), pos + 4)
            }
            WireType::LengthDelimited => {
                let (len, payload_start) = decode_varint(self.data, pos)?;
                let available = self.data.len() - payload_start;
                if len > available as u64 {
                    return Err(Error::FieldOverrun {
                        offset: start,
                        declared: len,
                        available,
                    });
                }
                let end = payload_start + len as usize;
                (FieldValue::Bytes(&self.data[payload_start..end]), end)
            }
            WireType::StartGroup | WireType::EndGroup => {
                return Err(Error::UnsupportedWireType {
                    wire_type: wire,
                    offset: start,
                });
            }
        };

        self.pos = end;
        Ok(Field {
            number,
            wire_type,
            offset: start,
            raw: &self.data[start..end],
            value,
        })
    }

    fn take_bytes(&self, start: usize, pos: usize, len: usize) -> Result<&'a [u8]> {
        self.data.get(pos..pos + len).ok_or(Error::FieldOverrun {
            offset: start,
            declared: len as u64,
            available: self.data.len().saturating_sub(pos),
        })
    }
}

impl<'a> Iterator for FieldReader<'a> {
    type Item = Result<Field<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let field = self.read_field();
        if field.is_err() {
            self.failed = true;
        }
        Some(field)
    }
}

/// Read every top-level field of `data`.
pub fn read_fields(data: &[u8]) -> Result<Vec<Field<'_>>> {
    FieldReader::new(data).collect()
}

/// Summary of one category message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInfo {
    /// Category code, if field 1 holds valid UTF-8
    pub code: Option<String>,
    /// Number of field-2 records
    pub records: usize,
}

/// Parse a category message far enough to report its code and size.
pub fn category_info(payload: &[u8]) -> Result<CategoryInfo> {
    let mut code = None;
    let mut records = 0;
    for field in FieldReader::new(payload) {
        let field = field?;
        match (field.number, field.value) {
            (CATEGORY_CODE_FIELD, FieldValue::Bytes(b)) => {
                code = std::str::from_utf8(b).ok().map(str::to_string);
            }
            (CATEGORY_RECORD_FIELD, FieldValue::Bytes(_)) => records += 1,
            _ => {}
        }
    }
    Ok(CategoryInfo { code, records })
}

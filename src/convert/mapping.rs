//! Column decoding policy: the generic kind-driven cell decode and the
//! name-keyed override tables that route designated columns through the
//! special-purpose decoders.

use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::core::decode::{
    decode_channel_hints, decode_ole_timestamp, decode_sid, decode_utf16le,
    decode_windows_timestamp, format_guid, DecodeError,
};
use crate::core::types::{ColumnKind, DecodedRow, ScalarValue};

/// Sibling column whose decoded integer selects the identifier-blob decoder.
pub const ID_TYPE_COLUMN: &str = "IdType";

/// The closed set of special-purpose column decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDecoder {
    /// UTF-16LE text stored in a binary column.
    Utf16Text,
    /// FILETIME-style tick count stored in a binary column.
    WindowsTimestamp,
    /// OLE day-count double stored in a binary column.
    OleTimestamp,
    /// Identifier blob whose interpretation depends on the record's
    /// already-decoded [`ID_TYPE_COLUMN`] value.
    IdentifierBlob,
    /// Composite channel-hints blob; expands into its three fields.
    ChannelHints,
}

/// Result of applying a [`FieldDecoder`]: most decode to one scalar, the
/// composite ones expand into several named fields.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedField {
    Value(ScalarValue),
    Expanded(Vec<(String, ScalarValue)>),
}

impl FieldDecoder {
    /// Apply this decoder to one cell payload. `context` is the portion of
    /// the record decoded so far, in declared ordinal order.
    pub fn apply(self, column: &str, data: &[u8], context: &DecodedRow) -> Result<DecodedField> {
        Ok(match self {
            FieldDecoder::Utf16Text => {
                DecodedField::Value(ScalarValue::Text(decode_utf16le(data)?))
            }
            FieldDecoder::WindowsTimestamp => {
                DecodedField::Value(match decode_windows_timestamp(data)? {
                    Some(ts) => ScalarValue::DateTime(ts),
                    None => ScalarValue::Null,
                })
            }
            FieldDecoder::OleTimestamp => {
                DecodedField::Value(ScalarValue::DateTime(decode_ole_timestamp(data)?))
            }
            FieldDecoder::IdentifierBlob => {
                let discriminant = match context.get(ID_TYPE_COLUMN) {
                    Some(ScalarValue::Integer(v)) => *v,
                    Some(other) => bail!(
                        "discriminant column {ID_TYPE_COLUMN:?} for {column:?} decoded as \
                         {other:?}, expected an integer"
                    ),
                    None => bail!(
                        "column {column:?} needs {ID_TYPE_COLUMN:?} decoded earlier in the record"
                    ),
                };
                DecodedField::Value(match discriminant {
                    0 | 1 | 2 => ScalarValue::Text(decode_utf16le(data)?),
                    3 => ScalarValue::Text(decode_sid(data)?),
                    _ => ScalarValue::Blob(data.to_vec()),
                })
            }
            FieldDecoder::ChannelHints => {
                let hints = decode_channel_hints(data)?;
                DecodedField::Expanded(vec![
                    (
                        "NameLength".to_string(),
                        ScalarValue::Integer(i64::from(hints.name_length)),
                    ),
                    ("Name".to_string(), ScalarValue::Blob(hints.name)),
                    ("SSID".to_string(), ScalarValue::Text(hints.ssid_hex)),
                ])
            }
        })
    }
}

/// Name-keyed decoder overrides, consulted before the generic classification:
/// a per-destination-table map first, then the global per-name map.
#[derive(Debug, Clone, Default)]
pub struct FieldOverrides {
    by_table: HashMap<String, HashMap<String, FieldDecoder>>,
    by_name: HashMap<String, FieldDecoder>,
}

impl FieldOverrides {
    /// The override set for artifact-store tables.
    pub fn srum_defaults() -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("EventTimestamp".to_string(), FieldDecoder::WindowsTimestamp);
        by_name.insert("ConnectStartTime".to_string(), FieldDecoder::WindowsTimestamp);
        by_name.insert("LocaleName".to_string(), FieldDecoder::Utf16Text);
        by_name.insert("Key".to_string(), FieldDecoder::Utf16Text);
        by_name.insert("IdBlob".to_string(), FieldDecoder::IdentifierBlob);
        Self {
            by_table: HashMap::new(),
            by_name,
        }
    }

    /// The override set for registry-derived values.
    pub fn registry_defaults() -> Self {
        let mut by_name = HashMap::new();
        by_name.insert(
            "All User Profile Security Descriptor".to_string(),
            FieldDecoder::Utf16Text,
        );
        by_name.insert("Channel Hints".to_string(), FieldDecoder::ChannelHints);
        Self {
            by_table: HashMap::new(),
            by_name,
        }
    }

    /// Pin a decoder for one column of one destination table; takes
    /// precedence over the global per-name overrides.
    pub fn with_table_override(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        decoder: FieldDecoder,
    ) -> Self {
        self.by_table
            .entry(table.into())
            .or_default()
            .insert(column.into(), decoder);
        self
    }

    pub fn lookup(&self, table: &str, column: &str) -> Option<FieldDecoder> {
        self.by_table
            .get(table)
            .and_then(|columns| columns.get(column))
            .or_else(|| self.by_name.get(column))
            .copied()
    }
}

/// Decode a cell by its declared kind alone. Numeric kinds are fixed-width
/// little-endian; text and binary kinds pass the payload through unchanged.
pub fn decode_cell(kind: ColumnKind, data: &[u8]) -> Result<ScalarValue, DecodeError> {
    fn fixed<const N: usize>(
        what: &'static str,
        data: &[u8],
    ) -> Result<[u8; N], DecodeError> {
        data.try_into().map_err(|_| DecodeError::BadWidth {
            what,
            expected: N,
            got: data.len(),
        })
    }

    Ok(match kind {
        ColumnKind::Bool => ScalarValue::Integer(i64::from(fixed::<1>("boolean", data)?[0] != 0)),
        ColumnKind::U8 => ScalarValue::Integer(i64::from(fixed::<1>("u8", data)?[0])),
        ColumnKind::I16 => {
            ScalarValue::Integer(i64::from(i16::from_le_bytes(fixed("i16", data)?)))
        }
        ColumnKind::U16 => {
            ScalarValue::Integer(i64::from(u16::from_le_bytes(fixed("u16", data)?)))
        }
        ColumnKind::I32 => {
            ScalarValue::Integer(i64::from(i32::from_le_bytes(fixed("i32", data)?)))
        }
        ColumnKind::U32 => {
            ScalarValue::Integer(i64::from(u32::from_le_bytes(fixed("u32", data)?)))
        }
        ColumnKind::I64 => ScalarValue::Integer(i64::from_le_bytes(fixed("i64", data)?)),
        ColumnKind::Currency => {
            ScalarValue::Integer(i64::from_le_bytes(fixed("currency", data)?))
        }
        ColumnKind::F32 => ScalarValue::Real(f64::from(f32::from_le_bytes(fixed("f32", data)?))),
        ColumnKind::F64 => ScalarValue::Real(f64::from_le_bytes(fixed("f64", data)?)),
        ColumnKind::DateTime => ScalarValue::DateTime(decode_ole_timestamp(data)?),
        ColumnKind::Guid => ScalarValue::Text(format_guid(data)?),
        ColumnKind::Text
        | ColumnKind::LargeText
        | ColumnKind::SuperLarge
        | ColumnKind::Binary
        | ColumnKind::LargeBinary => ScalarValue::Blob(data.to_vec()),
    })
}

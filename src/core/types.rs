use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use thiserror::Error;

/// Text form used for timestamp cells in the destination store.
pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Destination column type categories.
///
/// Every source column classifies into exactly one of these; the set is
/// closed and matches the declared-type affinities the sink emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Text,
    Blob,
    Integer,
    Real,
    DateTime,
}

impl StorageClass {
    /// The declared type emitted into `CREATE TABLE` DDL.
    pub fn as_sql(self) -> &'static str {
        match self {
            StorageClass::Text => "TEXT",
            StorageClass::Blob => "BLOB",
            StorageClass::Integer => "INTEGER",
            StorageClass::Real => "REAL",
            StorageClass::DateTime => "DATETIME",
        }
    }
}

/// Column type tags of the extensible-storage-engine catalog.
///
/// The enumeration is closed: a reader handing over any other tag is a
/// configuration problem, reported through [`SourceColumn::from_raw_tag`],
/// not a per-record condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Bool,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    Currency,
    F32,
    F64,
    DateTime,
    Guid,
    Text,
    LargeText,
    SuperLarge,
    Binary,
    LargeBinary,
}

impl ColumnKind {
    /// Map a raw JET column type tag to its kind, `None` for foreign tags.
    pub fn from_raw(tag: u32) -> Option<Self> {
        Some(match tag {
            1 => ColumnKind::Bool,
            2 => ColumnKind::U8,
            3 => ColumnKind::I16,
            4 => ColumnKind::I32,
            5 => ColumnKind::Currency,
            6 => ColumnKind::F32,
            7 => ColumnKind::F64,
            8 => ColumnKind::DateTime,
            9 => ColumnKind::Binary,
            10 => ColumnKind::Text,
            11 => ColumnKind::LargeBinary,
            12 => ColumnKind::LargeText,
            13 => ColumnKind::SuperLarge,
            14 => ColumnKind::U32,
            15 => ColumnKind::I64,
            16 => ColumnKind::Guid,
            17 => ColumnKind::U16,
            _ => return None,
        })
    }

    /// Destination storage class for cells of this kind.
    pub fn storage_class(self) -> StorageClass {
        match self {
            ColumnKind::Bool
            | ColumnKind::U8
            | ColumnKind::I16
            | ColumnKind::U16
            | ColumnKind::I32
            | ColumnKind::U32
            | ColumnKind::I64
            | ColumnKind::Currency => StorageClass::Integer,
            ColumnKind::F32 | ColumnKind::F64 => StorageClass::Real,
            ColumnKind::Guid
            | ColumnKind::Text
            | ColumnKind::LargeText
            | ColumnKind::SuperLarge => StorageClass::Text,
            ColumnKind::Binary | ColumnKind::LargeBinary => StorageClass::Blob,
            ColumnKind::DateTime => StorageClass::DateTime,
        }
    }
}

/// A column type tag the catalog mapping does not cover.
#[derive(Debug, Error)]
#[error("table {table:?} column {column:?} declares unmapped column type tag {tag}")]
pub struct UnknownColumnType {
    pub table: String,
    pub column: String,
    pub tag: u32,
}

/// One declared column of a source table; ordinal identity is the position
/// in the owning table's column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    pub name: String,
    pub kind: ColumnKind,
}

impl SourceColumn {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Adapter boundary: build a column from a raw catalog tag, rejecting
    /// tags outside the closed set with a diagnostic naming the location.
    pub fn from_raw_tag(
        table: &str,
        name: impl Into<String>,
        tag: u32,
    ) -> Result<Self, UnknownColumnType> {
        let name = name.into();
        match ColumnKind::from_raw(tag) {
            Some(kind) => Ok(Self { name, kind }),
            None => Err(UnknownColumnType {
                table: table.to_string(),
                column: name,
                tag,
            }),
        }
    }
}

/// A decoded scalar bound into the destination store.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    DateTime(NaiveDateTime),
}

impl ToSql for ScalarValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ScalarValue::Null => ToSqlOutput::Owned(Value::Null),
            ScalarValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            ScalarValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            ScalarValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            ScalarValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            ScalarValue::DateTime(ts) => {
                ToSqlOutput::Owned(Value::Text(ts.format(SQL_DATETIME_FORMAT).to_string()))
            }
        })
    }
}

/// One materialized record: destination column name to decoded value.
pub type DecodedRow = BTreeMap<String, ScalarValue>;

//! Data model: column types, tagged values, and the fixed-width record codec.
//!
//! A table's rows are name-keyed mappings of [`Value`]s. On disk each row is
//! a fixed-width byte block whose column offsets are determined by the
//! table's ordered column list; this module owns that mapping.
//!
//! # Disk formats
//!
//! | Type | Bytes | Layout |
//! |------|-------|--------|
//! | `INT` | 4 | signed little-endian |
//! | `FLOAT` | 4 | IEEE-754 single |
//! | `VARCHAR[N]` | N | UTF-8, truncated to N, right-padded with `0x00` |
//! | `DATE` | 8 | signed little-endian seconds since epoch |
//! | `ARRAY_FLOAT` | 8 | two FLOAT32 `(x, y)` |
//!
//! An absent value ([`Value::Null`]) encodes as zero bytes of the column's
//! width. On the way back only `DATE` distinguishes the zero cell: epoch 0
//! decodes to `Null`.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::encoding::{Decode, EncodingError, decode_padded, encode_padded};
use crate::sql::IndexKind;

/// Width of a VARCHAR cell when no size was declared (index keys only;
/// column definitions always carry an explicit size).
pub const DEFAULT_VARCHAR_SIZE: usize = 50;

// ------------------------------------------------------------------------------------------------
// Errors
// ------------------------------------------------------------------------------------------------

/// Errors raised by schema validation and value conversion.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A column definition violates a type invariant.
    #[error("invalid column '{column}': {reason}")]
    InvalidColumn {
        /// Offending column name.
        column: String,
        /// What was wrong.
        reason: String,
    },

    /// A value could not be converted to the column's type.
    #[error("cannot convert {got} to {expected}")]
    TypeMismatch {
        /// Target type name.
        expected: &'static str,
        /// Description of the offending value.
        got: String,
    },

    /// A date literal was not `YYYY-MM-DD` or an epoch integer.
    #[error("invalid date literal '{0}'")]
    InvalidDate(String),

    /// An `ARRAY_FLOAT` literal did not hold exactly two elements.
    #[error("ARRAY_FLOAT must have exactly 2 elements: {0}")]
    InvalidPoint(String),

    /// Low-level cell decoding failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

// ------------------------------------------------------------------------------------------------
// DataType
// ------------------------------------------------------------------------------------------------

/// The column types supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// 32-bit signed integer.
    Int,
    /// 32-bit IEEE-754 float.
    Float,
    /// Fixed-width UTF-8 text; requires a declared size.
    Varchar,
    /// Seconds since the UNIX epoch, 64-bit signed.
    Date,
    /// A 2-D point: two 32-bit floats `(x, y)`.
    ArrayFloat,
}

impl DataType {
    /// On-disk width of a cell of this type. `declared` is the VARCHAR
    /// size; other types ignore it.
    pub fn cell_size(self, declared: Option<usize>) -> usize {
        match self {
            DataType::Int | DataType::Float => 4,
            DataType::Varchar => declared.unwrap_or(DEFAULT_VARCHAR_SIZE),
            DataType::Date | DataType::ArrayFloat => 8,
        }
    }

    /// Lowercase name as it appears in catalog documents.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Varchar => "varchar",
            DataType::Date => "date",
            DataType::ArrayFloat => "array_float",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ------------------------------------------------------------------------------------------------
// Value
// ------------------------------------------------------------------------------------------------

/// A runtime-typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `INT`.
    Int(i32),
    /// `FLOAT`.
    Float(f32),
    /// `VARCHAR`.
    Str(String),
    /// `DATE`, seconds since epoch.
    Date(i64),
    /// `ARRAY_FLOAT`, a 2-D point.
    Point(f32, f32),
    /// Absent value; encodes as zero bytes.
    Null,
}

impl Value {
    /// Whether this is the absent value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The point payload, if this is a `Point`.
    pub fn as_point(&self) -> Option<(f32, f32)> {
        match self {
            Value::Point(x, y) => Some((*x, *y)),
            _ => None,
        }
    }

    /// Compare two values of the same kind. Returns `None` for `Null`
    /// operands or mismatched kinds; callers coerce to the column type
    /// before comparing.
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "varchar",
            Value::Date(_) => "date",
            Value::Point(_, _) => "array_float",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Date(v) => f.write_str(&format_date(*v)),
            Value::Point(x, y) => write!(f, "ARRAY[{x},{y}]"),
            Value::Null => f.write_str("NULL"),
        }
    }
}

/// JSON presentation: dates render as `YYYY-MM-DD` (the on-disk form stays
/// epoch seconds), points as `[x, y]`, `Null` as JSON null.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(v) => serializer.serialize_i32(*v),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::Date(v) => serializer.serialize_str(&format_date(*v)),
            Value::Point(x, y) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(x)?;
                seq.serialize_element(y)?;
                seq.end()
            }
            Value::Null => serializer.serialize_none(),
        }
    }
}

/// A row: column name → value, in column-name order.
pub type Record = BTreeMap<String, Value>;

// ------------------------------------------------------------------------------------------------
// Column
// ------------------------------------------------------------------------------------------------

/// A table column definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// VARCHAR width; `None` for other types.
    #[serde(default)]
    pub size: Option<usize>,
    /// Whether this is the table's primary key.
    #[serde(default)]
    pub is_primary_key: bool,
    /// Whether a secondary index is maintained for this column.
    #[serde(default)]
    pub has_index: bool,
    /// Which index backs the column, when `has_index` is set.
    #[serde(default)]
    pub index_type: Option<IndexKind>,
}

impl Column {
    /// Plain unindexed column.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            size: None,
            is_primary_key: false,
            has_index: false,
            index_type: None,
        }
    }

    /// On-disk width of this column's cell.
    pub fn cell_size(&self) -> usize {
        self.data_type.cell_size(self.size)
    }

    /// Check the type invariants: VARCHAR requires a size, and an indexed
    /// ARRAY_FLOAT column must use the R-tree.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.data_type == DataType::Varchar && self.size.is_none() {
            return Err(SchemaError::InvalidColumn {
                column: self.name.clone(),
                reason: "VARCHAR requires a declared size".into(),
            });
        }
        if self.data_type == DataType::ArrayFloat
            && self.has_index
            && !matches!(self.index_type, Some(IndexKind::RTree) | None)
        {
            return Err(SchemaError::InvalidColumn {
                column: self.name.clone(),
                reason: "ARRAY_FLOAT columns can only be indexed by an R-tree".into(),
            });
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Value codec — fixed-width cells
// ------------------------------------------------------------------------------------------------

/// Encode a value into the fixed-width cell of `data_type`, appending to
/// `buf`. `Null` encodes as zero bytes of the cell width.
pub fn encode_value(
    value: &Value,
    data_type: DataType,
    size: Option<usize>,
    buf: &mut Vec<u8>,
) -> Result<(), SchemaError> {
    let width = data_type.cell_size(size);
    if value.is_null() {
        buf.resize(buf.len() + width, 0);
        return Ok(());
    }

    match (data_type, value) {
        (DataType::Int, Value::Int(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (DataType::Float, Value::Float(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (DataType::Varchar, Value::Str(v)) => encode_padded(v, width, buf),
        (DataType::Date, Value::Date(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (DataType::ArrayFloat, Value::Point(x, y)) => {
            buf.extend_from_slice(&x.to_le_bytes());
            buf.extend_from_slice(&y.to_le_bytes());
        }
        (dt, v) => {
            return Err(SchemaError::TypeMismatch {
                expected: dt.name(),
                got: format!("{} value '{v}'", v.kind()),
            });
        }
    }
    Ok(())
}

/// Decode the fixed-width cell at the start of `bytes`.
pub fn decode_value(
    bytes: &[u8],
    data_type: DataType,
    size: Option<usize>,
) -> Result<Value, SchemaError> {
    Ok(match data_type {
        DataType::Int => Value::Int(i32::decode_from(bytes)?.0),
        DataType::Float => Value::Float(f32::decode_from(bytes)?.0),
        DataType::Varchar => {
            let width = data_type.cell_size(size);
            Value::Str(decode_padded(bytes, width)?.0)
        }
        DataType::Date => {
            let epoch = i64::decode_from(bytes)?.0;
            if epoch == 0 {
                Value::Null
            } else {
                Value::Date(epoch)
            }
        }
        DataType::ArrayFloat => {
            let (x, n) = f32::decode_from(bytes)?;
            let (y, _) = f32::decode_from(&bytes[n..])?;
            Value::Point(x, y)
        }
    })
}

// ------------------------------------------------------------------------------------------------
// Record codec
// ------------------------------------------------------------------------------------------------

/// Serialize a record into its fixed-width block, columns in declaration
/// order. Every column must be present in the mapping (use `Null` for
/// absent values).
pub fn encode_record(columns: &[Column], record: &Record) -> Result<Vec<u8>, SchemaError> {
    let mut buf = Vec::with_capacity(record_size(columns));
    for col in columns {
        let value = record.get(&col.name).ok_or_else(|| SchemaError::InvalidColumn {
            column: col.name.clone(),
            reason: "missing from record".into(),
        })?;
        encode_value(value, col.data_type, col.size, &mut buf)?;
    }
    Ok(buf)
}

/// Deserialize a fixed-width block back into a record.
pub fn decode_record(columns: &[Column], bytes: &[u8]) -> Result<Record, SchemaError> {
    let mut record = Record::new();
    let mut offset = 0;
    for col in columns {
        let width = col.cell_size();
        let value = decode_value(&bytes[offset..], col.data_type, col.size)?;
        record.insert(col.name.clone(), value);
        offset += width;
    }
    Ok(record)
}

/// Total fixed width of a row with these columns.
pub fn record_size(columns: &[Column]) -> usize {
    columns.iter().map(Column::cell_size).sum()
}

// ------------------------------------------------------------------------------------------------
// Conversion — literals and coercion
// ------------------------------------------------------------------------------------------------

/// Coerce a parsed literal into the column's type.
///
/// Accepted widenings: integer → FLOAT / DATE, `YYYY-MM-DD` string → DATE,
/// numeric string → INT / FLOAT. Everything else is a conversion error.
/// `Null` passes through for every type.
pub fn coerce(value: Value, data_type: DataType) -> Result<Value, SchemaError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match (data_type, value) {
        (DataType::Int, v @ Value::Int(_)) => Ok(v),
        (DataType::Int, Value::Str(s)) => s
            .trim()
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| SchemaError::TypeMismatch {
                expected: "int",
                got: format!("'{s}'"),
            }),

        (DataType::Float, v @ Value::Float(_)) => Ok(v),
        (DataType::Float, Value::Int(i)) => Ok(Value::Float(i as f32)),
        (DataType::Float, Value::Str(s)) => s
            .trim()
            .parse::<f32>()
            .map(Value::Float)
            .map_err(|_| SchemaError::TypeMismatch {
                expected: "float",
                got: format!("'{s}'"),
            }),

        (DataType::Varchar, v @ Value::Str(_)) => Ok(v),
        (DataType::Varchar, Value::Int(i)) => Ok(Value::Str(i.to_string())),
        (DataType::Varchar, Value::Float(f)) => Ok(Value::Str(f.to_string())),

        (DataType::Date, v @ Value::Date(_)) => Ok(v),
        (DataType::Date, Value::Int(i)) => Ok(Value::Date(i64::from(i))),
        (DataType::Date, Value::Str(s)) => parse_date(&s).map(Value::Date),

        (DataType::ArrayFloat, v @ Value::Point(_, _)) => Ok(v),
        (DataType::ArrayFloat, Value::Str(s)) => parse_point(&s),

        (dt, v) => Err(SchemaError::TypeMismatch {
            expected: dt.name(),
            got: format!("{} value '{v}'", v.kind()),
        }),
    }
}

/// Convert raw text (a CSV field) into a value of the given type. Empty
/// text becomes `Null`.
pub fn value_from_text(
    text: &str,
    data_type: DataType,
    size: Option<usize>,
) -> Result<Value, SchemaError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Null);
    }
    match data_type {
        DataType::Int => text
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| SchemaError::TypeMismatch {
                expected: "int",
                got: format!("'{text}'"),
            }),
        DataType::Float => text
            .parse::<f32>()
            .map(Value::Float)
            .map_err(|_| SchemaError::TypeMismatch {
                expected: "float",
                got: format!("'{text}'"),
            }),
        DataType::Varchar => {
            let width = data_type.cell_size(size);
            let mut cut = text.len().min(width);
            while cut > 0 && !text.is_char_boundary(cut) {
                cut -= 1;
            }
            Ok(Value::Str(text[..cut].to_string()))
        }
        DataType::Date => {
            if let Ok(epoch) = text.parse::<i64>() {
                Ok(Value::Date(epoch))
            } else {
                parse_date(text).map(Value::Date)
            }
        }
        DataType::ArrayFloat => parse_point(text),
    }
}

/// Parse `YYYY-MM-DD` into epoch seconds (midnight UTC).
pub fn parse_date(text: &str) -> Result<i64, SchemaError> {
    let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| SchemaError::InvalidDate(text.to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| SchemaError::InvalidDate(text.to_string()))?;
    Ok(midnight.and_utc().timestamp())
}

/// Render epoch seconds as `YYYY-MM-DD` (UTC).
pub fn format_date(epoch: i64) -> String {
    match DateTime::from_timestamp(epoch, 0) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => epoch.to_string(),
    }
}

/// Parse `ARRAY[x, y]` or `[x, y]` or `x, y` into a point.
fn parse_point(text: &str) -> Result<Value, SchemaError> {
    let mut inner = text.trim();
    if let Some(rest) = inner
        .strip_prefix("ARRAY[")
        .or_else(|| inner.strip_prefix("array["))
    {
        inner = rest.strip_suffix(']').unwrap_or(rest);
    } else if let Some(rest) = inner.strip_prefix('[') {
        inner = rest.strip_suffix(']').unwrap_or(rest);
    }

    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(SchemaError::InvalidPoint(text.to_string()));
    }
    let x = parts[0]
        .parse::<f32>()
        .map_err(|_| SchemaError::InvalidPoint(text.to_string()))?;
    let y = parts[1]
        .parse::<f32>()
        .map_err(|_| SchemaError::InvalidPoint(text.to_string()))?;
    Ok(Value::Point(x, y))
}

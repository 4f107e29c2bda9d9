//! Secondary indices and their per-table manager.
//!
//! Every index maps a typed key to a **slot** — the record's position in
//! the table's heap file. Five access paths are provided, each with its own
//! on-disk representation:
//!
//! | Module | Structure | Point | Range | Delete |
//! |--------|-----------|-------|-------|--------|
//! | [`avl`] | Disk-resident AVL file | yes | yes | yes |
//! | [`btree`] | In-memory B+ tree + persisted row sidecar | yes | yes | no |
//! | [`hash`] | Extendible hashing (directory + buckets) | yes | — | yes |
//! | [`isam`] | Static two-level ISAM with overflow chains | yes | yes | yes |
//! | [`rtree`] | 2-D point R-tree | — | spatial | no |
//!
//! Keys are fixed-width cells ([`KeyCodec`]): `i32`, `f32`, or `N` bytes of
//! NUL-padded UTF-8. `DATE` columns index through the integer key type.
//!
//! The [`Index`] trait is the deletion-capable point/range surface shared
//! by the AVL, hash, and ISAM files; [`manager::IndexManager`] multiplexes
//! all five structures per table.

pub mod avl;
pub mod btree;
pub mod hash;
pub mod isam;
pub mod manager;
pub mod rtree;

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::io;

use thiserror::Error;

use crate::encoding::{Decode, EncodingError, decode_padded, encode_padded};
use crate::schema::{Column, DEFAULT_VARCHAR_SIZE, DataType, SchemaError, Value};

// ------------------------------------------------------------------------------------------------
// Errors
// ------------------------------------------------------------------------------------------------

/// Errors returned by index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Underlying I/O error — fatal to the call.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Cell encoding or decoding failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Value conversion failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A key of the wrong kind reached a typed index.
    #[error("key mismatch: expected {expected} key, got {got}")]
    KeyMismatch {
        /// The index's key type.
        expected: &'static str,
        /// Kind of the offending value.
        got: String,
    },

    /// The index rejects duplicate keys (ISAM).
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The structure ran out of room (hash: overflow chain and directory
    /// growth both exhausted).
    #[error("index capacity exhausted: {0}")]
    CapacityExhausted(String),

    /// On-disk state violates a structural invariant.
    #[error("corrupt index: {0}")]
    Corrupt(String),
}

// ------------------------------------------------------------------------------------------------
// Keys
// ------------------------------------------------------------------------------------------------

/// A typed index key. An index holds keys of exactly one kind, fixed at
/// creation by its [`KeyCodec`].
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Integer key (INT and DATE columns).
    Int(i32),
    /// Float key.
    Float(f32),
    /// Fixed-width string key.
    Str(String),
}

impl Key {
    /// Total order among keys of the same kind. Mixed kinds cannot occur
    /// within one index; they compare by construction order as a fallback.
    pub fn cmp_keys(&self, other: &Key) -> Ordering {
        match (self, other) {
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Float(a), Key::Float(b)) => a.total_cmp(b),
            (Key::Str(a), Key::Str(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Float(v) => write!(f, "{v}"),
            Key::Str(v) => write!(f, "{v}"),
        }
    }
}

/// The kind (and width) of keys an index stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// 4-byte signed integer cell.
    Int,
    /// 4-byte IEEE-754 cell.
    Float,
    /// `N`-byte NUL-padded UTF-8 cell.
    Str(usize),
}

impl KeyType {
    /// Key type used to index a column: INT and DATE map to integer keys,
    /// FLOAT to float keys, VARCHAR to fixed-width string keys.
    pub fn for_column(column: &Column) -> Result<KeyType, IndexError> {
        match column.data_type {
            DataType::Int | DataType::Date => Ok(KeyType::Int),
            DataType::Float => Ok(KeyType::Float),
            DataType::Varchar => Ok(KeyType::Str(column.size.unwrap_or(DEFAULT_VARCHAR_SIZE))),
            DataType::ArrayFloat => Err(IndexError::KeyMismatch {
                expected: "scalar",
                got: "array_float (only the R-tree indexes points)".into(),
            }),
        }
    }
}

/// Fixed-width key cell codec for one index file.
#[derive(Debug, Clone, Copy)]
pub struct KeyCodec {
    key_type: KeyType,
}

impl KeyCodec {
    /// Codec for the given key type.
    pub fn new(key_type: KeyType) -> Self {
        Self { key_type }
    }

    /// The key type this codec handles.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// On-disk width of one key cell.
    pub fn encoded_size(&self) -> usize {
        match self.key_type {
            KeyType::Int | KeyType::Float => 4,
            KeyType::Str(n) => n,
        }
    }

    /// Append the key's cell to `buf`.
    pub fn encode(&self, key: &Key, buf: &mut Vec<u8>) -> Result<(), IndexError> {
        match (self.key_type, key) {
            (KeyType::Int, Key::Int(v)) => buf.extend_from_slice(&v.to_le_bytes()),
            (KeyType::Float, Key::Float(v)) => buf.extend_from_slice(&v.to_le_bytes()),
            (KeyType::Str(n), Key::Str(s)) => encode_padded(s, n, buf),
            (_, key) => {
                return Err(IndexError::KeyMismatch {
                    expected: self.type_name(),
                    got: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Decode one key cell from the start of `bytes`, returning
    /// `(key, consumed)`.
    pub fn decode(&self, bytes: &[u8]) -> Result<(Key, usize), IndexError> {
        Ok(match self.key_type {
            KeyType::Int => {
                let (v, n) = i32::decode_from(bytes)?;
                (Key::Int(v), n)
            }
            KeyType::Float => {
                let (v, n) = f32::decode_from(bytes)?;
                (Key::Float(v), n)
            }
            KeyType::Str(width) => {
                let (s, n) = decode_padded(bytes, width)?;
                (Key::Str(s), n)
            }
        })
    }

    /// Convert a column value into this index's key. DATE values index
    /// through the integer key (epoch seconds, 32-bit).
    pub fn key_from_value(&self, value: &Value) -> Result<Key, IndexError> {
        match (self.key_type, value) {
            (KeyType::Int, Value::Int(v)) => Ok(Key::Int(*v)),
            (KeyType::Int, Value::Date(epoch)) => {
                i32::try_from(*epoch).map(Key::Int).map_err(|_| {
                    IndexError::KeyMismatch {
                        expected: "int",
                        got: format!("date epoch {epoch} out of 32-bit range"),
                    }
                })
            }
            (KeyType::Float, Value::Float(v)) => Ok(Key::Float(*v)),
            (KeyType::Str(width), Value::Str(s)) => {
                let mut cut = s.len().min(width);
                while cut > 0 && !s.is_char_boundary(cut) {
                    cut -= 1;
                }
                Ok(Key::Str(s[..cut].to_string()))
            }
            (_, v) => Err(IndexError::KeyMismatch {
                expected: self.type_name(),
                got: v.to_string(),
            }),
        }
    }

    fn type_name(&self) -> &'static str {
        match self.key_type {
            KeyType::Int => "int",
            KeyType::Float => "float",
            KeyType::Str(_) => "string",
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Capability trait
// ------------------------------------------------------------------------------------------------

/// Point/range index over `(key, slot)` entries with deletion support.
///
/// Implemented by the AVL file, the extendible hash, and the ISAM file.
/// The B+ tree variants (which own row data) and the R-tree (which indexes
/// points) sit outside this trait and are dispatched directly by the
/// [`manager::IndexManager`].
pub trait Index {
    /// Insert an entry. Duplicate-key behavior is per structure: AVL
    /// updates the stored slot, hash appends, ISAM rejects.
    fn insert(&mut self, key: &Value, slot: u64) -> Result<(), IndexError>;

    /// Look up the slot stored for `key`, if any.
    fn find(&mut self, key: &Value) -> Result<Option<u64>, IndexError>;

    /// All slots with `lo <= key <= hi`. Point-only structures return an
    /// empty list.
    fn range(&mut self, lo: &Value, hi: &Value) -> Result<Vec<u64>, IndexError>;

    /// Remove the entry for `key`, returning whether one existed.
    fn remove(&mut self, key: &Value) -> Result<bool, IndexError>;

    /// Flush any buffered state. Structures that write through on every
    /// operation treat this as a no-op.
    fn save(&mut self) -> Result<(), IndexError>;
}

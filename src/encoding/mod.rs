//! Deterministic binary encoding for on-disk persistence.
//!
//! Every file this engine writes — heap records, AVL nodes, hash buckets,
//! ISAM pages, B+ sidecars — is a sequence of **fixed-width, little-endian**
//! cells. This module provides the [`Encode`] and [`Decode`] traits plus the
//! primitive implementations those layouts are built from, so that the wire
//! format is owned by the crate and never shifts under a dependency upgrade.
//!
//! # Wire format
//!
//! | Rust type | Encoding |
//! |-----------|----------|
//! | `u8`      | 1 byte |
//! | `i32` / `u32` | 4 bytes, little-endian |
//! | `f32`     | 4 bytes, IEEE-754 single, little-endian |
//! | `i64` / `u64` | 8 bytes, little-endian |
//! | `[u8; N]` | `N` raw bytes |
//! | `Vec<u8>` | `[u32 len][bytes]` |
//! | `String`  | `[u32 len][utf-8 bytes]` |
//!
//! Fixed-width text cells (VARCHAR columns, string index keys) are handled
//! by [`encode_padded`] / [`decode_padded`]: truncate to the cell width,
//! right-pad with `0x00`, strip trailing `0x00` on the way back.
//!
//! # Zero-panic guarantee
//!
//! No function here uses `unwrap()` or `expect()`. Every decoder is
//! bounds-checked and propagates [`EncodingError`].


use thiserror::Error;

/// Maximum byte length accepted for a single length-prefixed cell (64 MiB).
///
/// A decoded length field above this is rejected immediately, preventing
/// allocation bombs from corrupted files.
pub const MAX_BYTE_LEN: u32 = 64 * 1024 * 1024;

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// Errors produced during encoding or decoding.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// The buffer ran out of bytes before decoding completed.
    #[error("unexpected end of buffer (need {needed} bytes, have {available})")]
    UnexpectedEof {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// A byte sequence decoded as a string was not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A length field exceeded its safety limit.
    #[error("length overflow: {0}")]
    LengthOverflow(String),

    /// Application-level decode error.
    #[error("{0}")]
    Custom(String),
}

// ------------------------------------------------------------------------------------------------
// Core traits
// ------------------------------------------------------------------------------------------------

/// Serialize `self` into a byte buffer.
///
/// Implementations must produce deterministic output: the same logical
/// value always yields the exact same byte sequence.
pub trait Encode {
    /// Append the encoded representation of `self` to `buf`.
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError>;
}

/// Deserialize a value from a byte slice.
///
/// Returns `(value, bytes_consumed)` so callers can advance a cursor
/// through a buffer containing multiple encoded items.
pub trait Decode: Sized {
    /// Decode one value starting at `buf[0]`.
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError>;
}

/// Encode a value into a freshly-allocated `Vec<u8>`.
pub fn encode_to_vec<T: Encode>(value: &T) -> Result<Vec<u8>, EncodingError> {
    let mut buf = Vec::new();
    value.encode_to(&mut buf)?;
    Ok(buf)
}

// ------------------------------------------------------------------------------------------------
// Internal helpers
// ------------------------------------------------------------------------------------------------

/// Verify that `buf` has at least `needed` bytes.
#[inline]
pub(crate) fn require(buf: &[u8], needed: usize) -> Result<(), EncodingError> {
    if buf.len() < needed {
        Err(EncodingError::UnexpectedEof {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

#[inline]
fn len_to_u32(len: usize) -> Result<u32, EncodingError> {
    u32::try_from(len)
        .map_err(|_| EncodingError::LengthOverflow(format!("length {len} exceeds u32::MAX")))
}

macro_rules! le_number_impl {
    ($ty:ty, $width:expr) => {
        impl Encode for $ty {
            #[inline]
            fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
                buf.extend_from_slice(&self.to_le_bytes());
                Ok(())
            }
        }

        impl Decode for $ty {
            #[inline]
            fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
                require(buf, $width)?;
                let bytes: [u8; $width] = match buf[..$width].try_into() {
                    Ok(b) => b,
                    Err(_) => {
                        return Err(EncodingError::Custom(
                            concat!("internal: slice-to-array conversion failed for ", stringify!($ty))
                                .into(),
                        ));
                    }
                };
                Ok((<$ty>::from_le_bytes(bytes), $width))
            }
        }
    };
}

le_number_impl!(i32, 4);
le_number_impl!(u32, 4);
le_number_impl!(f32, 4);
le_number_impl!(i64, 8);
le_number_impl!(u64, 8);

impl Encode for u8 {
    #[inline]
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        buf.push(*self);
        Ok(())
    }
}

impl Decode for u8 {
    #[inline]
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, 1)?;
        Ok((buf[0], 1))
    }
}

// ------------------------------------------------------------------------------------------------
// Fixed-size byte arrays
// ------------------------------------------------------------------------------------------------

impl<const N: usize> Encode for [u8; N] {
    #[inline]
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        buf.extend_from_slice(self);
        Ok(())
    }
}

impl<const N: usize> Decode for [u8; N] {
    #[inline]
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(&buf[..N]);
        Ok((arr, N))
    }
}

// ------------------------------------------------------------------------------------------------
// Length-prefixed byte vectors and strings: [u32 len][bytes]
// ------------------------------------------------------------------------------------------------

impl Encode for Vec<u8> {
    #[inline]
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        len_to_u32(self.len())?.encode_to(buf)?;
        buf.extend_from_slice(self);
        Ok(())
    }
}

impl Decode for Vec<u8> {
    #[inline]
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (len, mut offset) = u32::decode_from(buf)?;
        if len > MAX_BYTE_LEN {
            return Err(EncodingError::LengthOverflow(format!(
                "byte vector length {len} exceeds MAX_BYTE_LEN ({MAX_BYTE_LEN})"
            )));
        }
        let len = len as usize;
        require(&buf[offset..], len)?;
        let data = buf[offset..offset + len].to_vec();
        offset += len;
        Ok((data, offset))
    }
}

impl Encode for String {
    #[inline]
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        len_to_u32(self.len())?.encode_to(buf)?;
        buf.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl Decode for String {
    #[inline]
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (raw, consumed) = Vec::<u8>::decode_from(buf)?;
        let s = String::from_utf8(raw)?;
        Ok((s, consumed))
    }
}

// ------------------------------------------------------------------------------------------------
// Fixed-width padded text cells
// ------------------------------------------------------------------------------------------------

/// Encode `text` into exactly `width` bytes: UTF-8, truncated to `width`,
/// right-padded with `0x00`.
///
/// Truncation happens on a byte boundary; a multi-byte character that
/// straddles the cell edge is dropped entirely rather than split.
pub fn encode_padded(text: &str, width: usize, buf: &mut Vec<u8>) {
    let bytes = text.as_bytes();
    let mut cut = bytes.len().min(width);
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    buf.extend_from_slice(&bytes[..cut]);
    buf.resize(buf.len() + (width - cut), 0);
}

/// Decode a `width`-byte padded cell back into a `String`, stripping
/// trailing `0x00` padding.
pub fn decode_padded(buf: &[u8], width: usize) -> Result<(String, usize), EncodingError> {
    require(buf, width)?;
    let cell = &buf[..width];
    let end = cell.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    let s = String::from_utf8(cell[..end].to_vec())?;
    Ok((s, width))
}

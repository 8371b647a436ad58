//! Bounds-checked readers for the fixed-width fields of a SAS7BDAT file.
//!
//! Every reader takes the buffer it addresses plus an absolute offset and
//! returns `None` when the field would cross the end of that buffer. Callers
//! turn `None` into a [`crate::Error::Corrupted`] that names the section.

use byteorder::{ByteOrder, LittleEndian};

use crate::metadata::WordSize;

#[inline]
#[must_use]
pub fn field(bytes: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    let end = offset.checked_add(len)?;
    bytes.get(offset..end)
}

#[inline]
#[must_use]
pub fn read_u8(bytes: &[u8], offset: usize) -> Option<u8> {
    bytes.get(offset).copied()
}

#[inline]
#[must_use]
pub fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    field(bytes, offset, 2).map(LittleEndian::read_u16)
}

#[inline]
#[must_use]
pub fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    field(bytes, offset, 4).map(LittleEndian::read_u32)
}

#[inline]
#[must_use]
pub fn read_i32(bytes: &[u8], offset: usize) -> Option<i32> {
    field(bytes, offset, 4).map(LittleEndian::read_i32)
}

#[inline]
#[must_use]
pub fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    field(bytes, offset, 8).map(LittleEndian::read_u64)
}

#[inline]
#[must_use]
pub fn read_f64(bytes: &[u8], offset: usize) -> Option<f64> {
    field(bytes, offset, 8).map(LittleEndian::read_f64)
}

/// Reads a 4- or 8-byte unsigned integer depending on the file's word size.
#[inline]
#[must_use]
pub fn read_word(bytes: &[u8], offset: usize, word_size: WordSize) -> Option<u64> {
    match word_size {
        WordSize::Bit32 => read_u32(bytes, offset).map(u64::from),
        WordSize::Bit64 => read_u64(bytes, offset),
    }
}

/// Decodes a numeric field stored in `raw.len()` bytes (1 to 8).
///
/// Narrow fields keep the most significant bytes of the double, so the value
/// is left-padded with zero bytes up to eight before decoding.
#[must_use]
pub fn decode_padded_f64(raw: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    let len = raw.len().min(8);
    buf[8 - len..].copy_from_slice(&raw[..len]);
    LittleEndian::read_f64(&buf)
}

/// Strips leading and trailing bytes that render as whitespace (NUL, space
/// and other ASCII control characters).
#[must_use]
pub fn trim_padding(bytes: &[u8]) -> &[u8] {
    let Some(start) = bytes.iter().position(|b| *b > b' ') else {
        return &[];
    };
    let end = bytes.iter().rposition(|b| *b > b' ').map_or(start, |idx| idx + 1);
    &bytes[start..end]
}

/// Reads a fixed-width ASCII field and trims its padding.
#[must_use]
pub fn read_padded_string(bytes: &[u8], offset: usize, len: usize) -> Option<String> {
    let raw = field(bytes, offset, len)?;
    Some(String::from_utf8_lossy(trim_padding(raw)).into_owned())
}

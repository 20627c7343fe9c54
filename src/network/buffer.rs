//! Bounds-checked byte buffer with a read cursor.
//!
//! A [`Buffer`] either borrows caller memory (typically the array a device
//! read landed in) or owns its storage. Owned buffers may be growable, in
//! which case writes past the end reserve a fixed chunk ahead.
//!
//! The cursor model is `0 <= position <= len <= capacity`. Reads consume
//! bytes between `position` and `len`; writes store at `position` and push
//! `len` forward when they pass it. Any access that would break the model
//! fails with a [`BufferError`] carrying the exact shortfall and leaves
//! `len` untouched.

// Integer widths are bounded to 8 bytes and offsets to the storage size,
// so the narrowing casts below never lose information.
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use std::fmt;

use crate::error::BufferError;

/// Default reserve-ahead increment for growable buffers.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Number of bytes shown by the `Debug` preview.
const DEBUG_PREVIEW_LEN: usize = 32;

/// High bits to OR into a sign-extended value, indexed by byte width.
const SIGN_MASKS: [u64; 9] = [
    0,
    0xFFFF_FFFF_FFFF_FF00,
    0xFFFF_FFFF_FFFF_0000,
    0xFFFF_FFFF_FF00_0000,
    0xFFFF_FFFF_0000_0000,
    0xFFFF_FF00_0000_0000,
    0xFFFF_0000_0000_0000,
    0xFF00_0000_0000_0000,
    0,
];

/// Largest value a varint can carry. An all-ones payload is reserved at
/// every width, so each width holds one value less than its bit count allows.
pub const VARINT_MAX: u64 = (1 << 56) - 2;

type BufResult<T> = std::result::Result<T, BufferError>;

/// How a buffer reacts to a write past its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// Writes past capacity fail.
    Fixed,
    /// Storage is extended to the needed size plus `chunk` bytes.
    Growable { chunk: usize },
}

enum Storage<'a> {
    Borrowed(&'a mut [u8]),
    Owned(Vec<u8>),
}

impl Storage<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Borrowed(slice) => slice,
            Self::Owned(vec) => vec,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Borrowed(slice) => slice,
            Self::Owned(vec) => vec,
        }
    }
}

/// A byte region with a read/write cursor.
pub struct Buffer<'a> {
    storage: Storage<'a>,
    len: usize,
    position: usize,
    growth: Growth,
}

macro_rules! be_accessors {
    ($($width:literal => $read_u:ident, $read_s:ident, $write_u:ident, $write_s:ident, $ut:ty, $st:ty;)*) => {
        $(
            #[doc = concat!("Read a ", stringify!($width), "-byte big-endian unsigned integer.")]
            #[inline]
            pub fn $read_u(&mut self) -> BufResult<$ut> {
                self.read_uint($width).map(|value| value as $ut)
            }

            #[doc = concat!("Read a ", stringify!($width), "-byte big-endian signed integer.")]
            #[inline]
            pub fn $read_s(&mut self) -> BufResult<$st> {
                self.read_int($width).map(|value| value as $st)
            }

            #[doc = concat!("Write the low ", stringify!($width), " bytes of `value` big-endian.")]
            #[inline]
            pub fn $write_u(&mut self, value: $ut) -> BufResult<()> {
                self.write_uint(u64::from(value), $width)
            }

            #[doc = concat!("Write the low ", stringify!($width), " bytes of `value` big-endian.")]
            #[inline]
            pub fn $write_s(&mut self, value: $st) -> BufResult<()> {
                self.write_int(i64::from(value), $width)
            }
        )*
    };
}

impl<'a> Buffer<'a> {
    /// Wrap caller memory holding `len` valid bytes.
    ///
    /// The buffer never frees nor grows the borrowed region.
    pub fn borrowed(data: &'a mut [u8], len: usize) -> BufResult<Self> {
        if len > data.len() {
            return Err(BufferError::InvalidLength {
                len,
                capacity: data.len(),
            });
        }
        Ok(Self {
            storage: Storage::Borrowed(data),
            len,
            position: 0,
            growth: Growth::Fixed,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.bytes().len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left between the cursor and the end of valid data.
    pub fn remaining(&self) -> usize {
        self.len - self.position
    }

    /// Bytes that can still be appended without growing.
    pub fn capacity_left(&self) -> usize {
        self.capacity() - self.len
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    pub fn is_growable(&self) -> bool {
        matches!(self.growth, Growth::Growable { .. })
    }

    pub fn growth(&self) -> Growth {
        self.growth
    }

    /// All valid bytes, independent of the cursor.
    pub fn as_slice(&self) -> &[u8] {
        &self.storage.bytes()[..self.len]
    }

    /// Valid bytes that have not been read yet.
    pub fn unread(&self) -> &[u8] {
        &self.storage.bytes()[self.position..self.len]
    }

    /// Move the cursor to an absolute offset within the valid data.
    pub fn seek(&mut self, position: usize) -> BufResult<()> {
        if position > self.len {
            return Err(BufferError::Read {
                missing: (position - self.len) as i64,
            });
        }
        self.position = position;
        Ok(())
    }

    /// Advance the cursor by `count` bytes.
    pub fn skip(&mut self, count: usize) -> BufResult<()> {
        self.take(count).map(|_| ())
    }

    /// Drop all data. Storage is kept.
    pub fn clear(&mut self) {
        self.len = 0;
        self.position = 0;
    }

    fn take(&mut self, count: usize) -> BufResult<&[u8]> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(BufferError::Read {
                missing: count as i64 - remaining as i64,
            });
        }
        let start = self.position;
        self.position += count;
        Ok(&self.storage.bytes()[start..start + count])
    }

    fn take_array<const N: usize>(&mut self) -> BufResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> BufResult<u8> {
        self.unread()
            .first()
            .copied()
            .ok_or(BufferError::Read { missing: 1 })
    }

    /// Read a big-endian unsigned integer of `width` bytes (1 to 8).
    pub fn read_uint(&mut self, width: usize) -> BufResult<u64> {
        check_width(width)?;
        let bytes = self.take(width)?;
        Ok(bytes
            .iter()
            .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte)))
    }

    /// Read a big-endian two's-complement integer of `width` bytes (1 to 8),
    /// sign-extended from its exact bit width.
    pub fn read_int(&mut self, width: usize) -> BufResult<i64> {
        let raw = self.read_uint(width)?;
        let sign_bit = 1u64 << (8 * width - 1);
        if raw & sign_bit == 0 {
            Ok(raw as i64)
        } else {
            Ok((raw | SIGN_MASKS[width]) as i64)
        }
    }

    be_accessors! {
        1 => read_u8, read_s8, write_u8, write_s8, u8, i8;
        2 => read_u16, read_s16, write_u16, write_s16, u16, i16;
        3 => read_u24, read_s24, write_u24, write_s24, u32, i32;
        4 => read_u32, read_s32, write_u32, write_s32, u32, i32;
        5 => read_u40, read_s40, write_u40, write_s40, u64, i64;
        6 => read_u48, read_s48, write_u48, write_s48, u64, i64;
        7 => read_u56, read_s56, write_u56, write_s56, u64, i64;
        8 => read_u64, read_s64, write_u64, write_s64, u64, i64;
    }

    pub fn read_u16_le(&mut self) -> BufResult<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn read_u32_le(&mut self) -> BufResult<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> BufResult<f32> {
        self.read_u32().map(f32::from_bits)
    }

    pub fn read_f64(&mut self) -> BufResult<f64> {
        self.read_u64().map(f64::from_bits)
    }

    pub fn read_f32_le(&mut self) -> BufResult<f32> {
        self.take_array().map(f32::from_le_bytes)
    }

    /// Borrow the next `count` bytes. The slice lives until the next
    /// mutating call.
    pub fn read_bytes(&mut self, count: usize) -> BufResult<&[u8]> {
        self.take(count)
    }

    /// Copy the next `dst.len()` bytes into `dst`.
    pub fn read_bytes_into(&mut self, dst: &mut [u8]) -> BufResult<()> {
        dst.copy_from_slice(self.take(dst.len())?);
        Ok(())
    }

    /// Borrow up to `max` bytes. An empty slice means no data is left.
    pub fn read_bytes_at_most(&mut self, max: usize) -> &[u8] {
        let count = max.min(self.remaining());
        let start = self.position;
        self.position += count;
        &self.storage.bytes()[start..start + count]
    }

    /// Read `count` bytes as text, replacing invalid UTF-8.
    pub fn read_string(&mut self, count: usize) -> BufResult<String> {
        self.take(count)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read up to the next zero byte, which is consumed but not returned.
    /// Without a terminator the rest of the data is consumed.
    pub fn read_cstring(&mut self) -> String {
        let unread = self.unread();
        let (text_len, consumed) = match unread.iter().position(|&byte| byte == 0) {
            Some(nul) => (nul, nul + 1),
            None => (unread.len(), unread.len()),
        };
        let text = String::from_utf8_lossy(&unread[..text_len]).into_owned();
        self.position += consumed;
        text
    }

    /// Decode a varint written by [`Buffer::write_varint`].
    pub fn read_varint(&mut self) -> BufResult<u64> {
        let first = self.peek_u8()?;
        if first == 0 {
            return Err(BufferError::InvalidVarint { first });
        }
        let width = first.leading_zeros() as usize + 1;
        let raw = self.read_uint(width)?;
        Ok(raw & ((1u64 << (7 * width)) - 1))
    }

    fn ensure_writable(&mut self, count: usize) -> BufResult<()> {
        let needed = self.position + count;
        let capacity = self.capacity();
        if needed <= capacity {
            return Ok(());
        }
        match (&mut self.storage, self.growth) {
            (Storage::Owned(vec), Growth::Growable { chunk }) => {
                vec.resize(needed + chunk, 0);
                Ok(())
            }
            _ => Err(BufferError::Write {
                missing: needed as i64 - capacity as i64,
            }),
        }
    }

    fn put(&mut self, bytes: &[u8]) -> BufResult<()> {
        self.ensure_writable(bytes.len())?;
        let start = self.position;
        self.storage.bytes_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        self.len = self.len.max(self.position);
        Ok(())
    }

    /// Write the low `width` bytes (1 to 8) of `value` big-endian.
    pub fn write_uint(&mut self, value: u64, width: usize) -> BufResult<()> {
        check_width(width)?;
        self.put(&value.to_be_bytes()[8 - width..])
    }

    /// Write the low `width` bytes (1 to 8) of the two's-complement `value`.
    pub fn write_int(&mut self, value: i64, width: usize) -> BufResult<()> {
        self.write_uint(value as u64, width)
    }

    pub fn write_u16_le(&mut self, value: u16) -> BufResult<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn write_u32_le(&mut self, value: u32) -> BufResult<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> BufResult<()> {
        self.write_u32(value.to_bits())
    }

    pub fn write_f64(&mut self, value: f64) -> BufResult<()> {
        self.write_u64(value.to_bits())
    }

    pub fn write_f32_le(&mut self, value: f32) -> BufResult<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> BufResult<()> {
        self.put(bytes)
    }

    pub fn write_str(&mut self, text: &str) -> BufResult<()> {
        self.put(text.as_bytes())
    }

    /// Write `bytes` after the last valid byte. The cursor does not move.
    pub fn append(&mut self, bytes: &[u8]) -> BufResult<()> {
        let saved = self.position;
        self.position = self.len;
        let result = self.put(bytes);
        self.position = saved;
        result
    }

    /// Encode `value` in the smallest width whose `7 * width` payload bits
    /// hold it without being all ones, with a width marker in the leading
    /// bits of the first byte.
    ///
    /// Returns the number of bytes written.
    pub fn write_varint(&mut self, value: u64) -> BufResult<usize> {
        let width = varint_width(value)?;
        let mut encoded = [0u8; 8];
        encoded[8 - width..].copy_from_slice(&value.to_be_bytes()[8 - width..]);
        encoded[8 - width] |= 0x80 >> (width - 1);
        self.put(&encoded[8 - width..])?;
        Ok(width)
    }

    /// Overwrite bytes at `offset` and restore the cursor afterwards.
    pub fn write_bytes_at(&mut self, offset: usize, bytes: &[u8]) -> BufResult<()> {
        let saved = self.position;
        self.seek(offset)?;
        let result = self.put(bytes);
        self.position = saved;
        result
    }

    /// Overwrite a big-endian `u16` at `offset` and restore the cursor.
    pub fn write_u16_at(&mut self, offset: usize, value: u16) -> BufResult<()> {
        self.write_bytes_at(offset, &value.to_be_bytes())
    }

    /// Make room for `additional` bytes past the cursor.
    pub fn reserve(&mut self, additional: usize) -> BufResult<()> {
        self.ensure_writable(additional)
    }

    /// Drop bytes that were already read.
    ///
    /// A fully consumed buffer is always cleared. Otherwise the unread tail
    /// is moved to the front when `forced`, or when the consumed part is
    /// more than eight times the unread part. Returns the evicted count.
    pub fn compact(&mut self, forced: bool) -> usize {
        let consumed = self.position;
        if consumed == self.len {
            self.clear();
            return consumed;
        }
        if !forced && consumed <= 8 * self.remaining() {
            return 0;
        }
        let len = self.len;
        self.storage.bytes_mut().copy_within(consumed..len, 0);
        self.len -= consumed;
        self.position = 0;
        consumed
    }

    /// Offset of `needle` in the unread data, relative to the cursor.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() {
            return Some(0);
        }
        self.unread()
            .windows(needle.len())
            .position(|window| window == needle)
    }

    /// Uppercase hex of up to `count` bytes from `offset`, clamped to the
    /// valid data.
    pub fn hex(&self, offset: usize, count: usize) -> String {
        let start = offset.min(self.len);
        let end = start.saturating_add(count).min(self.len);
        to_hex(&self.storage.bytes()[start..end])
    }

    /// Independent owned copy of the valid bytes with the cursor at zero.
    ///
    /// Capacity and growth policy are preserved.
    pub fn deep_clone(&self) -> Buffer<'static> {
        let mut storage = vec![0u8; self.capacity()];
        storage[..self.len].copy_from_slice(self.as_slice());
        Buffer {
            storage: Storage::Owned(storage),
            len: self.len,
            position: 0,
            growth: self.growth,
        }
    }
}

impl Buffer<'static> {
    /// Owned buffer that never grows.
    pub fn fixed(capacity: usize) -> Self {
        Self {
            storage: Storage::Owned(vec![0; capacity]),
            len: 0,
            position: 0,
            growth: Growth::Fixed,
        }
    }

    /// Owned buffer that grows by [`DEFAULT_CHUNK_SIZE`] past its needs.
    pub fn growable(capacity: usize) -> Self {
        Self::with_chunk_size(capacity, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(capacity: usize, chunk: usize) -> Self {
        Self {
            storage: Storage::Owned(vec![0; capacity]),
            len: 0,
            position: 0,
            growth: Growth::Growable { chunk },
        }
    }

    /// Owned fixed-size copy of `bytes`, cursor at zero.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            storage: Storage::Owned(bytes.to_vec()),
            len: bytes.len(),
            position: 0,
            growth: Growth::Fixed,
        }
    }
}

impl fmt::Debug for Buffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[B pos={} l={} c={}]",
            self.position,
            self.len,
            self.capacity()
        )?;
        if self.len > 0 {
            write!(f, " {}", self.hex(0, DEBUG_PREVIEW_LEN))?;
            if self.len > DEBUG_PREVIEW_LEN {
                f.write_str("..")?;
            }
        }
        Ok(())
    }
}

fn check_width(width: usize) -> BufResult<()> {
    if (1..=8).contains(&width) {
        Ok(())
    } else {
        Err(BufferError::InvalidWidth(width))
    }
}

/// Width in bytes of the varint encoding of `value`.
///
/// `2^(7w) - 1` is the reserved all-ones payload of width `w`, so it moves
/// up to the next width.
pub fn varint_width(value: u64) -> BufResult<usize> {
    (1..=8usize)
        .find(|&width| value < (1u64 << (7 * width)) - 1)
        .ok_or(BufferError::VarintOverflow(value))
}

/// Uppercase hex rendering of `bytes`.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02X}")).collect()
}

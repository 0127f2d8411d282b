//! Immutable byte sequences with a defined total order, plus the
//! order-preserving ("sorted") and native codecs built on top of them.
//!
//! Every key written to storage is a [`ByteArray`]; the sorted codecs
//! guarantee that unsigned byte-lexicographic ordering of encoded keys
//! matches the natural ordering of the source values.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI32, Ordering as AtomicOrdering};
use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{GraphError, Result};

/// Width of an encoded i16 / unsigned short.
pub const SHORT_SIZE: usize = 2;
/// Width of an encoded i32.
pub const INT_SIZE: usize = 4;
/// Width of an encoded i64.
pub const LONG_SIZE: usize = 8;
/// Width of an encoded f64.
pub const DOUBLE_SIZE: usize = 8;
/// Width of an encoded UUID.
pub const UUID_SIZE: usize = 16;
/// Width of an encoded datetime (sorted i64 of Unix milliseconds).
pub const DATETIME_SIZE: usize = 8;
/// Width of the big-endian length prefix on sorted strings.
pub const STRING_SIZE_PREFIX: usize = 2;
/// Maximum payload length of a sorted string, in bytes.
pub const STRING_MAX_SIZE: usize = u16::MAX as usize;

const I16_SIGN: u16 = 1 << 15;
const I32_SIGN: u32 = 1 << 31;
const I64_SIGN: u64 = 1 << 63;

/// An immutable sequence of bytes with unsigned byte-lexicographic ordering.
///
/// A base array owns its whole backing buffer; a view is a window into a
/// buffer shared through the same `Arc`, so slicing is zero-copy and views
/// never need to materialize a private copy. Equality, ordering, and hashing
/// are representation-independent: a view and a base with identical content
/// are indistinguishable.
pub struct ByteArray {
    buf: Arc<[u8]>,
    start: usize,
    len: usize,
    // Cached polynomial hash; 0 means "not yet computed".
    hash: AtomicI32,
}

impl ByteArray {
    /// Creates an owning array by copying the given bytes.
    pub fn of(bytes: &[u8]) -> Self {
        Self::from_arc(Arc::from(bytes))
    }

    /// Creates an owning array without copying the vector's contents twice.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self::from_arc(Arc::from(bytes.into_boxed_slice()))
    }

    /// The empty array.
    pub fn empty() -> Self {
        Self::from_arc(Arc::from(&[][..]))
    }

    fn from_arc(buf: Arc<[u8]>) -> Self {
        let len = buf.len();
        ByteArray {
            buf,
            start: 0,
            len,
            hash: AtomicI32::new(0),
        }
    }

    /// Concatenates the given arrays into one new owning array.
    ///
    /// The total length is computed up front so the result is allocated
    /// exactly once.
    pub fn join(parts: &[&ByteArray]) -> Self {
        let total: usize = parts.iter().map(|p| p.length()).sum();
        let mut out = Vec::with_capacity(total);
        for part in parts {
            out.extend_from_slice(part.as_slice());
        }
        Self::from_vec(out)
    }

    /// A zero-copy window over `[from, to)`.
    ///
    /// Panics if the range is out of bounds; that is a programming error.
    pub fn view(&self, from: usize, to: usize) -> Self {
        assert!(
            from <= to && to <= self.len,
            "view [{from}, {to}) out of bounds for length {}",
            self.len
        );
        ByteArray {
            buf: Arc::clone(&self.buf),
            start: self.start + from,
            len: to - from,
            hash: AtomicI32::new(0),
        }
    }

    /// A zero-copy window from `from` to the end.
    pub fn view_from(&self, from: usize) -> Self {
        self.view(from, self.len)
    }

    /// A fresh owning copy of `[from, to)`, regardless of representation.
    pub fn copy_range(&self, from: usize, to: usize) -> Self {
        assert!(
            from <= to && to <= self.len,
            "copy_range [{from}, {to}) out of bounds for length {}",
            self.len
        );
        Self::of(&self.as_slice()[from..to])
    }

    /// The underlying bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.start..self.start + self.len]
    }

    /// Number of bytes.
    pub fn length(&self) -> usize {
        self.len
    }

    /// True when the array has no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte at index `i`. Panics when out of range.
    pub fn get(&self, i: usize) -> u8 {
        self.as_slice()[i]
    }

    /// True iff `prefix` is byte-for-byte a prefix of this array.
    ///
    /// A prefix longer than the array is never a match.
    pub fn has_prefix(&self, prefix: &[u8]) -> bool {
        self.as_slice().starts_with(prefix)
    }

    /// Polynomial rolling hash (base 31, seed 1), computed at most once per
    /// instance and cached.
    ///
    /// Seeding at 1 keeps the empty array distinct from arrays whose natural
    /// hash would be 0. A non-empty array that genuinely hashes to 0 is
    /// recomputed on each call, which is harmless.
    pub fn cached_hash(&self) -> i32 {
        let cached = self.hash.load(AtomicOrdering::Relaxed);
        if cached != 0 {
            return cached;
        }
        let mut h: i32 = 1;
        for &b in self.as_slice() {
            h = h.wrapping_mul(31).wrapping_add(i32::from(b));
        }
        self.hash.store(h, AtomicOrdering::Relaxed);
        h
    }
}

impl Clone for ByteArray {
    fn clone(&self) -> Self {
        ByteArray {
            buf: Arc::clone(&self.buf),
            start: self.start,
            len: self.len,
            hash: AtomicI32::new(self.hash.load(AtomicOrdering::Relaxed)),
        }
    }
}

impl PartialEq for ByteArray {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteArray {}

impl PartialOrd for ByteArray {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByteArray {
    /// Unsigned byte-lexicographic order over the full length, starting at
    /// index 0; on an equal prefix the shorter array sorts first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl Hash for ByteArray {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.cached_hash());
    }
}

impl fmt::Debug for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteArray(0x{})", hex::encode(self.as_slice()))
    }
}

impl From<Vec<u8>> for ByteArray {
    fn from(v: Vec<u8>) -> Self {
        Self::from_vec(v)
    }
}

impl From<&[u8]> for ByteArray {
    fn from(s: &[u8]) -> Self {
        Self::of(s)
    }
}

// ---------------------------------------------------------------------------
// Sorted (order-preserving) codecs.
//
// Signed integers: big-endian two's complement with the sign bit of the most
// significant byte XORed with 0x80, so two's-complement ordering becomes
// unsigned lexicographic ordering. Doubles: sign-bit flip for non-negative
// values, all bits flipped for negative values, so more-negative sorts first.
// ---------------------------------------------------------------------------

impl ByteArray {
    /// Encodes an i16 in order-preserving form (2 bytes).
    pub fn encode_i16_sorted(v: i16) -> Self {
        Self::of(&((v as u16) ^ I16_SIGN).to_be_bytes())
    }

    /// Decodes an order-preserving i16. Panics unless exactly 2 bytes.
    pub fn decode_sorted_i16(&self) -> i16 {
        assert_eq!(self.len, SHORT_SIZE, "sorted i16 must be 2 bytes");
        let raw = u16::from_be_bytes(self.as_slice().try_into().unwrap());
        (raw ^ I16_SIGN) as i16
    }

    /// Encodes an i32 in order-preserving form (4 bytes).
    pub fn encode_i32_sorted(v: i32) -> Self {
        Self::of(&((v as u32) ^ I32_SIGN).to_be_bytes())
    }

    /// Decodes an order-preserving i32. Panics unless exactly 4 bytes.
    pub fn decode_sorted_i32(&self) -> i32 {
        assert_eq!(self.len, INT_SIZE, "sorted i32 must be 4 bytes");
        let raw = u32::from_be_bytes(self.as_slice().try_into().unwrap());
        (raw ^ I32_SIGN) as i32
    }

    /// Encodes an i64 in order-preserving form (8 bytes).
    pub fn encode_i64_sorted(v: i64) -> Self {
        Self::of(&((v as u64) ^ I64_SIGN).to_be_bytes())
    }

    /// Decodes an order-preserving i64. Panics unless exactly 8 bytes.
    pub fn decode_sorted_i64(&self) -> i64 {
        assert_eq!(self.len, LONG_SIZE, "sorted i64 must be 8 bytes");
        let raw = u64::from_be_bytes(self.as_slice().try_into().unwrap());
        (raw ^ I64_SIGN) as i64
    }

    /// Encodes an f64 in order-preserving form (8 bytes).
    ///
    /// NaN has no position in the encoded total order and is asserted
    /// against: passing one is a caller bug, not a recoverable condition.
    /// `-0.0` encodes as a negative key and sorts immediately before `+0.0`.
    pub fn encode_f64_sorted(v: f64) -> Self {
        assert!(!v.is_nan(), "NaN keys are not allowed");
        let bits = v.to_bits();
        let encoded = if bits & I64_SIGN != 0 { !bits } else { bits ^ I64_SIGN };
        Self::of(&encoded.to_be_bytes())
    }

    /// Decodes an order-preserving f64. Panics unless exactly 8 bytes.
    pub fn decode_sorted_f64(&self) -> f64 {
        assert_eq!(self.len, DOUBLE_SIZE, "sorted f64 must be 8 bytes");
        let encoded = u64::from_be_bytes(self.as_slice().try_into().unwrap());
        let bits = if encoded & I64_SIGN != 0 {
            encoded ^ I64_SIGN
        } else {
            !encoded
        };
        f64::from_bits(bits)
    }

    /// Encodes a string with a 2-byte big-endian length prefix.
    ///
    /// Payloads over [`STRING_MAX_SIZE`] bytes are rejected with a typed
    /// error carrying the offending and maximum lengths.
    pub fn encode_string_sorted(s: &str) -> Result<Self> {
        let len = s.len();
        if len > STRING_MAX_SIZE {
            return Err(GraphError::StringTooLong {
                len,
                max: STRING_MAX_SIZE,
            });
        }
        let mut out = Vec::with_capacity(STRING_SIZE_PREFIX + len);
        out.extend_from_slice(&(len as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
        Ok(Self::from_vec(out))
    }

    /// Decodes a length-prefixed string. Panics when the prefix disagrees
    /// with the actual payload length or the payload is not valid UTF-8.
    pub fn decode_sorted_string(&self) -> String {
        assert!(
            self.len >= STRING_SIZE_PREFIX,
            "sorted string shorter than its length prefix"
        );
        let declared = self.view(0, STRING_SIZE_PREFIX).decode_u16_be() as usize;
        assert_eq!(
            declared,
            self.len - STRING_SIZE_PREFIX,
            "sorted string length prefix disagrees with payload"
        );
        let body = &self.as_slice()[STRING_SIZE_PREFIX..];
        String::from_utf8(body.to_vec()).expect("sorted string payload not valid UTF-8")
    }

    /// Encodes a datetime as a sorted i64 of Unix milliseconds.
    ///
    /// Sub-millisecond precision truncates.
    pub fn encode_datetime_sorted(dt: OffsetDateTime) -> Self {
        let millis = (dt.unix_timestamp_nanos() / 1_000_000) as i64;
        Self::encode_i64_sorted(millis)
    }

    /// Decodes a sorted datetime. Panics unless exactly 8 bytes.
    pub fn decode_sorted_datetime(&self) -> OffsetDateTime {
        let millis = self.decode_sorted_i64();
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .expect("sorted datetime out of representable range")
    }

    /// Encodes a UUID as 16 bytes, most-significant half first.
    ///
    /// Not order-preserving; UUIDs have no meaningful natural order here.
    pub fn encode_uuid(u: Uuid) -> Self {
        Self::of(u.as_bytes())
    }

    /// Decodes a UUID. Panics unless exactly 16 bytes.
    pub fn decode_uuid(&self) -> Uuid {
        assert_eq!(self.len, UUID_SIZE, "UUID must be 16 bytes");
        Uuid::from_slice(self.as_slice()).unwrap()
    }
}

// ---------------------------------------------------------------------------
// Native (non-sorted) codecs: little-endian two's complement, no sign flip.
// Never use these for storage keys.
// ---------------------------------------------------------------------------

impl ByteArray {
    /// Encodes an i64 in native little-endian form.
    pub fn encode_i64_le(v: i64) -> Self {
        Self::of(&v.to_le_bytes())
    }

    /// Decodes a native little-endian i64. Panics unless exactly 8 bytes.
    pub fn decode_i64_le(&self) -> i64 {
        assert_eq!(self.len, LONG_SIZE, "native i64 must be 8 bytes");
        i64::from_le_bytes(self.as_slice().try_into().unwrap())
    }

    /// Encodes an i32 in native little-endian form.
    pub fn encode_i32_le(v: i32) -> Self {
        Self::of(&v.to_le_bytes())
    }

    /// Decodes a native little-endian i32. Panics unless exactly 4 bytes.
    pub fn decode_i32_le(&self) -> i32 {
        assert_eq!(self.len, INT_SIZE, "native i32 must be 4 bytes");
        i32::from_le_bytes(self.as_slice().try_into().unwrap())
    }

    /// Encodes a u16 in big-endian form (length prefixes, generated keys).
    pub fn encode_u16_be(v: u16) -> Self {
        Self::of(&v.to_be_bytes())
    }

    /// Decodes a big-endian unsigned short. Panics unless exactly 2 bytes.
    pub fn decode_u16_be(&self) -> u16 {
        assert_eq!(self.len, SHORT_SIZE, "unsigned short must be 2 bytes");
        u16::from_be_bytes(self.as_slice().try_into().unwrap())
    }

    /// Encodes a u64 in big-endian form (generated thing keys).
    pub fn encode_u64_be(v: u64) -> Self {
        Self::of(&v.to_be_bytes())
    }

    /// Decodes a big-endian u64. Panics unless exactly 8 bytes.
    pub fn decode_u64_be(&self) -> u64 {
        assert_eq!(self.len, LONG_SIZE, "u64 must be 8 bytes");
        u64::from_be_bytes(self.as_slice().try_into().unwrap())
    }
}

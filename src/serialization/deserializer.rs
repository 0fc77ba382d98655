use super::{V2_COMPRESSED_COOKIE, V2_COOKIE};
use crate::{Histogram, RestatState, StoreKind};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};
use std::{error, fmt};

/// Errors that can happen during deserialization.
#[derive(Debug)]
pub enum DeserializeError {
    /// An i/o operation failed.
    IoError(io::Error),
    /// The cookie (first 4 bytes) did not match that for any supported format.
    InvalidCookie,
    /// The histogram uses features that this implementation doesn't support (e.g. a compressed
    /// framing or index normalization), so it cannot be deserialized correctly.
    UnsupportedFeature,
    /// A count exceeded what can be represented in the chosen counter store.
    UnsuitableCounterType,
    /// The histogram instance could not be created because the serialized parameters were
    /// invalid (e.g. lowest value, highest value, etc.)
    InvalidParameters,
    /// The current system's pointer width cannot represent the encoded histogram.
    UsizeTypeTooSmall,
    /// The encoded array is longer than it should be for the histogram's value range.
    EncodedArrayTooLong,
}

impl std::convert::From<std::io::Error> for DeserializeError {
    fn from(e: std::io::Error) -> Self {
        DeserializeError::IoError(e)
    }
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeserializeError::IoError(e) => write!(f, "An i/o operation failed: {}", e),
            DeserializeError::InvalidCookie => write!(
                f,
                "The cookie (first 4 bytes) did not match that for any supported format"
            ),
            DeserializeError::UnsupportedFeature => write!(
                f,
                "The histogram uses features that this implementation doesn't support"
            ),
            DeserializeError::UnsuitableCounterType => write!(
                f,
                "A count exceeded what can be represented in the chosen counter store"
            ),
            DeserializeError::InvalidParameters => write!(
                f,
                "The serialized parameters were invalid (e.g. lowest value, highest value, etc)"
            ),
            DeserializeError::UsizeTypeTooSmall => write!(
                f,
                "The current system's pointer width cannot represent the encoded histogram"
            ),
            DeserializeError::EncodedArrayTooLong => write!(
                f,
                "The encoded array is longer than it should be for the histogram's value range"
            ),
        }
    }
}

impl error::Error for DeserializeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DeserializeError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// Deserializer for the V2 binary format.
///
/// The format's magic cookie identifies it reliably, so one deserializer type covers it;
/// re-use one instance to amortize its payload buffer across histograms.
pub struct Deserializer {
    payload_buf: Vec<u8>,
}

impl Default for Deserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer {
    /// Create a new deserializer.
    pub fn new() -> Deserializer {
        Deserializer {
            payload_buf: Vec::new(),
        }
    }

    /// Deserialize an encoded histogram from the provided reader into a histogram backed by
    /// dense 64-bit counters.
    ///
    /// Note that `&[u8]` and `Cursor` are convenient implementations of `Read` if you have some
    /// bytes already in slice or `Vec` form.
    pub fn deserialize<R: Read>(&mut self, reader: &mut R) -> Result<Histogram, DeserializeError> {
        self.deserialize_into(reader, StoreKind::U64)
    }

    /// Deserialize an encoded histogram from the provided reader into a histogram backed by the
    /// given counter store. Fails with `UnsuitableCounterType` when an encoded count does not
    /// fit the chosen store's counter width.
    pub fn deserialize_into<R: Read>(
        &mut self,
        reader: &mut R,
        store: StoreKind,
    ) -> Result<Histogram, DeserializeError> {
        let cookie = reader.read_u32::<BigEndian>()?;

        match cookie {
            V2_COOKIE => self.deser_v2(reader, store),
            // wrapped payloads are a framing concern handled outside this crate
            V2_COMPRESSED_COOKIE => Err(DeserializeError::UnsupportedFeature),
            _ => Err(DeserializeError::InvalidCookie),
        }
    }

    #[allow(clippy::float_cmp)]
    fn deser_v2<R: Read>(
        &mut self,
        reader: &mut R,
        store: StoreKind,
    ) -> Result<Histogram, DeserializeError> {
        let payload_len = usize::try_from(reader.read_u32::<BigEndian>()?)
            .map_err(|_| DeserializeError::UsizeTypeTooSmall)?;
        let normalizing_offset = reader.read_u32::<BigEndian>()?;
        if normalizing_offset != 0 {
            return Err(DeserializeError::UnsupportedFeature);
        }
        let num_digits = u8::try_from(reader.read_u32::<BigEndian>()?)
            .map_err(|_| DeserializeError::InvalidParameters)?;
        let low = reader.read_u64::<BigEndian>()?;
        let high = reader.read_u64::<BigEndian>()?;
        let int_double_ratio = reader.read_f64::<BigEndian>()?;
        if int_double_ratio != 1.0 {
            return Err(DeserializeError::UnsupportedFeature);
        }

        let mut h = Histogram::new_with_bounds_and_store(low, high, num_digits, store)
            .map_err(|_| DeserializeError::InvalidParameters)?;

        if payload_len > self.payload_buf.len() {
            self.payload_buf.resize(payload_len, 0);
        }

        reader.read_exact(&mut self.payload_buf[0..payload_len])?;
        let payload_slice: &[u8] = &self.payload_buf[0..payload_len];

        let mut restat_state = RestatState::new();
        let mut dest_index: usize = 0;

        let mut cursor = Cursor::new(payload_slice);
        while cursor.position() < payload_len as u64 {
            let count_or_zeros = zig_zag_decode(varint_read(&mut cursor)?);

            if count_or_zeros < 0 {
                // negation won't overflow: a valid zero run is nowhere near 2^63 long
                let zero_count = usize::try_from(-count_or_zeros)
                    .map_err(|_| DeserializeError::UsizeTypeTooSmall)?;
                // skip the zeros
                dest_index = dest_index
                    .checked_add(zero_count)
                    .ok_or(DeserializeError::UsizeTypeTooSmall)?;
            } else {
                let count = count_or_zeros as u64;
                if count > 0 {
                    if dest_index >= h.distinct_values() {
                        return Err(DeserializeError::EncodedArrayTooLong);
                    }
                    h.set_count_at_index(dest_index, count)
                        .map_err(|_| DeserializeError::UnsuitableCounterType)?;

                    restat_state.on_nonzero_count(dest_index, count);
                }

                dest_index = dest_index
                    .checked_add(1)
                    .ok_or(DeserializeError::UsizeTypeTooSmall)?;
            }
        }

        restat_state.update_histogram(&mut h);

        Ok(h)
    }
}

/// Read a LEB128-64b9B varint: up to 8 bytes of 7 payload bits each, with a set high bit meaning
/// another byte follows, and a full 8-bit 9th byte when the first 8 don't cover the input.
// Only public for testing.
#[doc(hidden)]
pub fn varint_read<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut value = 0_u64;
    for shift in 0..8_u32 {
        let b = reader.read_u8()?;
        value |= u64::from(b & 0x7f) << (7 * shift);
        if b & 0x80 == 0 {
            return Ok(value);
        }
    }
    // special case: the 9th byte is the top 8 bits as is
    let b = reader.read_u8()?;
    Ok(value | u64::from(b) << 56)
}

/// Inverse of zig-zag encoding: 0 to 0, 1 to -1, 2 to 1, 3 to -2, etc.
// Only public for testing.
#[doc(hidden)]
#[inline]
pub fn zig_zag_decode(encoded: u64) -> i64 {
    ((encoded >> 1) as i64) ^ -((encoded & 1) as i64)
}

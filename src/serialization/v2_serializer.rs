use super::{Serializer, V2_COOKIE, V2_HEADER_SIZE};
use crate::Histogram;
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};
use std::{error, fmt};

/// Errors that occur during serialization.
#[derive(Debug)]
pub enum V2SerializeError {
    /// A count above `i64::max_value()` cannot be zig-zag encoded, and therefore cannot be
    /// serialized.
    CountNotSerializable,
    /// Internal calculations cannot be represented in `usize`. Use smaller histograms or beefier
    /// hardware.
    UsizeTypeTooSmall,
    /// An i/o operation failed.
    IoError(io::Error),
}

impl std::convert::From<std::io::Error> for V2SerializeError {
    fn from(e: std::io::Error) -> Self {
        V2SerializeError::IoError(e)
    }
}

impl fmt::Display for V2SerializeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            V2SerializeError::CountNotSerializable => write!(
                f,
                "A count above i64::max_value() cannot be zig-zag encoded"
            ),
            V2SerializeError::UsizeTypeTooSmall => {
                write!(f, "Internal calculations cannot be represented in `usize`")
            }
            V2SerializeError::IoError(e) => write!(f, "An i/o operation failed: {}", e),
        }
    }
}

impl error::Error for V2SerializeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            V2SerializeError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// Serializer for the V2 binary format.
pub struct V2Serializer {
    buf: Vec<u8>,
}

impl Default for V2Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl V2Serializer {
    /// Create a new serializer.
    pub fn new() -> V2Serializer {
        V2Serializer { buf: Vec::new() }
    }
}

impl Serializer for V2Serializer {
    type SerializeError = V2SerializeError;

    fn serialize<W: Write>(
        &mut self,
        h: &Histogram,
        writer: &mut W,
    ) -> Result<usize, V2SerializeError> {
        self.buf.clear();
        let max_size = max_encoded_size(h).ok_or(V2SerializeError::UsizeTypeTooSmall)?;
        self.buf.reserve(max_size);

        self.buf.write_u32::<BigEndian>(V2_COOKIE)?;
        // placeholder for payload length
        self.buf.write_u32::<BigEndian>(0)?;
        // normalizing index offset
        self.buf.write_u32::<BigEndian>(0)?;
        self.buf.write_u32::<BigEndian>(u32::from(h.sigfig()))?;
        self.buf.write_u64::<BigEndian>(h.low())?;
        self.buf.write_u64::<BigEndian>(h.high())?;
        // integer to double conversion ratio
        self.buf.write_f64::<BigEndian>(1.0)?;

        debug_assert_eq!(V2_HEADER_SIZE, self.buf.len());

        self.buf.resize(max_size, 0);

        let counts_len = encode_counts(h, &mut self.buf[V2_HEADER_SIZE..])?;
        // addition is safe as max_size is already a usize
        let total_len = V2_HEADER_SIZE + counts_len;

        // counts_len is always well under 2^32
        (&mut self.buf[4..8]).write_u32::<BigEndian>(counts_len as u32)?;

        writer
            .write_all(&self.buf[0..total_len])
            .map(|_| total_len)
            .map_err(V2SerializeError::IoError)
    }
}

fn max_encoded_size(h: &Histogram) -> Option<usize> {
    let counts_needed = match h.index_for(h.max()) {
        Some(i) => i + 1,
        None => h.distinct_values(),
    };
    // LEB128-64b9B uses at most 9 bytes per count. Won't overflow (except maybe on 16 bit
    // systems): the largest possible counts length is 47 buckets of 2^17 half count each, about
    // 6e6, so the product stays around 5e7.
    counts_needed
        .checked_mul(9)
        .and_then(|x| x.checked_add(V2_HEADER_SIZE))
}

/// Encode the counts array into the slice, which must be at least 9 bytes per count that will be
/// encoded. Returns the number of bytes used.
fn encode_counts(h: &Histogram, buf: &mut [u8]) -> Result<usize, V2SerializeError> {
    let index_limit = match h.index_for(h.max()) {
        Some(i) => i + 1,
        None => h.distinct_values(),
    };
    let mut index = 0;
    let mut bytes_written = 0;

    while index < index_limit {
        let count = h
            .count_at_index(index)
            .expect("index below counts length");
        index += 1;

        // Non-negative numbers are counts for the bin at hand; negative numbers skip that many
        // (absolute value) zero-count bins.
        let mut zero_count = 0_i64;
        if count == 0 {
            zero_count = 1;

            while index < index_limit
                && h.count_at_index(index).expect("index below counts length") == 0
            {
                zero_count += 1;
                index += 1;
            }
        }

        let count_or_zeros: i64 = if zero_count > 1 {
            // a zero run is at most the whole counts array, far below i64 range
            -zero_count
        } else {
            i64::try_from(count).map_err(|_| V2SerializeError::CountNotSerializable)?
        };

        let zz = zig_zag_encode(count_or_zeros);

        // can't exceed the length of `buf`, so no usize overflow
        bytes_written += varint_write(zz, &mut buf[bytes_written..]);
    }

    Ok(bytes_written)
}

/// Write a number as a LEB128-64b9B little endian base 128 varint to `buf`. This is not quite
/// Protobuf's LEB128, which needs up to 10 bytes for 64-bit values: the first 8 bytes each carry
/// 7 bits of input, and the 9th byte, when needed, carries the 8 remaining input bits verbatim.
/// Returns the number of bytes written (in `[1, 9]`).
// Only public for testing.
#[doc(hidden)]
#[inline]
pub fn varint_write(input: u64, buf: &mut [u8]) -> usize {
    let mut value = input;
    let mut used = 0;
    while used < 8 {
        if value >> 7 == 0 {
            // nothing above the low 7 bits remains; this is the last byte
            buf[used] = value as u8;
            return used + 1;
        }
        // set the high bit because more bytes are coming, then the next 7 bits of value
        buf[used] = 0x80 | (value as u8 & 0x7f);
        value >>= 7;
        used += 1;
    }
    // special case: the 9th byte is the remaining top 8 bits, written as is
    buf[8] = value as u8;
    9
}

/// Map signed numbers to unsigned: 0 to 0, -1 to 1, 1 to 2, -2 to 3, etc.
// Only public for testing.
#[doc(hidden)]
#[inline]
pub fn zig_zag_encode(num: i64) -> u64 {
    // If num < 0, num >> 63 is all 1 and vice versa.
    ((num << 1) ^ (num >> 63)) as u64
}

//! Serialization/deserialization support.
//!
//! The V2 format implemented here is a compact, self-describing binary representation of a
//! histogram's full state, compatible with the wider HdrHistogram ecosystem. It is intended for
//! archival or transmission to other systems for further analysis: because the entire counts
//! array travels (not just a few precomputed percentiles), deserialized histograms can be added
//! together and queried at any quantile after the fact. A typical use is to serialize a
//! histogram once a minute, save the blobs, and later sum an hour's worth to compute a correct
//! 99.99th percentile for the whole hour.
//!
//! The payload is a fixed 40-byte big-endian header (format cookie, payload length, normalizing
//! offset, significant digits, lowest and highest trackable value, integer-to-double conversion
//! ratio) followed by the counts as a zig-zag LEB128-64b9B varint stream, where a negative
//! number encodes that many consecutive zero counts. Trailing zeros past the last non-zero
//! count are not written at all, so a sparse histogram with a huge range still serializes
//! small.
//!
//! Serializers and deserializers are meant to be re-used across many histograms; their internal
//! buffers are amortized that way. Both work against any `io::Write`/`io::Read`, and `Vec<u8>` /
//! `&[u8]` are perfectly good implementations of those for in-memory use.
//!
//! Compressed framings (zlib and friends) wrap this format from the outside; the [`Serializer`]
//! trait is the seam such a framing plugs into. This module recognizes the compressed-format
//! cookie and rejects it as unsupported rather than misreading it.
//!
//! # Examples
//!
//! ```
//! use hdrhist::Histogram;
//! use hdrhist::serialization::{Deserializer, Serializer, V2Serializer};
//!
//! let mut h = Histogram::new_with_bounds(1, u64::max_value(), 3).unwrap();
//! h.record_n(42, 7).unwrap();
//!
//! let mut buf = Vec::new();
//! V2Serializer::new().serialize(&h, &mut buf).unwrap();
//!
//! let back = Deserializer::new().deserialize(&mut buf.as_slice()).unwrap();
//! assert_eq!(7, back.count_at(42));
//! assert_eq!(h, back);
//! ```

use std::{fmt, io};

use crate::Histogram;

#[cfg(test)]
mod tests;

mod v2_serializer;
pub use self::v2_serializer::{V2SerializeError, V2Serializer};

mod deserializer;
pub use self::deserializer::{DeserializeError, Deserializer};

const V2_COOKIE_BASE: u32 = 0x1c84_9303;
const V2_COMPRESSED_COOKIE_BASE: u32 = 0x1c84_9304;

// low nibble of the second cookie byte carries the word-size hint used by other implementations
const V2_COOKIE: u32 = V2_COOKIE_BASE | 0x10;
const V2_COMPRESSED_COOKIE: u32 = V2_COMPRESSED_COOKIE_BASE | 0x10;

const V2_HEADER_SIZE: usize = 40;

/// Histogram serializer.
///
/// Different implementations serialize to different formats.
pub trait Serializer {
    /// Error type returned when serialization fails.
    type SerializeError: fmt::Debug;

    /// Serialize the histogram into the provided writer.
    /// Returns the number of bytes written, or an error.
    ///
    /// Note that `Vec<u8>` is a reasonable `Write` implementation for simple usage.
    fn serialize<W: io::Write>(
        &mut self,
        h: &Histogram,
        writer: &mut W,
    ) -> Result<usize, Self::SerializeError>;
}

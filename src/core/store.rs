use crate::core::counter::Counter;

/// Selects the counter storage backing a histogram: a dense array of the given width, or the
/// sparse packed representation.
///
/// Narrow widths shrink the memory footprint of the counts array at the risk of counter overflow
/// when many samples land in one bin; `Packed` keeps 64-bit counters but only allocates the
/// regions of the array that have been touched, trading a constant factor per access for memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Dense 8-bit counters.
    U8,
    /// Dense 16-bit counters.
    U16,
    /// Dense 32-bit counters.
    U32,
    /// Dense 64-bit counters.
    U64,
    /// Sparse 64-bit counters, materialized chunk by chunk on first write.
    Packed,
}

/// A dense counts array of a fixed counter width.
#[derive(Debug, Clone)]
pub(crate) struct DenseStore<T: Counter> {
    counts: Vec<T>,
}

impl<T: Counter> DenseStore<T> {
    fn new(len: usize) -> DenseStore<T> {
        DenseStore {
            counts: vec![T::zero(); len],
        }
    }

    #[inline]
    fn get(&self, index: usize) -> u64 {
        self.counts[index].as_u64()
    }

    /// Add `delta` to the counter at `index`; `Err` when the result does not fit the counter.
    #[inline]
    fn add_to(&mut self, index: usize, delta: u64) -> Result<(), ()> {
        let delta = T::from_u64_exact(delta).ok_or(())?;
        let c = &mut self.counts[index];
        *c = c.checked_add(&delta).ok_or(())?;
        Ok(())
    }

    /// Overwrite the counter at `index`; `Err` when `count` does not fit the counter.
    fn set(&mut self, index: usize, count: u64) -> Result<(), ()> {
        self.counts[index] = T::from_u64_exact(count).ok_or(())?;
        Ok(())
    }

    fn fill_zero(&mut self) {
        for c in self.counts.iter_mut() {
            *c = T::zero();
        }
    }

    fn grow_to(&mut self, new_len: usize) {
        debug_assert!(new_len >= self.counts.len());
        self.counts.resize(new_len, T::zero());
    }
}

/// Counters per packed chunk. One chunk spans 64 counters so a freshly touched region costs
/// 512 bytes, not a whole dense array.
const CHUNK_SHIFT: usize = 6;
const CHUNK_LEN: usize = 1 << CHUNK_SHIFT;
const CHUNK_MASK: usize = CHUNK_LEN - 1;

/// A sparse counts array: a table of fixed-size chunks where untouched chunks stay unallocated
/// and read as zero. Observationally identical to `DenseStore<u64>`.
#[derive(Debug, Clone)]
pub(crate) struct PackedStore {
    len: usize,
    chunks: Vec<Option<Box<[u64; CHUNK_LEN]>>>,
}

impl PackedStore {
    fn new(len: usize) -> PackedStore {
        PackedStore {
            len,
            chunks: Self::empty_chunks(len),
        }
    }

    fn empty_chunks(len: usize) -> Vec<Option<Box<[u64; CHUNK_LEN]>>> {
        let chunk_count = (len + CHUNK_LEN - 1) >> CHUNK_SHIFT;
        let mut chunks = Vec::with_capacity(chunk_count);
        chunks.resize_with(chunk_count, || None);
        chunks
    }

    #[inline]
    fn get(&self, index: usize) -> u64 {
        assert!(index < self.len);
        match &self.chunks[index >> CHUNK_SHIFT] {
            Some(chunk) => chunk[index & CHUNK_MASK],
            None => 0,
        }
    }

    #[inline]
    fn slot(&mut self, index: usize) -> &mut u64 {
        assert!(index < self.len);
        let chunk = self.chunks[index >> CHUNK_SHIFT]
            .get_or_insert_with(|| Box::new([0; CHUNK_LEN]));
        &mut chunk[index & CHUNK_MASK]
    }

    fn add_to(&mut self, index: usize, delta: u64) -> Result<(), ()> {
        let c = self.slot(index);
        *c = c.checked_add(delta).ok_or(())?;
        Ok(())
    }

    fn set(&mut self, index: usize, count: u64) -> Result<(), ()> {
        *self.slot(index) = count;
        Ok(())
    }

    fn fill_zero(&mut self) {
        // dropping the chunks also hands the memory back
        for chunk in self.chunks.iter_mut() {
            *chunk = None;
        }
    }

    fn grow_to(&mut self, new_len: usize) {
        debug_assert!(new_len >= self.len);
        let chunk_count = (new_len + CHUNK_LEN - 1) >> CHUNK_SHIFT;
        self.chunks.resize_with(chunk_count, || None);
        self.len = new_len;
    }
}

/// The counts array behind a histogram, dispatching to the configured backing.
///
/// Indexes are the caller's responsibility: the histogram bounds-checks against `len()` before
/// touching a counter, so an out-of-range index here is a logic error and panics.
#[derive(Debug, Clone)]
pub(crate) enum CountStore {
    U8(DenseStore<u8>),
    U16(DenseStore<u16>),
    U32(DenseStore<u32>),
    U64(DenseStore<u64>),
    Packed(PackedStore),
}

macro_rules! each_store {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            CountStore::U8($s) => $body,
            CountStore::U16($s) => $body,
            CountStore::U32($s) => $body,
            CountStore::U64($s) => $body,
            CountStore::Packed($s) => $body,
        }
    };
}

impl CountStore {
    pub(crate) fn new(kind: StoreKind, len: usize) -> CountStore {
        match kind {
            StoreKind::U8 => CountStore::U8(DenseStore::new(len)),
            StoreKind::U16 => CountStore::U16(DenseStore::new(len)),
            StoreKind::U32 => CountStore::U32(DenseStore::new(len)),
            StoreKind::U64 => CountStore::U64(DenseStore::new(len)),
            StoreKind::Packed => CountStore::Packed(PackedStore::new(len)),
        }
    }

    pub(crate) fn kind(&self) -> StoreKind {
        match self {
            CountStore::U8(_) => StoreKind::U8,
            CountStore::U16(_) => StoreKind::U16,
            CountStore::U32(_) => StoreKind::U32,
            CountStore::U64(_) => StoreKind::U64,
            CountStore::Packed(_) => StoreKind::Packed,
        }
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> u64 {
        each_store!(self, s => s.get(index))
    }

    /// Add `delta` to the counter at `index`; `Err` on counter overflow.
    #[inline]
    pub(crate) fn add_to(&mut self, index: usize, delta: u64) -> Result<(), ()> {
        each_store!(self, s => s.add_to(index, delta))
    }

    /// Overwrite the counter at `index`; `Err` when `count` exceeds the counter width.
    pub(crate) fn set(&mut self, index: usize, count: u64) -> Result<(), ()> {
        each_store!(self, s => s.set(index, count))
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            CountStore::U8(s) => s.counts.len(),
            CountStore::U16(s) => s.counts.len(),
            CountStore::U32(s) => s.counts.len(),
            CountStore::U64(s) => s.counts.len(),
            CountStore::Packed(s) => s.len,
        }
    }

    pub(crate) fn fill_zero(&mut self) {
        each_store!(self, s => s.fill_zero())
    }

    /// Extend to `new_len` counters, preserving existing counts at their indexes.
    pub(crate) fn grow_to(&mut self, new_len: usize) {
        each_store!(self, s => s.grow_to(new_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_u8_overflow_detected() {
        let mut s = DenseStore::<u8>::new(4);
        s.add_to(1, 255).unwrap();
        assert!(s.add_to(1, 1).is_err());
        assert_eq!(255, s.get(1));
    }

    #[test]
    fn dense_narrow_rejects_wide_delta() {
        let mut s = DenseStore::<u16>::new(4);
        assert!(s.add_to(0, 1 << 16).is_err());
        assert_eq!(0, s.get(0));
    }

    #[test]
    fn packed_reads_zero_without_materializing() {
        let s = PackedStore::new(1000);
        assert_eq!(0, s.get(0));
        assert_eq!(0, s.get(999));
        assert!(s.chunks.iter().all(|c| c.is_none()));
    }

    #[test]
    fn packed_materializes_only_touched_chunks() {
        let mut s = PackedStore::new(1000);
        s.add_to(130, 3).unwrap();
        assert_eq!(3, s.get(130));
        assert_eq!(1, s.chunks.iter().filter(|c| c.is_some()).count());
    }

    #[test]
    fn packed_grow_preserves_counts() {
        let mut s = PackedStore::new(100);
        s.add_to(99, 7).unwrap();
        s.grow_to(1000);
        assert_eq!(7, s.get(99));
        assert_eq!(0, s.get(999));
    }

    #[test]
    fn store_fill_zero_resets_all_kinds() {
        for kind in [
            StoreKind::U8,
            StoreKind::U16,
            StoreKind::U32,
            StoreKind::U64,
            StoreKind::Packed,
        ] {
            let mut s = CountStore::new(kind, 64);
            s.add_to(5, 20).unwrap();
            s.fill_zero();
            assert_eq!(0, s.get(5), "{:?}", kind);
        }
    }
}

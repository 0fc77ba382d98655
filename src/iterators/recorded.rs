use crate::iterators::{HistogramIterator, PickMetadata, PickyIterator};
use crate::Histogram;

/// An iterator that will yield only bins with at least one recorded value.
pub struct Iter {
    visited: Option<usize>,
}

impl Iter {
    /// Construct a new recorded-values iterator. See `Histogram::iter_recorded` for details.
    pub fn new(hist: &Histogram) -> HistogramIterator<'_, Iter> {
        HistogramIterator::new(hist, Iter { visited: None })
    }
}

impl PickyIterator for Iter {
    fn pick(&mut self, index: usize, _: u64, count_at_index: u64) -> Option<PickMetadata> {
        // yield each non-empty bin exactly once, even though picked bins are shown again
        if count_at_index != 0 && self.visited.map_or(true, |i| i != index) {
            self.visited = Some(index);
            Some(PickMetadata::new(None))
        } else {
            None
        }
    }

    fn more(&mut self, _: usize) -> bool {
        false
    }
}

use crate::iterators::{HistogramIterator, PickMetadata, PickyIterator};
use crate::Histogram;

/// An iterator that will yield at percentile reporting points through the histogram's range.
pub struct Iter<'a> {
    hist: &'a Histogram,
    ticks_per_half_distance: u32,
    percentile_to_iterate_to: f64,
    reached_end: bool,
}

impl<'a> Iter<'a> {
    /// Construct a new percentile iterator. See `Histogram::iter_percentiles` for details.
    pub fn new(hist: &'a Histogram, ticks_per_half_distance: u32) -> HistogramIterator<'a, Iter<'a>> {
        assert!(
            ticks_per_half_distance > 0,
            "ticks per half distance must be > 0"
        );

        HistogramIterator::new(
            hist,
            Iter {
                hist,
                ticks_per_half_distance,
                percentile_to_iterate_to: 0.0,
                reached_end: false,
            },
        )
    }
}

impl<'a> PickyIterator for Iter<'a> {
    #[allow(clippy::float_cmp)]
    fn pick(&mut self, _: usize, running_total: u64, count_at_index: u64) -> Option<PickMetadata> {
        if count_at_index == 0 {
            return None;
        }

        let current_percentile = 100.0 * running_total as f64 / self.hist.len() as f64;
        if current_percentile < self.percentile_to_iterate_to {
            return None;
        }

        // Iteration always runs until the reporting level reaches 100%, but if the data runs out
        // first (the running total reaches the full count while the reporting level is still
        // short of 100%), the remaining intermediate ticks inside that final bin are skipped and
        // a single 100% point is emitted instead. `more()` drives that jump; `reached_end` stops
        // the re-visits of the final bin after the 100% point has been emitted.
        if self.reached_end {
            return None;
        }

        if self.percentile_to_iterate_to == 100.0 {
            // the tick math below has nothing sensible to do at (or past) 100%
            self.reached_end = true;
            return Some(PickMetadata::new(Some(100.0)));
        }

        // Maintain fixed-size ticks within each "half the distance to 100%": at 50% the distance
        // to 100% has been halved once, at 75% twice, and so on. 2^halvings slices fit in the
        // full range, each ticked on its first half, so doubling once more gives the tick count
        // for the whole range at the current scale.
        let num_halvings = (100.0 / (100.0 - self.percentile_to_iterate_to)).log2() as u32;
        let total_ticks = u64::from(self.ticks_per_half_distance)
            .checked_mul(
                1_u64
                    .checked_shl(num_halvings + 1)
                    .expect("too many halvings"),
            )
            .expect("too many total ticks");
        let increment = 100.0 / total_ticks as f64;

        let metadata = PickMetadata::new(Some(self.percentile_to_iterate_to));

        let sum = self.percentile_to_iterate_to + increment;
        self.percentile_to_iterate_to = if sum == self.percentile_to_iterate_to {
            // the increment no longer moves an f64 just below 100, so jump there directly
            100.0
        } else {
            sum
        };
        Some(metadata)
    }

    fn more(&mut self, _: usize) -> bool {
        // the 100% point has been emitted, or there is no data to emit one for
        if self.reached_end || self.hist.is_empty() {
            return false;
        }

        // The recorded values have run out, but the reporting level is still below 100%: jump to
        // 100% and visit the final bin one more time for the closing point.
        self.percentile_to_iterate_to = 100.0;
        true
    }
}

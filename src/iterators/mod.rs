use crate::Histogram;

/// An iterator that visits percentile reporting points with halving tick distance.
pub mod percentile;

/// An iterator that visits every bin holding a recorded value.
pub mod recorded;

/// The value yielded at each step of a histogram iteration.
#[derive(Debug, PartialEq, Clone)]
pub struct IterationValue {
    value_iterated_to: u64,
    percentile: f64,
    percentile_iterated_to: f64,
    total_count_to_value: u64,
    count_at_value: u64,
    count_since_last_iteration: u64,
}

impl IterationValue {
    /// The highest value equivalent to the bin the iteration has reached.
    pub fn value_iterated_to(&self) -> u64 {
        self.value_iterated_to
    }

    /// Percent of recorded values that are at or below `value_iterated_to`.
    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// The percentile level the iteration was moving toward when it reached this value. For
    /// percentile-tick iteration this is the tick's level; otherwise it matches `percentile`.
    pub fn percentile_iterated_to(&self) -> f64 {
        self.percentile_iterated_to
    }

    /// Total count of recorded values at or below this bin.
    pub fn total_count_to_value(&self) -> u64 {
        self.total_count_to_value
    }

    /// Count of recorded values equivalent to `value_iterated_to`.
    pub fn count_at_value(&self) -> u64 {
        self.count_at_value
    }

    /// Count added since the previously yielded step. Zero when the same bin is visited again
    /// for another reporting point.
    pub fn count_since_last_iteration(&self) -> u64 {
        self.count_since_last_iteration
    }
}

/// Extra state a picker can attach to a picked step.
pub struct PickMetadata {
    /// A picker aiming for specific percentile levels reports the level it was iterating toward,
    /// which can sit well above the percentile of the data actually seen so far.
    percentile_iterated_to: Option<f64>,
}

impl PickMetadata {
    fn new(percentile_iterated_to: Option<f64>) -> PickMetadata {
        PickMetadata {
            percentile_iterated_to,
        }
    }
}

/// Decides which bins an iteration should stop at, and whether it keeps going once all recorded
/// counts have been seen.
pub trait PickyIterator {
    /// Should a value be yielded for the current index? A picked index is visited again before
    /// the iteration moves on, so a picker with several reporting points inside one bin gets to
    /// emit each of them.
    fn pick(&mut self, index: usize, total_count_to_index: u64, count_at_index: u64)
        -> Option<PickMetadata>;
    /// Should iteration continue even though all recorded counts are behind us? Used to emit
    /// trailing reporting points (like the final 100% tick).
    fn more(&mut self, index_to_pick: usize) -> bool;
}

/// `HistogramIterator` provides a base iterator for a `Histogram`.
///
/// It iterates over bins until all recorded counts have been visited, asking its `PickyIterator`
/// at each step whether a value should be yielded. The picker may also extend iteration past the
/// final recorded bin. The iterator holds a borrow of the histogram, so the histogram cannot be
/// mutated (and in particular cannot be resized or reset) while iterating.
pub struct HistogramIterator<'a, P: PickyIterator> {
    hist: &'a Histogram,
    total_count_to_index: u64,
    prev_total_count: u64,
    current_index: usize,
    last_recorded_index: Option<usize>,
    recorded_exhausted: bool,
    fresh: bool,
    ended: bool,
    picker: P,
}

impl<'a, P: PickyIterator> HistogramIterator<'a, P> {
    fn new(hist: &'a Histogram, picker: P) -> HistogramIterator<'a, P> {
        // the bin holding the max value is the last one the data can reach; tracked by index,
        // not by running count, so saturated totals don't end iteration early
        let last_recorded_index = if hist.is_empty() {
            None
        } else {
            hist.index_for(hist.max())
        };
        HistogramIterator {
            hist,
            total_count_to_index: 0,
            prev_total_count: 0,
            current_index: 0,
            last_recorded_index,
            recorded_exhausted: last_recorded_index.is_none(),
            fresh: true,
            ended: false,
            picker,
        }
    }

    fn current(&self, metadata: PickMetadata) -> IterationValue {
        let value = self
            .hist
            .highest_equivalent(self.hist.value_for(self.current_index));
        let percentile = 100.0 * self.total_count_to_index as f64 / self.hist.len() as f64;
        IterationValue {
            value_iterated_to: value,
            percentile,
            percentile_iterated_to: metadata.percentile_iterated_to.unwrap_or(percentile),
            total_count_to_value: self.total_count_to_index,
            count_at_value: self
                .hist
                .count_at_index(self.current_index)
                .expect("current index cannot exceed counts length"),
            count_since_last_iteration: self.total_count_to_index - self.prev_total_count,
        }
    }
}

impl<'a, P: PickyIterator> Iterator for HistogramIterator<'a, P> {
    type Item = IterationValue;

    fn next(&mut self) -> Option<IterationValue> {
        // Iterate over indexes until all the recorded counts have been accounted for, then only
        // as long as the picker wants to keep emitting trailing points. Loop instead of
        // recursing when an index yields nothing.
        while !self.ended {
            if self.current_index == self.hist.distinct_values() {
                self.ended = true;
                return None;
            }

            if self.fresh {
                // count each index toward the running total exactly once, no matter how many
                // times the picker re-visits it
                let count = self
                    .hist
                    .count_at_index(self.current_index)
                    .expect("current index cannot exceed counts length");
                self.total_count_to_index = self.total_count_to_index.saturating_add(count);
                self.fresh = false;
            }

            if self.recorded_exhausted {
                // the bin holding the max value has been yielded, so every recorded count is
                // behind us; does the picker still want trailing reporting points?
                if !self.picker.more(self.current_index) {
                    self.ended = true;
                    return None;
                }
            }

            let count = self
                .hist
                .count_at_index(self.current_index)
                .expect("current index cannot exceed counts length");
            if let Some(metadata) =
                self.picker
                    .pick(self.current_index, self.total_count_to_index, count)
            {
                let val = self.current(metadata);
                // the picked index is shown to the picker again before moving on, so several
                // reporting points can fall inside one bin
                self.prev_total_count = self.total_count_to_index;
                if Some(self.current_index) == self.last_recorded_index {
                    self.recorded_exhausted = true;
                }
                return Some(val);
            }

            self.current_index += 1;
            self.fresh = true;
        }
        None
    }
}

//! `hdrhist` records counts of non-negative integer values across a configurable dynamic range
//! while maintaining a configurable number of significant decimal digits of precision. The
//! resulting "HDR" histogram keeps a fixed memory footprint regardless of how many samples are
//! recorded, records in constant time with no allocation, and answers percentile, mean, and
//! standard deviation queries over the full range. It is built for the value distributions that
//! show up in latency- and size-sensitive services, where extreme outliers matter and per-sample
//! storage or sorting is off the table.
//!
//! For example, a histogram configured to track values between 1 and 3,600,000,000 at 3
//! significant digits resolves 1 microsecond up to 1 millisecond, 1 millisecond (or better) up
//! to one second, and so on up to an hour of microseconds, with quantization error never worse
//! than 0.1% of any value.
//!
//! # Recording samples
//!
//! A histogram is created with one of the `new` constructors. `new` leaves the range open and
//! grows the histogram as needed; `new_with_max` fixes an upper bound (recording beyond it
//! fails rather than reallocating); `new_with_bounds` additionally raises the lowest discernible
//! value, shrinking the allocation when fine resolution near zero is not needed.
//!
//! ```
//! use hdrhist::Histogram;
//!
//! let mut hist = Histogram::new_with_bounds(1, 60 * 60 * 1000, 2).unwrap();
//!
//! // samples are recorded with .record, which errors if the value is out of range
//! hist.record(54_321).expect("value 54321 should be in range");
//!
//! // for ergonomics, samples can also be recorded with +=
//! // this call will panic if the value is out of range!
//! hist += 54_321;
//!
//! // if the measured loop is subject to coordinated omission, the self-correcting
//! // record method backfills the samples the stall swallowed. here the expected
//! // interval between samples is 10:
//! hist.record_correct(54_321, 10).expect("value 54321 should be in range");
//! ```
//!
//! By default counters are dense 64-bit. `new_with_bounds_and_store` selects a narrower dense
//! width (less memory, may overflow and error on pathological bin counts) or the sparse packed
//! store (64-bit counters, memory proportional to the bins actually touched).
//!
//! # Querying
//!
//! ```
//! use hdrhist::Histogram;
//!
//! let mut hist = Histogram::new(3).unwrap();
//! for v in [123, 456, 789] {
//!     hist.record(v).unwrap();
//! }
//! println!("samples: {}", hist.len());
//! println!("p99.9: {}", hist.value_at_percentile(99.9));
//! for iv in hist.iter_recorded() {
//!     println!("{}'th percentile is {} ({} samples)",
//!         iv.percentile(), iv.value_iterated_to(), iv.count_at_value());
//! }
//! ```
//!
//! Histograms can be added to and subtracted from each other, compared, serialized into a
//! compact self-describing binary form (see the [`serialization`] module), and rendered as the
//! classic percentile distribution table with
//! [`output_percentile_distribution`](Histogram::output_percentile_distribution).
//!
//! A histogram is single-writer: recording needs `&mut self`, queries take `&self`. Threads that
//! record concurrently should each keep their own histogram and merge them with
//! [`add`](Histogram::add).

use std::borrow::Borrow;
use std::cmp;
use std::io;
use std::ops::{AddAssign, SubAssign};
use std::sync::atomic::{AtomicU64, Ordering};

mod core;
pub mod errors;
pub mod iterators;
pub mod serialization;

#[cfg(test)]
mod tests;

use crate::core::layout::ValueLayout;
use crate::core::store::CountStore;

pub use crate::core::store::StoreKind;
pub use crate::errors::{AdditionError, CreationError, RecordError, SubtractionError};
pub use crate::iterators::{HistogramIterator, IterationValue};

/// Source of the process-unique identity assigned to each histogram at construction. Opaque: it
/// only distinguishes instances in logs and debugging output.
static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(0);

fn next_identity() -> u64 {
    NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed)
}

/// Unit in the last place of `x`: the gap to the next representable f64 above it. Only meant for
/// the non-negative finite values percentile math produces.
#[inline]
fn ulp(x: f64) -> f64 {
    f64::from_bits(x.to_bits() + 1) - x
}

/// A histogram of `u64` values with configurable range, precision, and counter storage.
#[derive(Debug)]
pub struct Histogram {
    auto_resize: bool,

    lowest_discernible_value: u64,
    highest_trackable_value: u64,
    significant_value_digits: u8,

    pub(crate) bucket_count: u8,
    pub(crate) layout: ValueLayout,

    // encoded to their unit-equivalent range boundaries, see update_max/update_min
    max_value: u64,
    min_non_zero_value: u64,

    total_count: u64,

    start_timestamp_msec: Option<u64>,
    end_timestamp_msec: Option<u64>,

    identity: u64,

    pub(crate) counts: CountStore,
}

// Construction

impl Histogram {
    /// Construct an auto-resizing histogram with a lowest discernible value of 1 and an
    /// auto-adjusting highest trackable value.
    ///
    /// `significant_value_digits` is the number of significant decimal digits to which the
    /// histogram will maintain value resolution and separation. Must be in the range `[0, 5]`.
    pub fn new(significant_value_digits: u8) -> Result<Histogram, CreationError> {
        let mut h = Self::new_with_bounds(1, 2, significant_value_digits)?;
        h.auto_resize = true;
        Ok(h)
    }

    /// Construct a histogram given the highest value to be tracked and a number of significant
    /// decimal digits, with values as low as 1 discernible from 0. Auto-resize is off: recording
    /// never reallocates, and values above `highest_trackable_value` fail instead.
    ///
    /// `highest_trackable_value` must be >= 2.
    pub fn new_with_max(
        highest_trackable_value: u64,
        significant_value_digits: u8,
    ) -> Result<Histogram, CreationError> {
        Self::new_with_bounds(1, highest_trackable_value, significant_value_digits)
    }

    /// Construct a histogram given the lowest and highest values to be tracked and a number of
    /// significant decimal digits.
    ///
    /// Providing a `lowest_discernible_value` above 1 is useful when the histogram's units are
    /// much finer than the accuracy actually needed; e.g. when tracking nanoseconds but caring
    /// about microseconds, a `lowest_discernible_value` of 1000 saves a corresponding amount of
    /// storage. It may be internally rounded down to the nearest power of 2.
    /// `highest_trackable_value` must be at least `2 * lowest_discernible_value`.
    pub fn new_with_bounds(
        lowest_discernible_value: u64,
        highest_trackable_value: u64,
        significant_value_digits: u8,
    ) -> Result<Histogram, CreationError> {
        Self::new_with_bounds_and_store(
            lowest_discernible_value,
            highest_trackable_value,
            significant_value_digits,
            StoreKind::U64,
        )
    }

    /// Construct a histogram as [`new_with_bounds`](Histogram::new_with_bounds) does, backed by
    /// the given counter store.
    pub fn new_with_bounds_and_store(
        lowest_discernible_value: u64,
        highest_trackable_value: u64,
        significant_value_digits: u8,
        store: StoreKind,
    ) -> Result<Histogram, CreationError> {
        if lowest_discernible_value < 1 {
            return Err(CreationError::LowIsZero);
        }
        if lowest_discernible_value > u64::max_value() / 2 {
            // highest_trackable_value must be at least twice as big, and it's a u64
            return Err(CreationError::LowExceedsMax);
        }
        if highest_trackable_value < 2 * lowest_discernible_value {
            return Err(CreationError::HighLessThanTwiceLow);
        }
        if significant_value_digits > 5 {
            return Err(CreationError::SigFigExceedsMax);
        }

        let layout = ValueLayout::new(lowest_discernible_value, significant_value_digits)?;

        let mut h = Histogram {
            auto_resize: false,
            lowest_discernible_value,
            highest_trackable_value,
            significant_value_digits,
            bucket_count: 0, // set by establish_size below
            layout,
            max_value: 0,
            min_non_zero_value: u64::max_value(),
            total_count: 0,
            start_timestamp_msec: None,
            end_timestamp_msec: None,
            identity: next_identity(),
            counts: CountStore::new(store, 0),
        };

        let len = h.establish_size(highest_trackable_value)?;
        h.counts = CountStore::new(store, len);
        Ok(h)
    }

    /// Construct a histogram with the same range settings, store kind, and timestamps as the
    /// source histogram, but no recorded data.
    pub fn new_from(source: &Histogram) -> Histogram {
        let mut h = Self::new_with_bounds_and_store(
            source.lowest_discernible_value,
            source.highest_trackable_value,
            source.significant_value_digits,
            source.counts.kind(),
        )
        .expect("source histogram bounds are already validated");

        h.auto_resize = source.auto_resize;
        h.start_timestamp_msec = source.start_timestamp_msec;
        h.end_timestamp_msec = source.end_timestamp_msec;
        h
    }

    /// Establish `bucket_count` and `highest_trackable_value` for the given range, returning the
    /// required counts array length.
    fn establish_size(&mut self, new_highest_trackable_value: u64) -> Result<usize, CreationError> {
        if new_highest_trackable_value < 2 * self.lowest_discernible_value {
            return Err(CreationError::HighLessThanTwiceLow);
        }

        let buckets_needed = self.layout.buckets_needed_to_cover(new_highest_trackable_value);
        let len = self
            .layout
            .counts_len(buckets_needed)
            .ok_or(CreationError::UsizeTypeTooSmall)?;

        self.bucket_count = buckets_needed;
        self.highest_trackable_value = new_highest_trackable_value;
        Ok(len)
    }

    /// Grow storage to cover `new_highest_trackable_value`. Index meaning is preserved: the
    /// layout constants don't change, only more buckets are appended, so existing counters stay
    /// where they are.
    fn resize(&mut self, new_highest_trackable_value: u64) -> Result<(), CreationError> {
        let len = self.establish_size(new_highest_trackable_value)?;
        self.counts.grow_to(len);
        Ok(())
    }

    /// Control whether the histogram grows (instead of failing the record call) when it sees a
    /// value above its current highest trackable value.
    pub fn set_auto_resize(&mut self, enabled: bool) {
        self.auto_resize = enabled;
    }
}

// Recording

impl Histogram {
    /// Record `value` in the histogram.
    ///
    /// Returns an error if `value` exceeds the highest trackable value and auto-resize is
    /// disabled, or if the value's counter overflows.
    pub fn record(&mut self, value: u64) -> Result<(), RecordError> {
        self.record_count_at_value(1, value)
    }

    /// Record `count` occurrences of `value` in one call.
    ///
    /// Fails like [`record`](Histogram::record).
    pub fn record_n(&mut self, value: u64, count: u64) -> Result<(), RecordError> {
        self.record_count_at_value(count, value)
    }

    /// Record `value`, correcting for coordinated omission.
    ///
    /// When the recorded value is itself larger than `expected_interval` between samples — i.e.
    /// the slow operation prevented faster ones from being measured at all — this backfills the
    /// histogram with an additional series of synthetic samples at `value - expected_interval`,
    /// `value - 2 * expected_interval`, and so on down to the interval.
    ///
    /// This is an at-recording correction, as opposed to the post-recording correction of
    /// [`clone_correct`](Histogram::clone_correct). The two are mutually exclusive: use exactly
    /// one of them for a given data set. An `expected_interval` of 0 disables the correction.
    pub fn record_correct(&mut self, value: u64, expected_interval: u64) -> Result<(), RecordError> {
        self.record_n_correct(value, 1, expected_interval)
    }

    /// Record `count` occurrences of `value`, correcting for coordinated omission as
    /// [`record_correct`](Histogram::record_correct) does.
    pub fn record_n_correct(
        &mut self,
        value: u64,
        count: u64,
        expected_interval: u64,
    ) -> Result<(), RecordError> {
        self.record_count_at_value(count, value)?;
        if expected_interval == 0 || value < expected_interval {
            return Ok(());
        }

        let mut missing_value = value - expected_interval;
        while missing_value >= expected_interval {
            self.record_count_at_value(count, missing_value)?;
            missing_value -= expected_interval;
        }
        Ok(())
    }

    fn record_count_at_value(&mut self, count: u64, value: u64) -> Result<(), RecordError> {
        let index = self.layout.index_for(value);
        if index < self.counts.len() {
            self.counts
                .add_to(index, count)
                .map_err(|_| RecordError::CountOverflow { index, count })?;
        } else {
            if !self.auto_resize {
                return Err(RecordError::ValueOutOfRangeResizeDisabled);
            }
            self.handle_record_exception(count, value)?;
        }

        self.update_min_and_max(value);
        self.total_count = self.total_count.saturating_add(count);
        Ok(())
    }

    /// Grow to cover `value`, then record it.
    fn handle_record_exception(&mut self, count: u64, value: u64) -> Result<(), RecordError> {
        self.resize(value)
            .map_err(|_| RecordError::ResizeFailedUsizeTypeTooSmall)?;

        let index = self.layout.index_for(value);
        self.counts
            .add_to(index, count)
            .map_err(|_| RecordError::CountOverflow { index, count })?;

        self.highest_trackable_value =
            self.layout.highest_equivalent(self.value_for(self.last_index()));
        Ok(())
    }

    fn update_min_and_max(&mut self, value: u64) {
        if value > self.max_value {
            self.update_max(value);
        }
        if value != 0 && value < self.min_non_zero_value {
            self.update_min(value);
        }
    }

    fn update_max(&mut self, value: u64) {
        let internal_value = value | self.layout.unit_magnitude_mask; // max unit-equivalent value
        if internal_value > self.max_value {
            self.max_value = internal_value;
        }
    }

    fn update_min(&mut self, value: u64) {
        if value <= self.layout.unit_magnitude_mask {
            return; // unit-equivalent to 0
        }

        let internal_value = value & !self.layout.unit_magnitude_mask; // min unit-equivalent value
        if internal_value < self.min_non_zero_value {
            self.min_non_zero_value = internal_value;
        }
    }

    /// Reset the contents of the histogram, preserving its configuration.
    pub fn reset(&mut self) {
        self.counts.fill_zero();
        self.total_count = 0;
        self.max_value = 0;
        self.min_non_zero_value = u64::max_value();
    }
}

// Merging

impl Histogram {
    /// Add the contents of another histogram to this one.
    ///
    /// The timestamp range of this histogram widens to cover the other histogram's. Fails when
    /// the other histogram holds values that do not fit in this one's range (with auto-resize
    /// disabled), or when a counter cannot hold a combined count; in the latter case earlier
    /// bins may already have been added.
    pub fn add<B: Borrow<Histogram>>(&mut self, source: B) -> Result<(), AdditionError> {
        let source = source.borrow();

        // make sure this histogram can take the values in source
        let top = self.layout.highest_equivalent(self.value_for(self.last_index()));
        if top < source.max() {
            if !self.auto_resize {
                return Err(AdditionError::OtherAddendValueExceedsRange);
            }
            self.resize(source.max())
                .map_err(|_| AdditionError::ResizeFailedUsizeTypeTooSmall)?;
            self.highest_trackable_value =
                self.layout.highest_equivalent(self.value_for(self.last_index()));
        }

        if self.bucket_count == source.bucket_count
            && self.layout.sub_bucket_count == source.layout.sub_bucket_count
            && self.layout.unit_magnitude == source.layout.unit_magnitude
        {
            // Counts arrays are of the same length and meaning, so the counters can be added
            // pairwise by index:
            let mut observed_other_total = 0_u64;
            for i in 0..source.counts.len() {
                let other_count = source.counts.get(i);
                if other_count != 0 {
                    self.counts.add_to(i, other_count).map_err(|_| {
                        AdditionError::CountOverflow {
                            index: i,
                            count: other_count,
                        }
                    })?;
                    observed_other_total = observed_other_total.saturating_add(other_count);
                }
            }

            self.total_count = self.total_count.saturating_add(observed_other_total);
            let mx = source.max();
            if mx > self.max() {
                self.update_max(mx);
            }
            let mn = source.min_nz();
            if mn < self.min_nz() {
                self.update_min(mn);
            }
        } else {
            // Arrays don't line up, so each of the source's non-zero values is re-located
            // through this histogram's own layout:
            for i in 0..source.counts.len() {
                let other_count = source.counts.get(i);
                if other_count != 0 {
                    self.record_n(source.value_for(i), other_count)
                        .map_err(|e| match e {
                            RecordError::ValueOutOfRangeResizeDisabled => {
                                AdditionError::OtherAddendValueExceedsRange
                            }
                            RecordError::ResizeFailedUsizeTypeTooSmall => {
                                AdditionError::ResizeFailedUsizeTypeTooSmall
                            }
                            RecordError::CountOverflow { index, count } => {
                                AdditionError::CountOverflow { index, count }
                            }
                        })?;
                }
            }
        }

        // widen the timestamp range to cover both histograms
        self.start_timestamp_msec = match (self.start_timestamp_msec, source.start_timestamp_msec)
        {
            (Some(a), Some(b)) => Some(cmp::min(a, b)),
            (a, b) => a.or(b),
        };
        self.end_timestamp_msec = match (self.end_timestamp_msec, source.end_timestamp_msec) {
            (Some(a), Some(b)) => Some(cmp::max(a, b)),
            (a, b) => a.or(b),
        };
        Ok(())
    }

    /// Add the contents of another histogram to this one while correcting for coordinated
    /// omission, as if the other histogram's values had been recorded with
    /// [`record_n_correct`](Histogram::record_n_correct).
    pub fn add_correct<B: Borrow<Histogram>>(
        &mut self,
        source: B,
        expected_interval: u64,
    ) -> Result<(), RecordError> {
        let source = source.borrow();
        for iv in source.iter_recorded() {
            self.record_n_correct(iv.value_iterated_to(), iv.count_at_value(), expected_interval)?;
        }
        Ok(())
    }

    /// Subtract the contents of another histogram from this one.
    ///
    /// Fails when the other histogram holds values outside this one's range, or when any count
    /// would go negative; counts are never clamped. A count failure is detected as it occurs, so
    /// earlier bins may already have been subtracted.
    pub fn subtract<B: Borrow<Histogram>>(
        &mut self,
        subtrahend: B,
    ) -> Result<(), SubtractionError> {
        let subtrahend = subtrahend.borrow();

        // growing to "cover" values we are about to remove makes no sense, so auto-resize does
        // not apply here
        let top = self.layout.highest_equivalent(self.value_for(self.last_index()));
        if top < subtrahend.max() {
            return Err(SubtractionError::SubtrahendValueExceedsMinuendRange);
        }

        for i in 0..subtrahend.counts.len() {
            let other_count = subtrahend.counts.get(i);
            if other_count != 0 {
                let value = subtrahend.value_for(i);
                let index = self.layout.index_for(value);
                let current = self.counts.get(index);
                if current < other_count {
                    return Err(SubtractionError::SubtrahendCountExceedsMinuendCount);
                }
                self.counts
                    .set(index, current - other_count)
                    .expect("a reduced count always fits the counter");
                self.total_count -= other_count;
            }
        }

        // the cached extrema may just have been removed
        if self.count_at(self.max()) == 0 || self.count_at(self.min_nz()) == 0 {
            self.restat();
        }
        Ok(())
    }

    /// Get a copy of this histogram, corrected for coordinated omission: for each recorded count
    /// larger than `expected_interval`, the copy also receives the series of synthetic samples
    /// that [`record_correct`](Histogram::record_correct) would have produced.
    ///
    /// This is a post-correction method; it and the at-recording correction are mutually
    /// exclusive for a given data set.
    pub fn clone_correct(&self, expected_interval: u64) -> Histogram {
        let mut h = Histogram::new_from(self);
        for iv in self.iter_recorded() {
            h.record_n_correct(iv.value_iterated_to(), iv.count_at_value(), expected_interval)
                .expect("same configuration, so the copy must accept every value");
        }
        h
    }

    /// Recompute total count, max, and min-non-zero from the counters.
    fn restat(&mut self) {
        let mut state = RestatState::new();
        for i in 0..self.counts.len() {
            let count = self.counts.get(i);
            if count != 0 {
                state.on_nonzero_count(i, count);
            }
        }
        state.update_histogram(self);
    }
}

// Accessors and equivalence helpers

impl Histogram {
    /// Total number of samples recorded.
    pub fn len(&self) -> u64 {
        self.total_count
    }

    /// `true` when no samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    /// Number of distinct counters in the histogram (the counts array length).
    pub fn distinct_values(&self) -> usize {
        self.counts.len()
    }

    /// Number of buckets currently allocated.
    pub fn buckets(&self) -> u8 {
        self.bucket_count
    }

    /// The configured lowest discernible value.
    pub fn low(&self) -> u64 {
        self.lowest_discernible_value
    }

    /// The current highest trackable value.
    pub fn high(&self) -> u64 {
        self.highest_trackable_value
    }

    /// The configured number of significant decimal digits.
    pub fn sigfig(&self) -> u8 {
        self.significant_value_digits
    }

    /// The counter store backing this histogram.
    pub fn store_kind(&self) -> StoreKind {
        self.counts.kind()
    }

    /// Process-unique identity assigned at construction. Only distinguishes instances; carries
    /// no other meaning.
    pub fn identity(&self) -> u64 {
        self.identity
    }

    /// Opaque start-of-interval tag in milliseconds, if one has been set.
    pub fn start_timestamp_msec(&self) -> Option<u64> {
        self.start_timestamp_msec
    }

    /// Tag this histogram with the start of its recording interval.
    pub fn set_start_timestamp_msec(&mut self, msec: u64) {
        self.start_timestamp_msec = Some(msec);
    }

    /// Opaque end-of-interval tag in milliseconds, if one has been set.
    pub fn end_timestamp_msec(&self) -> Option<u64> {
        self.end_timestamp_msec
    }

    /// Tag this histogram with the end of its recording interval.
    pub fn set_end_timestamp_msec(&mut self, msec: u64) {
        self.end_timestamp_msec = Some(msec);
    }

    /// The lowest recorded value, or 0 if none have been recorded.
    pub fn min(&self) -> u64 {
        if self.total_count == 0 || self.counts.get(0) != 0 {
            0
        } else {
            self.min_nz()
        }
    }

    /// The lowest recorded non-zero value, or `u64::max_value()` if none have been recorded.
    pub fn min_nz(&self) -> u64 {
        if self.min_non_zero_value == u64::max_value() {
            u64::max_value()
        } else {
            self.layout.lowest_equivalent(self.min_non_zero_value)
        }
    }

    /// The highest recorded value, or 0 if none have been recorded.
    pub fn max(&self) -> u64 {
        if self.max_value == 0 {
            0
        } else {
            self.layout.highest_equivalent(self.max_value)
        }
    }

    /// The lowest value equivalent to the given value, i.e. the smallest value sharing its
    /// counter.
    pub fn lowest_equivalent(&self, value: u64) -> u64 {
        self.layout.lowest_equivalent(value)
    }

    /// The highest value equivalent to the given value, i.e. the largest value sharing its
    /// counter.
    pub fn highest_equivalent(&self, value: u64) -> u64 {
        self.layout.highest_equivalent(value)
    }

    /// A value in the middle (rounded up) of the range of values equivalent to the given value.
    pub fn median_equivalent(&self, value: u64) -> u64 {
        self.layout.median_equivalent(value)
    }

    /// The first value past the given value's equivalent range.
    pub fn next_non_equivalent(&self, value: u64) -> u64 {
        self.layout.next_non_equivalent(value)
    }

    /// The size (in value units) of the range of values equivalent to the given value.
    pub fn equivalent_range(&self, value: u64) -> u64 {
        self.layout.equivalent_range(value)
    }

    /// Whether the two values share a counter at this histogram's resolution.
    pub fn equivalent(&self, value1: u64, value2: u64) -> bool {
        self.layout.lowest_equivalent(value1) == self.layout.lowest_equivalent(value2)
    }

    /// The value at the start of the range counted by the counter at `index`.
    pub fn value_for(&self, index: usize) -> u64 {
        self.layout.value_for(index)
    }

    /// The count in the counter at `index`, or `None` past the end of the array.
    pub fn count_at_index(&self, index: usize) -> Option<u64> {
        if index < self.counts.len() {
            Some(self.counts.get(index))
        } else {
            None
        }
    }

    /// The count of recorded values equivalent to `value`.
    pub fn count_at(&self, value: u64) -> u64 {
        let index = cmp::min(self.layout.index_for(value), self.last_index());
        self.counts.get(index)
    }

    /// The total count of recorded values between `low` and `high` inclusive, both rounded out
    /// to their equivalent ranges.
    pub fn count_between(&self, low: u64, high: u64) -> u64 {
        let low_index = self.layout.index_for(low);
        let high_index = cmp::min(self.layout.index_for(high), self.last_index());
        (low_index..=high_index).fold(0_u64, |t, i| t.saturating_add(self.counts.get(i)))
    }

    /// Index for `value` in this histogram's counts array, or `None` when the value is beyond
    /// the buckets currently allocated.
    pub(crate) fn index_for(&self, value: u64) -> Option<usize> {
        let index = self.layout.index_for(value);
        if index < self.counts.len() {
            Some(index)
        } else {
            None
        }
    }

    fn last_index(&self) -> usize {
        self.counts.len() - 1
    }

    /// Overwrite the counter at `index` directly. The caller is responsible for restating the
    /// aggregates afterwards.
    pub(crate) fn set_count_at_index(&mut self, index: usize, count: u64) -> Result<(), ()> {
        debug_assert!(index < self.counts.len());
        self.counts.set(index, count)
    }
}

// Statistics

impl Histogram {
    /// The computed mean of all recorded values, using each counter's median equivalent value.
    pub fn mean(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }

        self.iter_recorded().fold(0.0_f64, |total, iv| {
            total
                + self.layout.median_equivalent(iv.value_iterated_to()) as f64
                    * iv.count_at_value() as f64
                    / self.total_count as f64
        })
    }

    /// The computed (population) standard deviation of all recorded values.
    pub fn stdev(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }

        let mean = self.mean();
        let geom_dev_tot = self.iter_recorded().fold(0.0_f64, |gdt, iv| {
            let dev = self.layout.median_equivalent(iv.value_iterated_to()) as f64 - mean;
            gdt + (dev * dev) * iv.count_at_value() as f64
        });

        (geom_dev_tot / self.total_count as f64).sqrt()
    }

    /// The value at the given percentile, clamped to `[0, 100]`.
    ///
    /// For a percentile above 0 this is the value that the given percentage of the recorded
    /// samples are smaller than or equivalent to; for percentile 0 it is the value all samples
    /// are larger than or equivalent to. Returns 0 for an empty histogram.
    pub fn value_at_percentile(&self, percentile: f64) -> u64 {
        let percentile = percentile.clamp(0.0, 100.0);
        let fractional_count = (percentile / 100.0) * self.total_count as f64;
        // shave an ulp before rounding up: an exact bin boundary must not get pushed into the
        // next bin by the double rounding in the line above
        let count_at_percentile =
            cmp::max((fractional_count - ulp(fractional_count)).ceil() as u64, 1);

        let mut total_to_current_index = 0_u64;
        for i in 0..self.counts.len() {
            total_to_current_index = total_to_current_index.saturating_add(self.counts.get(i));
            if total_to_current_index >= count_at_percentile {
                let value_at_index = self.layout.value_for(i);
                return if percentile == 0.0 {
                    self.layout.lowest_equivalent(value_at_index)
                } else {
                    self.layout.highest_equivalent(value_at_index)
                };
            }
        }

        0
    }

    /// The value at the given quantile, clamped to `[0, 1]`. See
    /// [`value_at_percentile`](Histogram::value_at_percentile).
    pub fn value_at_quantile(&self, quantile: f64) -> u64 {
        self.value_at_percentile(quantile * 100.0)
    }

    /// The percentile of recorded values that are smaller than or equivalent to `value`.
    /// Returns 100.0 for an empty histogram.
    pub fn percentile_below(&self, value: u64) -> f64 {
        if self.total_count == 0 {
            return 100.0;
        }

        let target_index = cmp::min(self.layout.index_for(value), self.last_index());
        let total_to_current_index =
            (0..=target_index).fold(0_u64, |t, i| t.saturating_add(self.counts.get(i)));
        100.0 * total_to_current_index as f64 / self.total_count as f64
    }
}

// Iteration

impl Histogram {
    /// Iterate through histogram values at percentile reporting levels. Iteration starts at 0%
    /// and reduces its distance to 100% with each tick, the tick size halving every
    /// `ticks_per_half_distance` steps, until all recorded values are exhausted and a final 100%
    /// point has been emitted.
    pub fn iter_percentiles(
        &self,
        ticks_per_half_distance: u32,
    ) -> HistogramIterator<'_, iterators::percentile::Iter<'_>> {
        iterators::percentile::Iter::new(self, ticks_per_half_distance)
    }

    /// Iterate through all bins with a non-zero count, at the finest granularity the histogram
    /// supports.
    pub fn iter_recorded(&self) -> HistogramIterator<'_, iterators::recorded::Iter> {
        iterators::recorded::Iter::new(self)
    }

    /// Write the classic percentile distribution report: one line per percentile reporting
    /// point with columns `Value Percentile TotalCount 1/(1-Percentile)`, followed by a summary
    /// trailer. Reported values are divided by `value_scale` (pass 1.0 to report raw values,
    /// 1000.0 to report recorded nanoseconds as microseconds, and so on).
    pub fn output_percentile_distribution<W: io::Write>(
        &self,
        writer: &mut W,
        ticks_per_half_distance: u32,
        value_scale: f64,
    ) -> io::Result<()> {
        writeln!(
            writer,
            "{:>12} {:>14} {:>10} {:>14}\n",
            "Value", "Percentile", "TotalCount", "1/(1-Percentile)"
        )?;

        let prec = usize::from(self.significant_value_digits);
        for iv in self.iter_percentiles(ticks_per_half_distance) {
            let value = iv.value_iterated_to() as f64 / value_scale;
            let fraction = iv.percentile_iterated_to() / 100.0;
            if iv.percentile_iterated_to() == 100.0 {
                // the final point has no meaningful 1/(1-p)
                writeln!(
                    writer,
                    "{:>12.prec$} {:>2.12} {:>10}",
                    value,
                    fraction,
                    iv.total_count_to_value(),
                    prec = prec
                )?;
            } else {
                writeln!(
                    writer,
                    "{:>12.prec$} {:>2.12} {:>10} {:>14.2}",
                    value,
                    fraction,
                    iv.total_count_to_value(),
                    1.0 / (1.0 - fraction),
                    prec = prec
                )?;
            }
        }

        writeln!(
            writer,
            "#[Mean    = {:>12.prec$}, StdDeviation   = {:>12.prec$}]",
            self.mean() / value_scale,
            self.stdev() / value_scale,
            prec = prec
        )?;
        writeln!(
            writer,
            "#[Max     = {:>12.prec$}, Total count    = {:>12}]",
            self.max() as f64 / value_scale,
            self.total_count,
            prec = prec
        )?;
        writeln!(
            writer,
            "#[Buckets = {:>12}, SubBuckets     = {:>12}]",
            self.bucket_count, self.layout.sub_bucket_count
        )?;
        Ok(())
    }
}

/// Carries the aggregate state re-derived while scanning a freshly filled counts array (after
/// deserialization, or after a subtraction removed the cached extrema). Feed it each non-zero
/// count in index order, then apply it.
pub(crate) struct RestatState {
    max_index: Option<usize>,
    min_non_zero_index: Option<usize>,
    total_count: u64,
}

impl RestatState {
    pub(crate) fn new() -> RestatState {
        RestatState {
            max_index: None,
            min_non_zero_index: None,
            total_count: 0,
        }
    }

    #[inline]
    pub(crate) fn on_nonzero_count(&mut self, index: usize, count: u64) {
        self.total_count = self.total_count.saturating_add(count);
        self.max_index = Some(index);
        // index 0 holds values unit-equivalent to 0, which don't qualify as a non-zero minimum
        if self.min_non_zero_index.is_none() && index != 0 {
            self.min_non_zero_index = Some(index);
        }
    }

    pub(crate) fn update_histogram(self, h: &mut Histogram) {
        h.max_value = 0;
        h.min_non_zero_value = u64::max_value();
        if let Some(i) = self.max_index {
            let max = h.layout.highest_equivalent(h.value_for(i));
            h.update_max(max);
        }
        if let Some(i) = self.min_non_zero_index {
            h.update_min(h.value_for(i));
        }
        h.total_count = self.total_count;
    }
}

// Comparison and cloning

impl PartialEq for Histogram {
    fn eq(&self, other: &Histogram) -> bool {
        if self.lowest_discernible_value != other.lowest_discernible_value
            || self.significant_value_digits != other.significant_value_digits
        {
            return false;
        }
        if self.total_count != other.total_count {
            return false;
        }
        if self.max() != other.max() {
            return false;
        }
        if self.min_nz() != other.min_nz() {
            return false;
        }

        // one side may have resized further than the other; any surplus must be empty
        let common = cmp::min(self.counts.len(), other.counts.len());
        (0..common).all(|i| self.counts.get(i) == other.counts.get(i))
            && (common..self.counts.len()).all(|i| self.counts.get(i) == 0)
            && (common..other.counts.len()).all(|i| other.counts.get(i) == 0)
    }
}

impl Clone for Histogram {
    fn clone(&self) -> Histogram {
        let mut h = Histogram::new_from(self);
        h.add(self)
            .expect("histograms with the same configuration always fit each other");
        h
    }
}

// Operator sugar

impl AddAssign<u64> for Histogram {
    /// Record a value. Panics where [`record`](Histogram::record) would error.
    fn add_assign(&mut self, value: u64) {
        self.record(value).unwrap();
    }
}

impl<'a> AddAssign<&'a Histogram> for Histogram {
    /// Add another histogram. Panics where [`add`](Histogram::add) would error.
    fn add_assign(&mut self, source: &'a Histogram) {
        self.add(source).unwrap();
    }
}

impl<'a> SubAssign<&'a Histogram> for Histogram {
    /// Subtract another histogram. Panics where [`subtract`](Histogram::subtract) would error.
    fn sub_assign(&mut self, subtrahend: &'a Histogram) {
        self.subtract(subtrahend).unwrap();
    }
}

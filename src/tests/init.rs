use crate::tests::helpers::histo;
use crate::{CreationError, Histogram};

#[test]
fn layout_zero_digits_smallest_config() {
    let h = histo(1, 2, 0);

    // single unit resolution up to 2 * 10^0, already a power of two
    assert_eq!(2, h.layout.sub_bucket_count);
    assert_eq!(1, h.layout.sub_bucket_half_count);
    assert_eq!(0, h.layout.sub_bucket_half_count_magnitude);
    assert_eq!(1, h.layout.sub_bucket_mask);

    assert_eq!(0, h.layout.unit_magnitude);
    assert_eq!(0, h.layout.unit_magnitude_mask);

    // both halves of bucket 0, plus the top half of bucket 1 to reach 2
    assert_eq!(2, h.bucket_count);
    assert_eq!(3, h.counts.len());

    // the largest value in bucket 0 is a 1-bit number
    assert_eq!(63, h.layout.leading_zero_count_base);
}

#[test]
fn layout_one_digit() {
    let h = histo(1, 100_000, 1);

    // 2 * 10^1 = 20 slots round up to 32
    assert_eq!(32, h.layout.sub_bucket_count);
    assert_eq!(16, h.layout.sub_bucket_half_count);
    assert_eq!(4, h.layout.sub_bucket_half_count_magnitude);
    assert_eq!(31, h.layout.sub_bucket_mask);

    // bucket k tops out at 32 * 2^k; 32 << 12 is the first span past 100_000
    assert_eq!(13, h.bucket_count);
    assert_eq!(14 * 16, h.counts.len());

    assert_eq!(59, h.layout.leading_zero_count_base);
}

#[test]
fn layout_three_digits_hour_of_micros() {
    let h = histo(1, 3_600_000_000, 3);

    // 2 * 10^3 = 2000 slots round up to 2048
    assert_eq!(2048, h.layout.sub_bucket_count);
    assert_eq!(10, h.layout.sub_bucket_half_count_magnitude);
    assert_eq!(2047, h.layout.sub_bucket_mask);

    // 2048 << 21 = 2^32 is the first span past 3.6e9
    assert_eq!(22, h.bucket_count);
    assert_eq!(23 * 1024, h.counts.len());

    assert_eq!(53, h.layout.leading_zero_count_base);
}

#[test]
fn layout_four_digits_full_u64_range() {
    let h = histo(1, u64::max_value(), 4);

    // 2 * 10^4 = 20_000 slots round up to 2^15
    assert_eq!(1 << 15, h.layout.sub_bucket_count);
    assert_eq!(1 << 14, h.layout.sub_bucket_half_count);

    // straight doubling stops at the bucket spanning 2^63; one more is added for the span
    // that would overflow, and it runs to the u64 ceiling
    assert_eq!(50, h.bucket_count);
    assert_eq!(51 << 14, h.counts.len());

    assert_eq!(49, h.layout.leading_zero_count_base);
}

#[test]
fn unit_magnitude_rounds_low_down_to_power_of_two() {
    // 64 <= 100 < 128
    let h = histo(100, 1 << 30, 3);
    assert_eq!(6, h.layout.unit_magnitude);
    assert_eq!(63, h.layout.unit_magnitude_mask);

    // an exact power of two keeps its own magnitude
    let h = histo(64, 1 << 30, 3);
    assert_eq!(6, h.layout.unit_magnitude);
    assert_eq!(63, h.layout.unit_magnitude_mask);
}

#[test]
fn unit_magnitude_shifts_whole_layout_up() {
    let h = histo(1 << 12, 1 << 30, 2);

    assert_eq!(256, h.layout.sub_bucket_count);
    assert_eq!(12, h.layout.unit_magnitude);
    assert_eq!(0xFFF, h.layout.unit_magnitude_mask);
    // the sub bucket mask sits above the unit bits
    assert_eq!(0xFF << 12, h.layout.sub_bucket_mask);

    // bucket 0 spans 256 units of 2^12 = 2^20; bucket 11 is the first to exceed 2^30
    assert_eq!(12, h.bucket_count);
    assert_eq!(13 * 128, h.counts.len());

    assert_eq!(64 - 12 - 7 - 1, h.layout.leading_zero_count_base);
}

#[test]
fn precision_beyond_low_magnitude_is_rejected() {
    // unit magnitude 60 plus 8 sub bucket bits would need a 68-bit value space
    assert_eq!(
        CreationError::CannotRepresentSigFigBeyondLow,
        Histogram::new_with_bounds(1 << 60, u64::max_value(), 2).unwrap_err()
    );

    // 54 + 8 = 62 still fits
    assert!(Histogram::new_with_bounds(1 << 54, u64::max_value(), 2).is_ok());
}

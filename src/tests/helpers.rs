use crate::Histogram;

pub fn histo(
    lowest_discernible_value: u64,
    highest_trackable_value: u64,
    num_significant_digits: u8,
) -> Histogram {
    Histogram::new_with_bounds(
        lowest_discernible_value,
        highest_trackable_value,
        num_significant_digits,
    )
    .unwrap()
}

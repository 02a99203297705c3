pub fn max_of_2<T: PartialOrd + Copy>(first: T, second: T) -> T {
    if first > second {
        first
    } else {
        second
    }
}

/// Largest value in a series, never below `floor`. NaN values are ignored.
pub fn max_of_series(values: &[f64], floor: f64) -> f64 {
    values
        .iter()
        .copied()
        .filter(|value| !value.is_nan())
        .fold(floor, max_of_2)
}

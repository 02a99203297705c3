// location for numeric helpers and checks shared across the building, district and plant modules

use thiserror::Error;

/// Divide `numerator` by `denominator`, returning `fallback` when the denominator is zero.
///
/// Every degenerate no-flow case in the network model goes through here, so that the fallback
/// value for that case is visible at the call site rather than emerging as a NaN or infinity.
pub fn divide_or(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if denominator == 0. {
        fallback
    } else {
        numerator / denominator
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("length mismatch: series '{series}' has {actual} values but {expected} were expected")]
pub struct SeriesLengthError {
    pub series: String,
    pub expected: usize,
    pub actual: usize,
}

/// Check that an hourly series has the expected number of values.
pub fn check_series_length<T>(
    series: &str,
    values: &[T],
    expected: usize,
) -> Result<(), SeriesLengthError> {
    if values.len() != expected {
        return Err(SeriesLengthError {
            series: series.to_string(),
            expected,
            actual: values.len(),
        });
    }

    Ok(())
}

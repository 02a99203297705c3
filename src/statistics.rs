/// A simple statistics module with some utility functions such as calculation of percentiles.
use statrs::statistics::{Data, Distribution, Max, OrderStatistics};

pub fn percentile(numbers: &[f64], percentile: usize) -> f64 {
    let numbers = numbers.to_vec();
    let mut data = Data::new(numbers);

    data.percentile(percentile)
}

/// Peak, mean, 95th percentile and total of an hourly series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesSummary {
    pub peak: f64,
    pub mean: f64,
    pub percentile_95: f64,
    pub total: f64,
}

/// Summarise a series, or None for an empty series.
pub fn summarise(numbers: &[f64]) -> Option<SeriesSummary> {
    if numbers.is_empty() {
        return None;
    }
    let data = Data::new(numbers.to_vec());

    Some(SeriesSummary {
        peak: data.max(),
        mean: data.mean()?,
        percentile_95: percentile(numbers, 95),
        total: numbers.iter().sum(),
    })
}

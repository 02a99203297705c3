#![allow(clippy::too_many_arguments)]

mod compare_floats;
pub mod core;
pub mod corpus;
pub mod errors;
pub mod input;
pub mod output;
pub mod simulation_time;
mod statistics;

pub use crate::corpus::RunResults;
use crate::core::schedule::ScheduleTable;
use crate::core::plant::load_shift::day_totals;
use crate::corpus::Corpus;
use crate::errors::{DistrictCoreError, DistrictError, OutputError};
use crate::input::ingest_for_processing;
use crate::output::Output;
use crate::statistics::summarise;
use bitflags::bitflags;
use csv::WriterBuilder;
use itertools::Itertools;
use serde::Serialize;
use std::io::Read;
use tracing::{debug, info};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ProjectFlags: u32 {
        /// Write an hourly results file for every building.
        const BUILDING_RESULTS = 0b1;
        /// Report only the load shift columns for the central plant, even when plant telemetry
        /// is given.
        const SKIP_PLANT_BALANCE = 0b10;
    }
}

/// Run a district project from JSON input, write its result tables to `output` and return them.
///
/// Arguments:
/// * `input` - the project JSON
/// * `output` - where result tables are written
/// * `hot_tank_schedule` - hot tank charging schedule overriding the one in the project, if any
/// * `cold_tank_schedule` - cold tank charging schedule overriding the one in the project, if any
/// * `flags` - project flags
pub fn run_project(
    input: impl Read,
    output: impl Output,
    hot_tank_schedule: Option<ScheduleTable>,
    cold_tank_schedule: Option<ScheduleTable>,
    flags: &ProjectFlags,
) -> Result<RunResults, DistrictError> {
    let input = ingest_for_processing(input)?;

    let corpus = Corpus::from_inputs(input, hot_tank_schedule, cold_tank_schedule, flags)?;

    let results = corpus.run().map_err(DistrictCoreError::new)?;

    if !output.is_noop() {
        write_outputs(&output, &results, flags)
            .map_err(|e| DistrictError::FailureWritingOutput(OutputError::new(e)))?;
    }

    Ok(results)
}

fn write_outputs(
    output: &impl Output,
    results: &RunResults,
    flags: &ProjectFlags,
) -> anyhow::Result<()> {
    if flags.contains(ProjectFlags::BUILDING_RESULTS) {
        for (id, building_results) in &results.buildings {
            write_table(output, &format!("buildings_{id}"), building_results)?;
        }
    }
    write_table(output, "district", &results.district)?;
    match &results.cup {
        Some(cup) => write_table(output, "cup", cup)?,
        None => write_table(output, "cup", &results.load_shift)?,
    }
    write_table(output, "summary", &summary_rows(results))?;

    Ok(())
}

fn write_table<T: Serialize>(
    output: &impl Output,
    location_key: &str,
    rows: &[T],
) -> anyhow::Result<()> {
    info!("writing out to {location_key}");
    let writer = output.writer_for_location_key(location_key)?;
    let mut writer = WriterBuilder::new().from_writer(writer);

    for row in rows {
        writer.serialize(row)?;
    }

    debug!(rows = rows.len(), "flushing out CSV");
    writer.flush()?;

    Ok(())
}

/// One line of the annual summary. Counts carry only a total.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Peak")]
    pub peak: Option<f64>,
    #[serde(rename = "Mean")]
    pub mean: Option<f64>,
    #[serde(rename = "95th Percentile")]
    pub percentile_95: Option<f64>,
    #[serde(rename = "Total")]
    pub total: f64,
}

impl SummaryRow {
    fn for_series(metric: &str, values: &[f64]) -> Option<Self> {
        summarise(values).map(|summary| Self {
            metric: metric.to_string(),
            peak: Some(summary.peak),
            mean: Some(summary.mean),
            percentile_95: Some(summary.percentile_95),
            total: summary.total,
        })
    }

    fn for_count(metric: &str, count: usize) -> Self {
        Self {
            metric: metric.to_string(),
            peak: None,
            mean: None,
            percentile_95: None,
            total: count as f64,
        }
    }
}

/// Annual statistics of the district loads, the daily load totals and, when the plant was
/// balanced, the plant shortfalls.
pub fn summary_rows(results: &RunResults) -> Vec<SummaryRow> {
    let heating = results
        .district
        .iter()
        .map(|hour| hour.total_heating_load)
        .collect_vec();
    let cooling = results
        .district
        .iter()
        .map(|hour| hour.total_cooling_load)
        .collect_vec();

    // calendar days, grouped the same way as the load-shift day predictions
    let shift_counts = results
        .load_shift
        .iter()
        .map(|hour| hour.shift_count)
        .collect_vec();
    let daily_heating = day_totals(&shift_counts, &heating).into_values().collect_vec();
    let daily_cooling = day_totals(&shift_counts, &cooling).into_values().collect_vec();

    let mut series = vec![
        ("Total Heating Load (Btu/h)", heating),
        ("Total Cooling Load (Btu/h)", cooling),
        ("Daily Heating Load (Btu)", daily_heating),
        ("Daily Cooling Load (Btu)", daily_cooling),
    ];
    if let Some(cup) = &results.cup {
        series.push((
            "Heating Shortfall (Btu/h)",
            cup.iter().map(|hour| hour.heating_shortfall).collect_vec(),
        ));
        series.push((
            "Cooling Shortfall (Btu/h)",
            cup.iter().map(|hour| hour.cooling_shortfall).collect_vec(),
        ));
    }

    series
        .iter()
        .filter_map(|(metric, values)| SummaryRow::for_series(metric, values))
        .chain([SummaryRow::for_count(
            "Unbalanced Building Hours",
            results.unbalanced_building_hours(),
        )])
        .collect_vec()
}

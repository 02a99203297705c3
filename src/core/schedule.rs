use crate::core::units::{HOURS_PER_DAY, MONTHS_PER_YEAR};
use csv::ReaderBuilder as CsvReaderBuilder;
use itertools::Itertools;
use serde::Deserialize;
use std::io::Read;
use thiserror::Error;
use tracing::warn;

const HOUR_COLUMNS: usize = HOURS_PER_DAY as usize;
const COLUMN_MONTH: &str = "Month";
const COLUMN_TOTAL: &str = "Total";

/// One month of a thermal storage tank's charging schedule, as it is held in a schedule
/// spreadsheet: a month key, one on/off cell per hour of the day and the month's "Total".
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScheduleRow {
    pub month: u32,
    pub hours: Vec<f64>,
    pub total: f64,
}

/// A validated month × hour-of-day on/off table for charging a thermal storage tank.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(try_from = "Vec<ScheduleRow>")]
pub struct ScheduleTable {
    on: [[bool; HOUR_COLUMNS]; MONTHS_PER_YEAR as usize],
    totals: [f64; MONTHS_PER_YEAR as usize],
}

impl ScheduleTable {
    /// Whether the tank is scheduled to charge during the given hour of the given month.
    ///
    /// Arguments:
    /// * `month` - calendar month, from 1 to 12
    /// * `hour` - hour of the day, from 0 to 23
    pub fn is_on(&self, month: u32, hour: u32) -> bool {
        self.on[month_idx(month)][hour as usize]
    }

    /// The total number of scheduled charging hours for a month, as given by the table's
    /// "Total" column.
    pub fn total_on(&self, month: u32) -> f64 {
        self.totals[month_idx(month)]
    }

    /// Read a schedule table from CSV with a `Month` column, hour columns `0` to `23` and a
    /// `Total` column.
    pub fn from_csv(csv: impl Read) -> Result<Self, ScheduleTableError> {
        let mut reader = CsvReaderBuilder::new().trim(csv::Trim::All).from_reader(csv);
        let headers = reader.headers()?.clone();

        let column_for = |name: &str| -> Result<usize, ScheduleTableError> {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| ScheduleTableError::MissingColumn(name.to_string()))
        };
        let month_column = column_for(COLUMN_MONTH)?;
        let total_column = column_for(COLUMN_TOTAL)?;
        let hour_columns = (0..HOUR_COLUMNS)
            .map(|hour| column_for(&hour.to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = vec![];
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let cell = |column: usize| -> Result<f64, ScheduleTableError> {
                let value = record.get(column).unwrap_or_default();
                value.parse().map_err(|_| ScheduleTableError::InvalidCell {
                    row: row_idx,
                    column: headers.get(column).unwrap_or_default().to_string(),
                    value: value.to_string(),
                })
            };
            let month = cell(month_column)?;
            if month.fract() != 0. || month < 0. {
                return Err(ScheduleTableError::MonthOutOfRange(month));
            }
            rows.push(ScheduleRow {
                month: month as u32,
                hours: hour_columns
                    .iter()
                    .map(|&column| cell(column))
                    .collect::<Result<_, _>>()?,
                total: cell(total_column)?,
            });
        }

        Self::try_from(rows)
    }

    /// Months whose schedule has at least one charging hour, in calendar order.
    pub fn months_with_charging(&self) -> Vec<u32> {
        (1..=MONTHS_PER_YEAR)
            .filter(|&month| self.on[month_idx(month)].iter().any(|&is_on| is_on))
            .collect_vec()
    }
}

fn month_idx(month: u32) -> usize {
    (month as usize).saturating_sub(1) % MONTHS_PER_YEAR as usize
}

impl TryFrom<Vec<ScheduleRow>> for ScheduleTable {
    type Error = ScheduleTableError;

    fn try_from(rows: Vec<ScheduleRow>) -> Result<Self, Self::Error> {
        if rows.len() != MONTHS_PER_YEAR as usize {
            return Err(ScheduleTableError::WrongMonthCount(rows.len()));
        }

        let mut on = [[false; HOUR_COLUMNS]; MONTHS_PER_YEAR as usize];
        let mut totals = [0.; MONTHS_PER_YEAR as usize];
        let mut seen = [false; MONTHS_PER_YEAR as usize];

        for row in rows {
            if !(1..=MONTHS_PER_YEAR).contains(&row.month) {
                return Err(ScheduleTableError::MonthOutOfRange(row.month as f64));
            }
            let idx = month_idx(row.month);
            if seen[idx] {
                return Err(ScheduleTableError::DuplicateMonth(row.month));
            }
            seen[idx] = true;

            if row.hours.len() != HOUR_COLUMNS {
                return Err(ScheduleTableError::WrongHourCount {
                    month: row.month,
                    count: row.hours.len(),
                });
            }
            for (hour, &value) in row.hours.iter().enumerate() {
                if value != 0. && value != 1. {
                    return Err(ScheduleTableError::NonBinaryCell {
                        month: row.month,
                        hour,
                        value,
                    });
                }
                on[idx][hour] = value == 1.;
            }

            let hours_on = on[idx].iter().filter(|&&is_on| is_on).count();
            if hours_on as f64 != row.total {
                warn!(
                    month = row.month,
                    total = row.total,
                    hours_on,
                    "Schedule 'Total' does not match the number of scheduled hours; the 'Total' value is used as given"
                );
            }
            totals[idx] = row.total;
        }

        Ok(Self { on, totals })
    }
}

#[derive(Debug, Error)]
pub enum ScheduleTableError {
    #[error("Schedule table must have exactly 12 month rows but had {0}")]
    WrongMonthCount(usize),
    #[error("Schedule table has a month key of {0}, which is not a month from 1 to 12")]
    MonthOutOfRange(f64),
    #[error("Schedule table has more than one row for month {0}")]
    DuplicateMonth(u32),
    #[error("Schedule table row for month {month} has {count} hour values, expected 24")]
    WrongHourCount { month: u32, count: usize },
    #[error("Schedule table cell for month {month}, hour {hour} is {value}, expected 0 or 1")]
    NonBinaryCell { month: u32, hour: usize, value: f64 },
    #[error("Schedule table is missing the '{0}' column")]
    MissingColumn(String),
    #[error("Schedule table row {row} has a non-numeric value '{value}' in column '{column}'")]
    InvalidCell {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Schedule table could not be read: {0}")]
    Csv(#[from] csv::Error),
}

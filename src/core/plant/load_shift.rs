use crate::core::common::{check_series_length, SeriesLengthError};
use crate::core::schedule::ScheduleTable;
use chrono::{Datelike, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use itertools::{izip, Itertools};
use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{debug, info};

/// The two thermal storage tanks at the central plant.
#[derive(Clone, Copy, Debug, Display, EnumIter, PartialEq, Eq)]
pub enum Tank {
    #[strum(to_string = "hot")]
    Hot,
    #[strum(to_string = "cold")]
    Cold,
}

/// Day index used to group hours for load-shift predictions: the ordinal day of the year, from 0.
pub fn shift_count(time_stamp: &NaiveDateTime) -> u32 {
    time_stamp.ordinal0()
}

/// Total load of each day, keyed by shift count in order of first appearance.
pub fn day_totals(shift_count: &[u32], load: &[f64]) -> IndexMap<u32, f64> {
    let mut day_totals: IndexMap<u32, f64> = IndexMap::new();
    for (&day, &load) in shift_count.iter().zip(load) {
        *day_totals.entry(day).or_default() += load;
    }

    day_totals
}

/// For every hour, the total load over all hours sharing that hour's shift count.
pub fn predicted_day_load(shift_count: &[u32], load: &[f64]) -> Vec<f64> {
    let day_totals = day_totals(shift_count, load);

    shift_count
        .iter()
        .map(|day| day_totals.get(day).copied().unwrap_or_default())
        .collect_vec()
}

/// For every hour, the total load over the charging hours sharing that hour's shift count.
///
/// Hours outside the charging window still receive their day's windowed total; a day with no
/// charging hours totals 0.
pub fn predicted_day_load_in_window(
    charging: &[bool],
    shift_count: &[u32],
    load: &[f64],
) -> Vec<f64> {
    let mut day_totals: IndexMap<u32, f64> = IndexMap::new();
    for (&is_charging, &day, &load) in izip!(charging, shift_count, load) {
        let total = day_totals.entry(day).or_default();
        if is_charging {
            *total += load;
        }
    }

    shift_count
        .iter()
        .map(|day| day_totals.get(day).copied().unwrap_or_default())
        .collect_vec()
}

/// Classifies each hour of the calendar as charging or idle for the hot and cold storage tanks
/// and projects each day's district load onto the load-shift window.
#[derive(Clone, Debug)]
pub struct LoadShiftScheduler {
    time_stamp: Vec<NaiveDateTime>,
    hot_schedule: ScheduleTable,
    cold_schedule: ScheduleTable,
    total_heating_load: Vec<f64>,
    total_cooling_load: Vec<f64>,
}

impl LoadShiftScheduler {
    /// Arguments:
    /// * `time_stamp` - timestamp of each hour
    /// * `hot_schedule` - charging schedule of the hot water storage tank
    /// * `cold_schedule` - charging schedule of the chilled water storage tank
    /// * `total_heating_load` - district heating load for each hour, in Btu/h
    /// * `total_cooling_load` - district cooling load for each hour, in Btu/h
    pub fn new(
        time_stamp: Vec<NaiveDateTime>,
        hot_schedule: ScheduleTable,
        cold_schedule: ScheduleTable,
        total_heating_load: Vec<f64>,
        total_cooling_load: Vec<f64>,
    ) -> Result<Self, SeriesLengthError> {
        check_series_length("total_heating_load", &total_heating_load, time_stamp.len())?;
        check_series_length("total_cooling_load", &total_cooling_load, time_stamp.len())?;

        Ok(Self {
            time_stamp,
            hot_schedule,
            cold_schedule,
            total_heating_load,
            total_cooling_load,
        })
    }

    fn schedule_for(&self, tank: Tank) -> &ScheduleTable {
        match tank {
            Tank::Hot => &self.hot_schedule,
            Tank::Cold => &self.cold_schedule,
        }
    }

    /// Whether the tank is charging during each hour.
    pub fn charging(&self, tank: Tank) -> Vec<bool> {
        let schedule = self.schedule_for(tank);
        self.time_stamp
            .iter()
            .map(|time_stamp| schedule.is_on(time_stamp.month(), time_stamp.hour()))
            .collect_vec()
    }

    /// Scheduled charging hours of the tank for each hour's month.
    pub fn shift_hours(&self, tank: Tank) -> Vec<f64> {
        let schedule = self.schedule_for(tank);
        self.time_stamp
            .iter()
            .map(|time_stamp| schedule.total_on(time_stamp.month()))
            .collect_vec()
    }

    pub fn shift_counts(&self) -> Vec<u32> {
        self.time_stamp.iter().map(shift_count).collect_vec()
    }

    pub fn compute(&self) -> Vec<LoadShiftHourResult> {
        let hw_charging = self.charging(Tank::Hot);
        let chw_charging = self.charging(Tank::Cold);
        let hot_shift_hours = self.shift_hours(Tank::Hot);
        let cold_shift_hours = self.shift_hours(Tank::Cold);
        let shift_counts = self.shift_counts();

        let predicted_day_heating = predicted_day_load(&shift_counts, &self.total_heating_load);
        let predicted_day_cooling = predicted_day_load(&shift_counts, &self.total_cooling_load);
        let predicted_day_heating_shift =
            predicted_day_load_in_window(&hw_charging, &shift_counts, &self.total_heating_load);
        let predicted_day_cooling_shift =
            predicted_day_load_in_window(&chw_charging, &shift_counts, &self.total_cooling_load);

        for tank in Tank::iter() {
            let charging = match tank {
                Tank::Hot => &hw_charging,
                Tank::Cold => &chw_charging,
            };
            debug!(
                %tank,
                charging_hours = charging.iter().filter(|&&is_charging| is_charging).count(),
                months_with_charging = ?self.schedule_for(tank).months_with_charging(),
                "Classified storage tank charging hours"
            );
        }
        info!(
            days = shift_counts.iter().unique().count(),
            "Projected daily loads onto load shift windows"
        );

        (0..self.time_stamp.len())
            .map(|t_idx| LoadShiftHourResult {
                time_stamp: self.time_stamp[t_idx],
                hw_charging: hw_charging[t_idx],
                chw_charging: chw_charging[t_idx],
                hot_shift_hours: hot_shift_hours[t_idx],
                cold_shift_hours: cold_shift_hours[t_idx],
                shift_count: shift_counts[t_idx],
                predicted_day_heating: predicted_day_heating[t_idx],
                predicted_day_cooling: predicted_day_cooling[t_idx],
                predicted_day_heating_shift: predicted_day_heating_shift[t_idx],
                predicted_day_cooling_shift: predicted_day_cooling_shift[t_idx],
            })
            .collect_vec()
    }
}

/// Storage tank charging state and daily load projections for one hour.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadShiftHourResult {
    #[serde(rename = "Time Stamp")]
    pub time_stamp: NaiveDateTime,
    #[serde(rename = "Hot Load Shift Charging")]
    pub hw_charging: bool,
    #[serde(rename = "Cold Load Shift Charging")]
    pub chw_charging: bool,
    #[serde(rename = "Hot Load Shift Hours")]
    pub hot_shift_hours: f64,
    #[serde(rename = "Cold Load Shift Hours")]
    pub cold_shift_hours: f64,
    #[serde(rename = "Shift Count")]
    pub shift_count: u32,
    #[serde(rename = "Predicted Day's Heating Load (Btu/h)")]
    pub predicted_day_heating: f64,
    #[serde(rename = "Predicted Day's Cooling Load (Btu/h)")]
    pub predicted_day_cooling: f64,
    #[serde(rename = "Predicted Heating Load in Load Shift Window (Btu/h)")]
    pub predicted_day_heating_shift: f64,
    #[serde(rename = "Predicted Cooling Load in Load Shift Window (Btu/h)")]
    pub predicted_day_cooling_shift: f64,
}

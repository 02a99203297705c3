use crate::core::common::{check_series_length, SeriesLengthError};
use chrono::{Datelike, NaiveDateTime};
use thiserror::Error;

/// Paired hot-water supply temperatures and return-temperature deltas used to approximate a
/// building's heating hot-water return temperature from its setpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct HotWaterLookupTable {
    supply_temps: Vec<f64>,
    return_temps: Vec<f64>,
}

impl HotWaterLookupTable {
    /// Arguments:
    /// * `supply_temps` - heating hot-water supply temperatures, in °F
    /// * `return_temps` - temperature drop paired with each supply temperature, in °F
    pub fn new(supply_temps: Vec<f64>, return_temps: Vec<f64>) -> Self {
        Self {
            supply_temps,
            return_temps,
        }
    }

    pub fn supply_temps(&self) -> &[f64] {
        &self.supply_temps
    }

    /// The return-temperature entry paired with a supply-temperature index, or None when the
    /// index is beyond the return-temperature table.
    pub fn return_temp_at(&self, index: usize) -> Option<f64> {
        self.return_temps.get(index).copied()
    }
}

/// Month-indexed domestic hot-water setpoints.
#[derive(Clone, Debug, PartialEq)]
pub struct DhwSetpointSchedule {
    months: Vec<u32>,
    setpoints: Vec<f64>,
}

impl DhwSetpointSchedule {
    pub fn new(months: Vec<u32>, setpoints: Vec<f64>) -> Result<Self, BuildingParametersError> {
        if months.len() != setpoints.len() {
            return Err(BuildingParametersError::DhwScheduleLengthMismatch {
                months: months.len(),
                setpoints: setpoints.len(),
            });
        }

        Ok(Self { months, setpoints })
    }

    /// Position of the month in the schedule (the first match if a month is listed twice).
    fn index_of_month(&self, month: u32) -> Option<usize> {
        self.months.iter().position(|&m| m == month)
    }
}

/// Scenario-wide constants and calendar-driven lookups shared by every building in a run.
#[derive(Clone, Debug)]
pub struct BuildingParameters {
    pub(crate) hw_loop_setpoint: Vec<f64>,
    pub(crate) hw_supply_losses: f64,
    pub(crate) chw_loop_setpoint: Vec<f64>,
    pub(crate) chw_supply_losses: f64,
    pub(crate) chw_delta_t_max: f64,
    pub(crate) chw_delta_t_min: f64,
    pub(crate) hhw_lookup: HotWaterLookupTable,
    pub(crate) hhw_building_setpoint: Vec<f64>,
    dhw_setpoints: DhwSetpointSchedule,
    building_date: Vec<NaiveDateTime>,
    pub(crate) dhw_max_approach: f64,
    pub(crate) dhw_min_approach: f64,
    pub(crate) hw_return_losses: f64,
    dhw_indices: Vec<usize>,
}

impl BuildingParameters {
    /// Arguments:
    /// * `hw_loop_setpoint` - hot-water loop setpoint for each hour, in °F
    /// * `hw_supply_losses` - temperature offset between the loop setpoint and the supply
    ///                        temperature seen at a building, in °F
    /// * `chw_loop_setpoint` - chilled-water loop setpoint for each hour, in °F
    /// * `chw_supply_losses` - chilled-water supply offset, in °F
    /// * `chw_delta_t_max` - chilled-water delta-T at peak cooling load, in °F
    /// * `chw_delta_t_min` - chilled-water delta-T at zero cooling load, in °F
    /// * `hhw_lookup` - supply/return pairs for approximating heating return temperatures
    /// * `hhw_building_setpoint` - building heating hot-water setpoint for each hour, in °F
    /// * `dhw_setpoints` - domestic hot-water setpoint for each month
    /// * `building_date` - timestamp of each hour
    /// * `dhw_max_approach` - DHW approach temperature at peak DHW load, in °F
    /// * `dhw_min_approach` - lowest DHW approach temperature, in °F
    /// * `hw_return_losses` - offset added to the district hot-water return temperature, in °F
    pub fn new(
        hw_loop_setpoint: Vec<f64>,
        hw_supply_losses: f64,
        chw_loop_setpoint: Vec<f64>,
        chw_supply_losses: f64,
        chw_delta_t_max: f64,
        chw_delta_t_min: f64,
        hhw_lookup: HotWaterLookupTable,
        hhw_building_setpoint: Vec<f64>,
        dhw_setpoints: DhwSetpointSchedule,
        building_date: Vec<NaiveDateTime>,
        dhw_max_approach: f64,
        dhw_min_approach: f64,
        hw_return_losses: f64,
    ) -> Result<Self, BuildingParametersError> {
        let total_steps = building_date.len();
        check_series_length("hw_loop_setpoint", &hw_loop_setpoint, total_steps)?;
        check_series_length("chw_loop_setpoint", &chw_loop_setpoint, total_steps)?;
        check_series_length("hhw_building_setpoint", &hhw_building_setpoint, total_steps)?;

        let dhw_indices = dhw_indices(&building_date, &dhw_setpoints)?;

        Ok(Self {
            hw_loop_setpoint,
            hw_supply_losses,
            chw_loop_setpoint,
            chw_supply_losses,
            chw_delta_t_max,
            chw_delta_t_min,
            hhw_lookup,
            hhw_building_setpoint,
            dhw_setpoints,
            building_date,
            dhw_max_approach,
            dhw_min_approach,
            hw_return_losses,
            dhw_indices,
        })
    }

    pub fn total_steps(&self) -> usize {
        self.building_date.len()
    }

    pub fn building_date(&self) -> &[NaiveDateTime] {
        &self.building_date
    }

    pub fn hw_loop_setpoint(&self) -> &[f64] {
        &self.hw_loop_setpoint
    }

    pub fn chw_loop_setpoint(&self) -> &[f64] {
        &self.chw_loop_setpoint
    }

    /// For each hour, the position of that hour's month in the DHW setpoint schedule.
    pub fn dhw_indices(&self) -> &[usize] {
        &self.dhw_indices
    }

    /// Domestic hot-water setpoint for the hour at `t_idx`, in °F.
    pub(crate) fn dhw_setpoint(&self, t_idx: usize) -> f64 {
        self.dhw_setpoints.setpoints[self.dhw_indices[t_idx]]
    }
}

fn dhw_indices(
    building_date: &[NaiveDateTime],
    dhw_setpoints: &DhwSetpointSchedule,
) -> Result<Vec<usize>, BuildingParametersError> {
    building_date
        .iter()
        .map(|date| {
            dhw_setpoints
                .index_of_month(date.month())
                .ok_or(BuildingParametersError::MissingDhwSetpoint {
                    month: date.month(),
                })
        })
        .collect::<Result<Vec<_>, _>>()
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum BuildingParametersError {
    #[error(transparent)]
    SeriesLength(#[from] SeriesLengthError),
    #[error("No domestic hot water setpoint was given for month {month}")]
    MissingDhwSetpoint { month: u32 },
    #[error("Domestic hot water schedule lists {months} months but {setpoints} setpoints")]
    DhwScheduleLengthMismatch { months: usize, setpoints: usize },
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::simulation_time::HourlyCalendar;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rstest::*;

    pub(crate) fn calendar_from(year: i32, month: u32, day: u32, hours: usize) -> HourlyCalendar {
        HourlyCalendar::new(
            NaiveDate::from_ymd_opt(year, month, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            hours,
        )
    }

    pub(crate) fn dhw_setpoints_by_month() -> DhwSetpointSchedule {
        DhwSetpointSchedule::new(
            (1..=12).collect(),
            vec![
                120., 120., 125., 125., 130., 130., 135., 135., 130., 130., 125., 125.,
            ],
        )
        .unwrap()
    }

    pub(crate) fn hhw_lookup() -> HotWaterLookupTable {
        HotWaterLookupTable::new(vec![180., 160., 140., 120.], vec![40., 30., 20., 10.])
    }

    /// Parameters with constant setpoints over the given calendar.
    pub(crate) fn parameters_for(calendar: &HourlyCalendar) -> BuildingParameters {
        let total_steps = calendar.total_steps();
        BuildingParameters::new(
            vec![160.; total_steps],
            -2.,
            vec![42.; total_steps],
            1.,
            16.,
            6.,
            hhw_lookup(),
            vec![150.; total_steps],
            dhw_setpoints_by_month(),
            calendar.timestamps(),
            15.,
            5.,
            -1.,
        )
        .unwrap()
    }

    #[rstest]
    fn should_index_dhw_setpoints_by_month() {
        let calendar = calendar_from(2045, 1, 31, 48);
        let parameters = parameters_for(&calendar);

        assert_eq!(parameters.dhw_indices()[0], 0);
        assert_eq!(parameters.dhw_indices()[23], 0);
        assert_eq!(parameters.dhw_indices()[24], 1);
        assert_eq!(parameters.dhw_setpoint(0), 120.);
        assert_eq!(parameters.dhw_setpoint(47), 120.);
    }

    #[rstest]
    fn should_index_sparse_dhw_schedule() {
        let calendar = calendar_from(2045, 5, 31, 2);
        let schedule = DhwSetpointSchedule::new(vec![6, 5], vec![140., 130.]).unwrap();
        let parameters = BuildingParameters::new(
            vec![160.; 2],
            0.,
            vec![42.; 2],
            0.,
            16.,
            6.,
            hhw_lookup(),
            vec![150.; 2],
            schedule,
            calendar.timestamps(),
            15.,
            5.,
            0.,
        )
        .unwrap();

        assert_eq!(parameters.dhw_indices(), &[1, 1]);
        assert_eq!(parameters.dhw_setpoint(1), 130.);
    }

    #[rstest]
    fn should_reject_calendar_month_without_dhw_setpoint() {
        let calendar = calendar_from(2045, 2, 28, 48);
        let schedule = DhwSetpointSchedule::new(vec![2], vec![140.]).unwrap();
        let result = BuildingParameters::new(
            vec![160.; 48],
            0.,
            vec![42.; 48],
            0.,
            16.,
            6.,
            hhw_lookup(),
            vec![150.; 48],
            schedule,
            calendar.timestamps(),
            15.,
            5.,
            0.,
        );

        assert_eq!(
            result.unwrap_err(),
            BuildingParametersError::MissingDhwSetpoint { month: 3 }
        );
    }

    #[rstest]
    fn should_reject_setpoint_series_of_wrong_length() {
        let calendar = calendar_from(2045, 1, 1, 24);
        let result = BuildingParameters::new(
            vec![160.; 23],
            0.,
            vec![42.; 24],
            0.,
            16.,
            6.,
            hhw_lookup(),
            vec![150.; 24],
            dhw_setpoints_by_month(),
            calendar.timestamps(),
            15.,
            5.,
            0.,
        );

        assert!(matches!(
            result,
            Err(BuildingParametersError::SeriesLength(SeriesLengthError { ref series, expected: 24, actual: 23 })) if series == "hw_loop_setpoint"
        ));
    }

    #[rstest]
    fn should_reject_dhw_schedule_of_unequal_lengths() {
        assert_eq!(
            DhwSetpointSchedule::new(vec![1, 2], vec![120.]).unwrap_err(),
            BuildingParametersError::DhwScheduleLengthMismatch {
                months: 2,
                setpoints: 1
            }
        );
    }

    #[rstest]
    fn should_return_missing_for_return_temp_beyond_table() {
        let table = HotWaterLookupTable::new(vec![180., 160.], vec![40.]);
        assert_eq!(table.return_temp_at(0), Some(40.));
        assert_eq!(table.return_temp_at(1), None);
    }
}

use crate::core::common::{check_series_length, SeriesLengthError};
use crate::core::schedule::ScheduleTable;
use crate::simulation_time::HourlyCalendar;
use anyhow::anyhow;
use serde::Deserialize;
use serde_valid::Validate;
use std::io::{BufReader, Read};

pub fn ingest_for_processing(json: impl Read) -> anyhow::Result<Input> {
    let input: Input = serde_json::from_reader(BufReader::new(json))?;
    input
        .validate()
        .map_err(|errors| anyhow!("Input failed validation: {errors}"))?;

    Ok(input)
}

/// A district project: the calendar, the shared network parameters, every connected building,
/// the storage tank schedules and, optionally, central plant telemetry.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Input {
    pub calendar: HourlyCalendar,
    #[validate]
    pub parameters: ParametersInput,
    #[validate(min_items = 1)]
    #[validate]
    pub buildings: Vec<BuildingInput>,
    pub hot_tank_schedule: Option<ScheduleTable>,
    pub cold_tank_schedule: Option<ScheduleTable>,
    #[validate]
    pub plant: Option<PlantInput>,
}

/// An hourly series given either as a single value for every hour or as one value per hour.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum HourlySeries {
    Constant(f64),
    Hourly(Vec<f64>),
}

impl HourlySeries {
    /// The series as one value per hour. A constant is repeated for every hour; an hourly series
    /// is returned as given and its length is checked where it is used.
    pub fn expand(&self, total_steps: usize) -> Vec<f64> {
        match self {
            HourlySeries::Constant(value) => vec![*value; total_steps],
            HourlySeries::Hourly(values) => values.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ParametersInput {
    /// °F
    pub hw_loop_setpoint: HourlySeries,
    /// °F
    pub hw_supply_losses: f64,
    /// °F
    pub chw_loop_setpoint: HourlySeries,
    /// °F
    pub chw_supply_losses: f64,
    /// Chilled-water delta-T at peak cooling load, in °F
    #[validate(minimum = 0.)]
    pub chw_delta_t_max: f64,
    /// Chilled-water delta-T at zero cooling load, in °F
    #[validate(minimum = 0.)]
    pub chw_delta_t_min: f64,
    /// Heating hot-water supply temperatures of the return-temperature lookup, in °F
    #[validate(min_items = 1)]
    pub hhw_supply_temps: Vec<f64>,
    /// Temperature drop paired with each lookup supply temperature, in °F
    #[validate(min_items = 1)]
    pub hhw_return_temps: Vec<f64>,
    /// °F
    pub hhw_building_setpoint: HourlySeries,
    #[validate(min_items = 1)]
    #[validate]
    pub dhw_setpoints: Vec<DhwSetpointInput>,
    /// °F
    #[validate(minimum = 0.)]
    pub dhw_max_approach: f64,
    /// °F
    #[validate(minimum = 0.)]
    pub dhw_min_approach: f64,
    /// °F
    pub hw_return_losses: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DhwSetpointInput {
    #[validate(minimum = 1)]
    #[validate(maximum = 12)]
    pub month: u32,
    /// °F
    pub setpoint: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BuildingInput {
    pub id: u32,
    pub name: String,
    /// Btu/h
    #[validate(min_items = 1)]
    pub cooling_load: Vec<f64>,
    /// Btu/h
    #[validate(min_items = 1)]
    pub heating_load: Vec<f64>,
    /// Btu/h
    #[validate(min_items = 1)]
    pub dhw_load: Vec<f64>,
    /// Peak cooling load in Btu/h; the peak of `cooling_load` when not given
    #[validate(minimum = 0.)]
    pub chw_max_load: Option<f64>,
    /// Peak DHW load in Btu/h; the peak of `dhw_load` when not given
    #[validate(minimum = 0.)]
    pub dhw_max_load: Option<f64>,
    /// DHW load at which the DHW approach reaches its minimum, in Btu/h
    #[validate(minimum = 0.)]
    pub dhw_load_min_approach: f64,
}

/// Hourly telemetry of the central plant equipment. Temperatures are in °F and flows in gpm.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PlantInput {
    /// Defaults to the hot-water loop setpoint
    pub hw_district_setpoint: Option<HourlySeries>,
    /// Defaults to the chilled-water loop setpoint
    pub chw_district_setpoint: Option<HourlySeries>,
    pub hp_hw_gpm: HourlySeries,
    pub hp_chwst: HourlySeries,
    pub hp_chw_gpm: HourlySeries,
    pub tes_h_temp_out: HourlySeries,
    pub tes_h_flow_out: HourlySeries,
    pub tes_h_flow_in: HourlySeries,
    pub tes_c_temp_out: HourlySeries,
    pub tes_c_flow_out: HourlySeries,
    pub tes_c_flow_in: HourlySeries,
    pub boiler_hw_gpm: HourlySeries,
    pub chiller_chws_gpm: HourlySeries,
}

impl PlantInput {
    /// Check every telemetry series, and any district setpoint given, has one value per hour.
    pub fn check_lengths(&self, total_steps: usize) -> Result<(), SeriesLengthError> {
        let setpoints = [
            ("hw_district_setpoint", &self.hw_district_setpoint),
            ("chw_district_setpoint", &self.chw_district_setpoint),
        ]
        .into_iter()
        .filter_map(|(series, values)| values.as_ref().map(|values| (series, values)));
        let telemetry = [
            ("hp_hw_gpm", &self.hp_hw_gpm),
            ("hp_chwst", &self.hp_chwst),
            ("hp_chw_gpm", &self.hp_chw_gpm),
            ("tes_h_temp_out", &self.tes_h_temp_out),
            ("tes_h_flow_out", &self.tes_h_flow_out),
            ("tes_h_flow_in", &self.tes_h_flow_in),
            ("tes_c_temp_out", &self.tes_c_temp_out),
            ("tes_c_flow_out", &self.tes_c_flow_out),
            ("tes_c_flow_in", &self.tes_c_flow_in),
            ("boiler_hw_gpm", &self.boiler_hw_gpm),
            ("chiller_chws_gpm", &self.chiller_chws_gpm),
        ];

        for (series, values) in setpoints.chain(telemetry) {
            check_series_length(series, &values.expand(total_steps), total_steps)?;
        }

        Ok(())
    }
}

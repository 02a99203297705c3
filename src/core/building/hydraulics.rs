use crate::compare_floats::max_of_2;
use crate::core::building::parameters::BuildingParameters;
use crate::core::common::{check_series_length, divide_or, SeriesLengthError};
use crate::core::units::WATER_BTU_PER_GPM_DEG_F;
use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Flows within this tolerance (in gpm) are considered equal when checking a building's
/// hot-water supply against its return.
const FLOW_BALANCE_TOLERANCE: f64 = 1e-6;

/// Index of the table entry closest to `target`, by absolute difference. On an exact tie the
/// lowest index wins. Returns None for an empty table.
pub fn nearest_index(table: &[f64], target: f64) -> Option<usize> {
    table
        .iter()
        .map(|value| (target - value).abs())
        .position_min_by(|a, b| a.total_cmp(b))
}

/// One building connected to the district network, with its hourly thermal loads.
///
/// All hourly results are pure functions of the loads and the shared parameters, so a
/// building can be computed any number of times with identical results.
#[derive(Clone, Debug)]
pub struct Building {
    parameters: Arc<BuildingParameters>,
    caan_no: u32,
    name: String,
    cooling_load: Vec<f64>,
    heating_load: Vec<f64>,
    dhw_load: Vec<f64>,
    time_stamp: Vec<NaiveDateTime>,
    chw_max_load: f64,
    dhw_max_load: f64,
    dhw_load_min_approach: f64,
}

impl Building {
    /// Arguments:
    /// * `parameters` - scenario parameters shared by all buildings
    /// * `caan_no` - numeric building identifier
    /// * `name` - display name of the building
    /// * `cooling_load` - hourly cooling load, in Btu/h
    /// * `heating_load` - hourly space heating load, in Btu/h
    /// * `dhw_load` - hourly domestic hot water load, in Btu/h
    /// * `time_stamp` - timestamp of each hour
    /// * `chw_max_load` - peak cooling load, at which the chilled-water delta-T is at its maximum,
    ///                    in Btu/h
    /// * `dhw_max_load` - peak DHW load, at which the DHW approach is at its maximum, in Btu/h
    /// * `dhw_load_min_approach` - DHW load at which the DHW approach reaches its minimum, in Btu/h
    pub fn new(
        parameters: Arc<BuildingParameters>,
        caan_no: u32,
        name: String,
        cooling_load: Vec<f64>,
        heating_load: Vec<f64>,
        dhw_load: Vec<f64>,
        time_stamp: Vec<NaiveDateTime>,
        chw_max_load: f64,
        dhw_max_load: f64,
        dhw_load_min_approach: f64,
    ) -> Result<Self, SeriesLengthError> {
        let total_steps = parameters.total_steps();
        check_series_length("cooling_load", &cooling_load, total_steps)?;
        check_series_length("heating_load", &heating_load, total_steps)?;
        check_series_length("dhw_load", &dhw_load, total_steps)?;
        check_series_length("time_stamp", &time_stamp, total_steps)?;

        Ok(Self {
            parameters,
            caan_no,
            name,
            cooling_load,
            heating_load,
            dhw_load,
            time_stamp,
            chw_max_load,
            dhw_max_load,
            dhw_load_min_approach,
        })
    }

    pub fn caan_no(&self) -> u32 {
        self.caan_no
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn loop_hwst(&self, t_idx: usize) -> f64 {
        self.parameters.hw_loop_setpoint[t_idx] + self.parameters.hw_supply_losses
    }

    fn loop_chwst(&self, t_idx: usize) -> f64 {
        self.parameters.chw_loop_setpoint[t_idx] + self.parameters.chw_supply_losses
    }

    /// Chilled-water return temperature rises linearly with cooling load from
    /// supply + min delta-T at no load to supply + max delta-T at peak load.
    fn chwrt(&self, t_idx: usize) -> f64 {
        let delta_t_range = self.parameters.chw_delta_t_max - self.parameters.chw_delta_t_min;
        self.loop_chwst(t_idx)
            + divide_or(delta_t_range, self.chw_max_load, 0.) * self.cooling_load[t_idx]
            + self.parameters.chw_delta_t_min
    }

    fn chwr_flow(&self, t_idx: usize, chwrt: f64) -> f64 {
        let cooling_load = self.cooling_load[t_idx];
        if cooling_load == 0. {
            return 0.;
        }
        divide_or(
            cooling_load / WATER_BTU_PER_GPM_DEG_F,
            chwrt - self.loop_chwst(t_idx),
            0.,
        )
    }

    fn min_index(&self, t_idx: usize) -> Option<usize> {
        nearest_index(
            self.parameters.hhw_lookup.supply_temps(),
            self.parameters.hhw_building_setpoint[t_idx],
        )
    }

    /// Heating hot-water return temperature, or None when the lookup falls outside the
    /// return-temperature table.
    fn hhwrt(&self, t_idx: usize, min_index: Option<usize>) -> Option<f64> {
        let delta = self.parameters.hhw_lookup.return_temp_at(min_index?)?;
        Some(self.parameters.hhw_building_setpoint[t_idx] - delta)
    }

    fn dhw_temp(&self, t_idx: usize) -> f64 {
        self.parameters.dhw_setpoint(t_idx)
    }

    /// Approach temperature of the DHW heat exchanger. Linear in DHW load, reaching the
    /// maximum approach at peak load and the minimum at `dhw_load_min_approach`, and never
    /// below the minimum.
    fn dhw_approach(&self, t_idx: usize) -> f64 {
        let min_approach = self.parameters.dhw_min_approach;
        let max_approach = self.parameters.dhw_max_approach;
        let slope = if self.dhw_max_load == 0. {
            0.
        } else {
            divide_or(
                max_approach - min_approach,
                1. - self.dhw_load_min_approach / self.dhw_max_load,
                0.,
            )
        };
        let load_fraction = divide_or(self.dhw_load[t_idx], self.dhw_max_load, 0.);

        max_of_2(min_approach, slope * load_fraction + max_approach - slope)
    }

    fn dhwr_flow(&self, t_idx: usize, dhwrt: f64) -> f64 {
        divide_or(
            self.dhw_load[t_idx] / WATER_BTU_PER_GPM_DEG_F,
            self.loop_hwst(t_idx) - dhwrt,
            0.,
        )
    }

    fn heating_circuit(
        &self,
        t_idx: usize,
        hhwrt: f64,
        dhwrt: f64,
        dhwr_flow: f64,
    ) -> HeatingCircuit {
        let building_setpoint = self.parameters.hhw_building_setpoint[t_idx];
        let loop_hwst = self.loop_hwst(t_idx);

        let hhwr_flow = divide_or(
            self.heating_load[t_idx] / WATER_BTU_PER_GPM_DEG_F,
            building_setpoint - hhwrt,
            0.,
        );
        // share of the heating flow that has to come from the district supply to lift
        // the heating return back up to the building setpoint
        let district_hws_flow = dhwr_flow
            + divide_or(
                hhwr_flow * (building_setpoint - hhwrt),
                loop_hwst - hhwrt,
                0.,
            );
        let bypass_hhws = hhwr_flow - (district_hws_flow - dhwr_flow);
        let hwr_flow = hhwr_flow - bypass_hhws + dhwr_flow;

        // no supply flow means nothing returns to the district: reported as 0, not NaN
        let district_hwrt = if district_hws_flow == 0. {
            0.
        } else {
            (hhwrt * (hhwr_flow - bypass_hhws) + dhwr_flow * dhwrt) / district_hws_flow
                + self.parameters.hw_return_losses
        };

        HeatingCircuit {
            hhwr_flow,
            district_hws_flow,
            bypass_hhws,
            hwr_flow,
            district_hwrt,
        }
    }

    /// Results for a single hour.
    pub fn hour_result(&self, t_idx: usize) -> BuildingHourResult {
        let loop_hwst = self.loop_hwst(t_idx);
        let loop_chwst = self.loop_chwst(t_idx);
        let chwrt = self.chwrt(t_idx);
        let chwr_flow = self.chwr_flow(t_idx, chwrt);
        let min_index = self.min_index(t_idx);
        let hhwrt = self.hhwrt(t_idx, min_index);
        let dhw_temp = self.dhw_temp(t_idx);
        let dhwrt = dhw_temp + self.dhw_approach(t_idx);
        let dhwr_flow = self.dhwr_flow(t_idx, dhwrt);

        let heating = hhwrt.map(|hhwrt| self.heating_circuit(t_idx, hhwrt, dhwrt, dhwr_flow));

        BuildingHourResult {
            caan_no: self.caan_no,
            time_stamp: self.time_stamp[t_idx],
            space_heating_load: self.heating_load[t_idx],
            dhw_load: self.dhw_load[t_idx],
            cooling_load: self.cooling_load[t_idx],
            loop_hwst,
            loop_chwst,
            chwrt,
            chwr_flow,
            min_index,
            hhwrt,
            hhwr_flow: heating.map(|circuit| circuit.hhwr_flow),
            dhw_temp,
            dhwrt,
            dhwr_flow,
            district_hws_flow: heating.map(|circuit| circuit.district_hws_flow),
            bypass_hhws: heating.map(|circuit| circuit.bypass_hhws),
            hwr_flow: heating.map(|circuit| circuit.hwr_flow),
            district_hwrt: heating.map(|circuit| circuit.district_hwrt),
            hws_equal_hwr: heating.is_some_and(|circuit| {
                (circuit.district_hws_flow - circuit.hwr_flow).abs() < FLOW_BALANCE_TOLERANCE
            }),
        }
    }

    /// Results for every hour, in calendar order.
    pub fn compute(&self) -> Vec<BuildingHourResult> {
        let results = (0..self.parameters.total_steps())
            .map(|t_idx| self.hour_result(t_idx))
            .collect_vec();

        let missing_return_temp = results.iter().filter(|r| r.hhwrt.is_none()).count();
        if missing_return_temp > 0 {
            warn!(
                building = %self.name,
                hours = missing_return_temp,
                "Heating hot water return temperature could not be looked up for some hours"
            );
        }
        let unbalanced = results
            .iter()
            .filter(|r| r.hhwrt.is_some() && !r.hws_equal_hwr)
            .count();
        if unbalanced > 0 {
            warn!(
                building = %self.name,
                hours = unbalanced,
                "District hot water supply and return flows do not balance for some hours"
            );
        }
        debug!(building = %self.name, caan_no = self.caan_no, "Computed building hydraulics");

        results
    }
}

#[derive(Clone, Copy, Debug)]
struct HeatingCircuit {
    hhwr_flow: f64,
    district_hws_flow: f64,
    bypass_hhws: f64,
    hwr_flow: f64,
    district_hwrt: f64,
}

/// The flows and temperatures of one building for one hour. Heating hot-water fields are
/// None for an hour whose return temperature lookup failed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuildingHourResult {
    #[serde(rename = "caan_no")]
    pub caan_no: u32,
    #[serde(rename = "Time Stamp")]
    pub time_stamp: NaiveDateTime,
    #[serde(rename = "Space Heating Load (Btu/h)")]
    pub space_heating_load: f64,
    #[serde(rename = "DHW Load (Btu/h)")]
    pub dhw_load: f64,
    #[serde(rename = "Cooling Load (Btu/h)")]
    pub cooling_load: f64,
    #[serde(rename = "Loop HWST @ Building (°F)")]
    pub loop_hwst: f64,
    #[serde(rename = "Loop CHWST @ Building (°F)")]
    pub loop_chwst: f64,
    #[serde(rename = "CHWRT (°F)")]
    pub chwrt: f64,
    #[serde(rename = "CHWR Flow (gpm)")]
    pub chwr_flow: f64,
    #[serde(skip)]
    pub min_index: Option<usize>,
    #[serde(rename = "Building HHWRT (°F)")]
    pub hhwrt: Option<f64>,
    #[serde(rename = "HHWRflow")]
    pub hhwr_flow: Option<f64>,
    #[serde(rename = "Building Domestic Water Temp (°F)")]
    pub dhw_temp: f64,
    #[serde(rename = "Building DHWRT (°F)")]
    pub dhwrt: f64,
    #[serde(rename = "Building DHWR Flow (gpm)")]
    pub dhwr_flow: f64,
    #[serde(rename = "District HWS Flow (gpm)")]
    pub district_hws_flow: Option<f64>,
    #[serde(rename = "Bypassed Return to HHWS (gpm)")]
    pub bypass_hhws: Option<f64>,
    #[serde(rename = "District HWR Flow (gpm)")]
    pub hwr_flow: Option<f64>,
    #[serde(rename = "District HWRT (°F)")]
    pub district_hwrt: Option<f64>,
    #[serde(rename = "Check Building HWS = HWR")]
    pub hws_equal_hwr: bool,
}

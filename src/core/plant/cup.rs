use crate::core::common::{check_series_length, divide_or, SeriesLengthError};
use crate::core::plant::load_shift::LoadShiftHourResult;
use crate::core::units::heat_rate_btu_per_hour;
use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

/// Hourly district conditions and plant equipment telemetry feeding the central utility plant
/// balance. Every series holds one value per hour. Temperatures are in °F and flows in gpm.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CupInputs {
    pub district_hwrt: Vec<f64>,
    pub district_chwrt: Vec<f64>,
    pub district_hws_flow: Vec<f64>,
    pub district_chws_flow: Vec<f64>,
    pub hw_district_setpoint: Vec<f64>,
    pub chw_district_setpoint: Vec<f64>,
    pub hp_hw_gpm: Vec<f64>,
    pub hp_chwst: Vec<f64>,
    pub hp_chw_gpm: Vec<f64>,
    pub tes_h_temp_out: Vec<f64>,
    pub tes_h_flow_out: Vec<f64>,
    pub tes_h_flow_in: Vec<f64>,
    pub tes_c_temp_out: Vec<f64>,
    pub tes_c_flow_out: Vec<f64>,
    pub tes_c_flow_in: Vec<f64>,
    pub boiler_hw_gpm: Vec<f64>,
    pub chiller_chws_gpm: Vec<f64>,
}

impl CupInputs {
    fn check_lengths(&self, expected: usize) -> Result<(), SeriesLengthError> {
        for (series, values) in [
            ("district_hwrt", &self.district_hwrt),
            ("district_chwrt", &self.district_chwrt),
            ("district_hws_flow", &self.district_hws_flow),
            ("district_chws_flow", &self.district_chws_flow),
            ("hw_district_setpoint", &self.hw_district_setpoint),
            ("chw_district_setpoint", &self.chw_district_setpoint),
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
        ] {
            check_series_length(series, values, expected)?;
        }

        Ok(())
    }
}

/// Energy and temperature balance of the central utility plant, hour by hour.
///
/// District return streams and storage charging flows enter the plant; heat pumps, storage
/// discharge and the boiler or chiller supply it. The shortfalls compare the capacity delivered
/// to the plant against the capacity its supply sources account for.
#[derive(Clone, Debug)]
pub struct CupBalanceModel {
    load_shift: Vec<LoadShiftHourResult>,
    inputs: CupInputs,
}

impl CupBalanceModel {
    /// Arguments:
    /// * `load_shift` - storage tank charging state and load projections for each hour
    /// * `inputs` - district conditions and plant telemetry for each hour
    pub fn new(
        load_shift: Vec<LoadShiftHourResult>,
        inputs: CupInputs,
    ) -> Result<Self, SeriesLengthError> {
        inputs.check_lengths(load_shift.len())?;

        Ok(Self { load_shift, inputs })
    }

    fn cooling_shortfall(&self, t_idx: usize) -> f64 {
        let i = &self.inputs;
        let chwrt = i.district_chwrt[t_idx];
        let setpoint = i.chw_district_setpoint[t_idx];

        let delivered = heat_rate_btu_per_hour(
            i.district_chws_flow[t_idx] + i.tes_c_flow_in[t_idx],
            chwrt - setpoint,
        );
        let supplied = heat_rate_btu_per_hour(i.hp_chw_gpm[t_idx], chwrt - i.hp_chwst[t_idx])
            + heat_rate_btu_per_hour(i.tes_c_flow_out[t_idx], chwrt - i.tes_c_temp_out[t_idx])
            + heat_rate_btu_per_hour(i.chiller_chws_gpm[t_idx], chwrt - setpoint);

        delivered - supplied
    }

    fn heating_shortfall(&self, t_idx: usize) -> f64 {
        let i = &self.inputs;
        let hwrt = i.district_hwrt[t_idx];
        let setpoint_minus_hwrt = i.hw_district_setpoint[t_idx] - hwrt;

        let delivered = heat_rate_btu_per_hour(
            i.district_hws_flow[t_idx] + i.tes_h_flow_in[t_idx],
            setpoint_minus_hwrt,
        );
        let supplied = heat_rate_btu_per_hour(i.hp_hw_gpm[t_idx], setpoint_minus_hwrt)
            + heat_rate_btu_per_hour(i.tes_h_flow_out[t_idx], i.tes_h_temp_out[t_idx] - hwrt)
            + heat_rate_btu_per_hour(i.boiler_hw_gpm[t_idx], setpoint_minus_hwrt);

        delivered - supplied
    }

    pub fn hour_result(&self, t_idx: usize) -> CupHourResult {
        let i = &self.inputs;
        let load_shift = &self.load_shift[t_idx];

        let hw_setpoint = i.hw_district_setpoint[t_idx];
        let chw_setpoint = i.chw_district_setpoint[t_idx];

        let cup_hwr_flow = i.district_hws_flow[t_idx] + i.tes_h_flow_in[t_idx];
        let cup_chwr_flow = i.district_chws_flow[t_idx] + i.tes_c_flow_in[t_idx];

        let cup_hwr_temp = divide_or(
            i.district_hwrt[t_idx] * i.district_hws_flow[t_idx]
                + i.tes_h_temp_out[t_idx] * i.tes_h_flow_in[t_idx],
            cup_hwr_flow,
            i.district_hwrt[t_idx],
        );
        let cup_chwr_temp = divide_or(
            i.district_chwrt[t_idx] * i.district_chws_flow[t_idx]
                + i.tes_c_temp_out[t_idx] * i.tes_c_flow_in[t_idx],
            cup_chwr_flow,
            i.district_chwrt[t_idx],
        );
        // divided by the plant return flow rather than the summed supply flows; the reported CUP
        // supply temperatures are defined this way
        let cup_hwst = divide_or(
            hw_setpoint * i.hp_hw_gpm[t_idx]
                + i.tes_h_temp_out[t_idx] * i.tes_h_flow_out[t_idx]
                + hw_setpoint * i.boiler_hw_gpm[t_idx],
            cup_hwr_flow,
            hw_setpoint,
        );
        let cup_chwst = divide_or(
            i.hp_chwst[t_idx] * i.hp_chw_gpm[t_idx]
                + i.tes_c_temp_out[t_idx] * i.tes_c_flow_out[t_idx]
                + chw_setpoint * i.chiller_chws_gpm[t_idx],
            cup_chwr_flow,
            chw_setpoint,
        );

        CupHourResult {
            time_stamp: load_shift.time_stamp,
            cooling_shortfall: self.cooling_shortfall(t_idx),
            heating_shortfall: self.heating_shortfall(t_idx),
            hw_charging: load_shift.hw_charging,
            chw_charging: load_shift.chw_charging,
            hot_shift_hours: load_shift.hot_shift_hours,
            cold_shift_hours: load_shift.cold_shift_hours,
            shift_count: load_shift.shift_count,
            predicted_day_heating: load_shift.predicted_day_heating,
            predicted_day_cooling: load_shift.predicted_day_cooling,
            predicted_day_heating_shift: load_shift.predicted_day_heating_shift,
            predicted_day_cooling_shift: load_shift.predicted_day_cooling_shift,
            cup_hwr_flow,
            cup_chwr_flow,
            cup_hwr_temp,
            cup_chwr_temp,
            cup_hwst,
            cup_chwst,
            max_diff: cup_chwr_temp - i.district_chwrt[t_idx],
        }
    }

    pub fn compute(&self) -> Vec<CupHourResult> {
        let results = (0..self.load_shift.len())
            .map(|t_idx| self.hour_result(t_idx))
            .collect_vec();

        let no_return_flow = results
            .iter()
            .filter(|r| r.cup_hwr_flow == 0. || r.cup_chwr_flow == 0.)
            .count();
        if no_return_flow > 0 {
            warn!(
                hours = no_return_flow,
                "Plant return flow is zero for some hours; plant temperatures fall back to district values"
            );
        }
        debug!(hours = results.len(), "Computed central plant balance");

        results
    }
}

/// Plant balance for one hour, alongside the hour's load-shift state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CupHourResult {
    #[serde(rename = "Time Stamp")]
    pub time_stamp: NaiveDateTime,
    #[serde(rename = "Cooling Shortfall (Btu/h)")]
    pub cooling_shortfall: f64,
    #[serde(rename = "Heating Shortfall (Btu/h)")]
    pub heating_shortfall: f64,
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
    #[serde(rename = "CUP HWR Flow (gpm)")]
    pub cup_hwr_flow: f64,
    #[serde(rename = "CUP CHWR Flow (gpm)")]
    pub cup_chwr_flow: f64,
    #[serde(rename = "CUP HWR Temperature (°F)")]
    pub cup_hwr_temp: f64,
    #[serde(rename = "CUP CHWR Temperature (°F)")]
    pub cup_chwr_temp: f64,
    #[serde(rename = "CUP HWST (°F)")]
    pub cup_hwst: f64,
    #[serde(rename = "CUP CHWST (°F)")]
    pub cup_chwst: f64,
    #[serde(rename = "Max diff between District CHWRT and CUP CHWRT")]
    pub max_diff: f64,
}

use crate::core::building::hydraulics::BuildingHourResult;
use crate::core::common::{check_series_length, divide_or, SeriesLengthError};
use crate::core::units::heat_rate_btu_per_hour;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

/// Running totals for every building reporting one timestamp.
#[derive(Clone, Copy, Debug, Default)]
struct MixingGroup {
    space_heating_load: f64,
    dhw_load: f64,
    hws_flow: f64,
    hwrt_x_hws_flow: f64,
    chws_flow: f64,
    chwrt_x_chws_flow: f64,
    chwrt_sum: f64,
    buildings: usize,
}

impl MixingGroup {
    fn add(&mut self, building: &BuildingHourResult) {
        self.space_heating_load += building.space_heating_load;
        self.dhw_load += building.dhw_load;
        // hours with a missing heating circuit contribute nothing to the hot-water totals
        if let Some(flow) = building.district_hws_flow {
            self.hws_flow += flow;
            if let Some(hwrt) = building.district_hwrt {
                self.hwrt_x_hws_flow += hwrt * flow;
            }
        }
        self.chws_flow += building.chwr_flow;
        self.chwrt_x_chws_flow += building.chwrt * building.chwr_flow;
        self.chwrt_sum += building.chwrt;
        self.buildings += 1;
    }

    fn district_hwrt(&self) -> f64 {
        divide_or(self.hwrt_x_hws_flow, self.hws_flow, 0.)
    }

    /// Flow-weighted chilled-water return temperature. A group with no flow falls back to
    /// the plain mean of the buildings' return temperatures rather than reading 0°F.
    fn district_chwrt(&self) -> f64 {
        let mean_chwrt = divide_or(self.chwrt_sum, self.buildings as f64, 0.);
        divide_or(self.chwrt_x_chws_flow, self.chws_flow, mean_chwrt)
    }
}

/// The district mixing node, which combines the hourly flows and return temperatures of all
/// buildings into district-level conditions, one row per timestamp.
#[derive(Clone, Debug)]
pub struct DistrictMixingNode {
    groups: IndexMap<NaiveDateTime, MixingGroup>,
    hw_loop_setpoint: Vec<f64>,
    chw_loop_setpoint: Vec<f64>,
}

impl DistrictMixingNode {
    /// Arguments:
    /// * `building_results` - hourly results of every building, in any order
    /// * `hw_loop_setpoint` - hot-water loop setpoint for each timestamp, in ascending timestamp
    ///                        order, in °F
    /// * `chw_loop_setpoint` - chilled-water loop setpoint for each timestamp, in ascending
    ///                         timestamp order, in °F
    pub fn new<'a>(
        building_results: impl IntoIterator<Item = &'a BuildingHourResult>,
        hw_loop_setpoint: Vec<f64>,
        chw_loop_setpoint: Vec<f64>,
    ) -> Result<Self, SeriesLengthError> {
        let mut groups: IndexMap<NaiveDateTime, MixingGroup> = IndexMap::new();
        for building in building_results {
            groups.entry(building.time_stamp).or_default().add(building);
        }
        groups.sort_keys();

        check_series_length("hw_loop_setpoint", &hw_loop_setpoint, groups.len())?;
        check_series_length("chw_loop_setpoint", &chw_loop_setpoint, groups.len())?;

        Ok(Self {
            groups,
            hw_loop_setpoint,
            chw_loop_setpoint,
        })
    }

    pub fn compute(&self) -> Vec<DistrictHourResult> {
        let results = self
            .groups
            .iter()
            .enumerate()
            .map(|(t_idx, (&time_stamp, group))| {
                let district_hwrt = group.district_hwrt();
                let district_chwrt = group.district_chwrt();
                DistrictHourResult {
                    time_stamp,
                    total_space_heating_load: group.space_heating_load,
                    total_dhw_load: group.dhw_load,
                    district_hws_flow: group.hws_flow,
                    district_hwrt,
                    district_chws_flow: group.chws_flow,
                    district_chwrt,
                    total_heating_load: heat_rate_btu_per_hour(
                        group.hws_flow,
                        self.hw_loop_setpoint[t_idx] - district_hwrt,
                    ),
                    total_cooling_load: heat_rate_btu_per_hour(
                        group.chws_flow,
                        district_chwrt - self.chw_loop_setpoint[t_idx],
                    ),
                }
            })
            .collect_vec();

        debug!(timestamps = results.len(), "Mixed building flows at district node");

        results
    }
}

/// District-level conditions at one timestamp.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DistrictHourResult {
    #[serde(rename = "Time Stamp")]
    pub time_stamp: NaiveDateTime,
    #[serde(rename = "Total Space Heating Load (Btu/h)")]
    pub total_space_heating_load: f64,
    #[serde(rename = "Total DHW Load (Btu/h)")]
    pub total_dhw_load: f64,
    #[serde(rename = "District HWS Flow (gpm)")]
    pub district_hws_flow: f64,
    #[serde(rename = "District HWRT (°F)")]
    pub district_hwrt: f64,
    #[serde(rename = "District CHWS Flow (gpm)")]
    pub district_chws_flow: f64,
    #[serde(rename = "District CHWRT (°F)")]
    pub district_chwrt: f64,
    #[serde(rename = "Total Heating Load (Btu/h)")]
    pub total_heating_load: f64,
    #[serde(rename = "Total Cooling Load (Btu/h)")]
    pub total_cooling_load: f64,
}

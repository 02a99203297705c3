use crate::compare_floats::max_of_series;
use crate::core::building::hydraulics::{Building, BuildingHourResult};
use crate::core::building::parameters::{
    BuildingParameters, DhwSetpointSchedule, HotWaterLookupTable,
};
use crate::core::district::mixing::{DistrictHourResult, DistrictMixingNode};
use crate::core::plant::cup::{CupBalanceModel, CupHourResult, CupInputs};
use crate::core::plant::load_shift::{LoadShiftHourResult, LoadShiftScheduler};
use crate::core::schedule::ScheduleTable;
use crate::input::{BuildingInput, Input, ParametersInput, PlantInput};
use crate::simulation_time::HourlyCalendar;
use crate::ProjectFlags;
use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use itertools::Itertools;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, instrument};

/// Everything needed for one district run, assembled and checked from a project input.
#[derive(Debug)]
pub struct Corpus {
    calendar: HourlyCalendar,
    parameters: Arc<BuildingParameters>,
    buildings: Vec<Building>,
    hot_tank_schedule: ScheduleTable,
    cold_tank_schedule: ScheduleTable,
    plant: Option<PlantInput>,
}

impl Corpus {
    /// Arguments:
    /// * `input` - the project input
    /// * `hot_tank_schedule` - hot tank schedule to use in place of the one in the input, if any
    /// * `cold_tank_schedule` - cold tank schedule to use in place of the one in the input, if any
    /// * `flags` - project flags; `SKIP_PLANT_BALANCE` drops any plant telemetry
    pub fn from_inputs(
        input: Input,
        hot_tank_schedule: Option<ScheduleTable>,
        cold_tank_schedule: Option<ScheduleTable>,
        flags: &ProjectFlags,
    ) -> anyhow::Result<Self> {
        let Input {
            calendar,
            parameters,
            buildings,
            hot_tank_schedule: input_hot_tank_schedule,
            cold_tank_schedule: input_cold_tank_schedule,
            plant,
        } = input;

        if let Some(id) = buildings.iter().map(|building| building.id).duplicates().next() {
            bail!("Building id {id} is used by more than one building");
        }

        let parameters = Arc::new(building_parameters_from_input(&calendar, parameters)?);
        let buildings = buildings
            .into_iter()
            .map(|building| building_from_input(parameters.clone(), building))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let hot_tank_schedule = hot_tank_schedule
            .or(input_hot_tank_schedule)
            .ok_or_else(|| anyhow!("No charging schedule was given for the hot tank"))?;
        let cold_tank_schedule = cold_tank_schedule
            .or(input_cold_tank_schedule)
            .ok_or_else(|| anyhow!("No charging schedule was given for the cold tank"))?;

        let plant = plant.filter(|_| !flags.contains(ProjectFlags::SKIP_PLANT_BALANCE));
        if let Some(plant) = &plant {
            plant
                .check_lengths(calendar.total_steps())
                .map_err(|error| anyhow!("Plant telemetry: {error}"))?;
        }

        Ok(Self {
            calendar,
            parameters,
            buildings,
            hot_tank_schedule,
            cold_tank_schedule,
            plant,
        })
    }

    pub fn total_steps(&self) -> usize {
        self.calendar.total_steps()
    }

    #[instrument(skip_all)]
    fn compute_buildings(&self) -> IndexMap<u32, Vec<BuildingHourResult>> {
        self.buildings
            .par_iter()
            .map(|building| (building.caan_no(), building.compute()))
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }

    #[instrument(skip_all)]
    fn mix(
        &self,
        building_results: &IndexMap<u32, Vec<BuildingHourResult>>,
    ) -> anyhow::Result<Vec<DistrictHourResult>> {
        let node = DistrictMixingNode::new(
            building_results.values().flatten(),
            self.parameters.hw_loop_setpoint().to_vec(),
            self.parameters.chw_loop_setpoint().to_vec(),
        )?;

        Ok(node.compute())
    }

    #[instrument(skip_all)]
    fn shift_loads(
        &self,
        district: &[DistrictHourResult],
    ) -> anyhow::Result<Vec<LoadShiftHourResult>> {
        let scheduler = LoadShiftScheduler::new(
            district.iter().map(|hour| hour.time_stamp).collect(),
            self.hot_tank_schedule.clone(),
            self.cold_tank_schedule.clone(),
            district.iter().map(|hour| hour.total_heating_load).collect(),
            district.iter().map(|hour| hour.total_cooling_load).collect(),
        )?;

        Ok(scheduler.compute())
    }

    #[instrument(skip_all)]
    fn balance_plant(
        &self,
        plant: &PlantInput,
        district: &[DistrictHourResult],
        load_shift: Vec<LoadShiftHourResult>,
    ) -> anyhow::Result<Vec<CupHourResult>> {
        let inputs = cup_inputs(plant, district, &self.parameters, self.total_steps());
        let model = CupBalanceModel::new(load_shift, inputs)?;

        Ok(model.compute())
    }

    /// Run the network model: every building, then the district mixing node, then the load
    /// shift schedule and, when plant telemetry is present, the central plant balance.
    #[instrument(skip_all)]
    pub fn run(&self) -> anyhow::Result<RunResults> {
        info!(
            buildings = self.buildings.len(),
            hours = self.total_steps(),
            "Starting district run"
        );

        let buildings = self.compute_buildings();
        let district = self.mix(&buildings)?;
        let load_shift = self.shift_loads(&district)?;
        let cup = match &self.plant {
            Some(plant) => Some(self.balance_plant(plant, &district, load_shift.clone())?),
            None => None,
        };

        let results = RunResults {
            buildings,
            district,
            load_shift,
            cup,
        };
        info!(
            district_hours = results.district.len(),
            unbalanced_building_hours = results.unbalanced_building_hours(),
            plant_balance = results.cup.is_some(),
            "Finished district run"
        );

        Ok(results)
    }
}

/// The hourly tables of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunResults {
    /// Results per building, keyed by building id, in input order
    pub buildings: IndexMap<u32, Vec<BuildingHourResult>>,
    pub district: Vec<DistrictHourResult>,
    pub load_shift: Vec<LoadShiftHourResult>,
    /// Central plant balance, present when plant telemetry was given
    pub cup: Option<Vec<CupHourResult>>,
}

impl RunResults {
    /// Building-hours whose district hot-water supply and return flows do not balance,
    /// including hours with no heating circuit.
    pub fn unbalanced_building_hours(&self) -> usize {
        self.buildings
            .values()
            .flatten()
            .filter(|hour| !hour.hws_equal_hwr)
            .count()
    }
}

fn building_parameters_from_input(
    calendar: &HourlyCalendar,
    input: ParametersInput,
) -> anyhow::Result<BuildingParameters> {
    let total_steps = calendar.total_steps();
    let (months, setpoints): (Vec<u32>, Vec<f64>) = input
        .dhw_setpoints
        .iter()
        .map(|dhw| (dhw.month, dhw.setpoint))
        .unzip();

    Ok(BuildingParameters::new(
        input.hw_loop_setpoint.expand(total_steps),
        input.hw_supply_losses,
        input.chw_loop_setpoint.expand(total_steps),
        input.chw_supply_losses,
        input.chw_delta_t_max,
        input.chw_delta_t_min,
        HotWaterLookupTable::new(input.hhw_supply_temps, input.hhw_return_temps),
        input.hhw_building_setpoint.expand(total_steps),
        DhwSetpointSchedule::new(months, setpoints)?,
        calendar.timestamps(),
        input.dhw_max_approach,
        input.dhw_min_approach,
        input.hw_return_losses,
    )?)
}

fn peak_load(load: &[f64]) -> f64 {
    max_of_series(load, 0.)
}

fn building_from_input(
    parameters: Arc<BuildingParameters>,
    input: BuildingInput,
) -> anyhow::Result<Building> {
    let chw_max_load = input
        .chw_max_load
        .unwrap_or_else(|| peak_load(&input.cooling_load));
    let dhw_max_load = input
        .dhw_max_load
        .unwrap_or_else(|| peak_load(&input.dhw_load));
    let time_stamp = parameters.building_date().to_vec();

    Building::new(
        parameters,
        input.id,
        input.name.clone(),
        input.cooling_load,
        input.heating_load,
        input.dhw_load,
        time_stamp,
        chw_max_load,
        dhw_max_load,
        input.dhw_load_min_approach,
    )
    .map_err(|error| anyhow!("Building '{}' ({}): {error}", input.name, input.id))
}

fn cup_inputs(
    plant: &PlantInput,
    district: &[DistrictHourResult],
    parameters: &BuildingParameters,
    total_steps: usize,
) -> CupInputs {
    let hw_district_setpoint = match &plant.hw_district_setpoint {
        Some(setpoint) => setpoint.expand(total_steps),
        None => parameters.hw_loop_setpoint().to_vec(),
    };
    let chw_district_setpoint = match &plant.chw_district_setpoint {
        Some(setpoint) => setpoint.expand(total_steps),
        None => parameters.chw_loop_setpoint().to_vec(),
    };

    CupInputs {
        district_hwrt: district.iter().map(|hour| hour.district_hwrt).collect_vec(),
        district_chwrt: district.iter().map(|hour| hour.district_chwrt).collect_vec(),
        district_hws_flow: district.iter().map(|hour| hour.district_hws_flow).collect_vec(),
        district_chws_flow: district
            .iter()
            .map(|hour| hour.district_chws_flow)
            .collect_vec(),
        hw_district_setpoint,
        chw_district_setpoint,
        hp_hw_gpm: plant.hp_hw_gpm.expand(total_steps),
        hp_chwst: plant.hp_chwst.expand(total_steps),
        hp_chw_gpm: plant.hp_chw_gpm.expand(total_steps),
        tes_h_temp_out: plant.tes_h_temp_out.expand(total_steps),
        tes_h_flow_out: plant.tes_h_flow_out.expand(total_steps),
        tes_h_flow_in: plant.tes_h_flow_in.expand(total_steps),
        tes_c_temp_out: plant.tes_c_temp_out.expand(total_steps),
        tes_c_flow_out: plant.tes_c_flow_out.expand(total_steps),
        tes_c_flow_in: plant.tes_c_flow_in.expand(total_steps),
        boiler_hw_gpm: plant.boiler_hw_gpm.expand(total_steps),
        chiller_chws_gpm: plant.chiller_chws_gpm.expand(total_steps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ingest_for_processing;
    use crate::input::tests::{project_json, schedule_json};
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::{json, Value};
    use std::io::Cursor;

    fn input_from(value: Value) -> Input {
        ingest_for_processing(Cursor::new(value.to_string())).unwrap()
    }

    fn plant_json() -> Value {
        json!({
            "hp_hw_gpm": 10.0,
            "hp_chwst": 44.0,
            "hp_chw_gpm": 5.0,
            "tes_h_temp_out": 150.0,
            "tes_h_flow_out": 0.0,
            "tes_h_flow_in": 0.0,
            "tes_c_temp_out": 40.0,
            "tes_c_flow_out": 0.0,
            "tes_c_flow_in": 0.0,
            "boiler_hw_gpm": 20.0,
            "chiller_chws_gpm": 6.0
        })
    }

    #[rstest]
    fn should_run_buildings_district_and_load_shift() {
        let corpus =
            Corpus::from_inputs(input_from(project_json()), None, None, &ProjectFlags::empty())
                .unwrap();
        let results = corpus.run().unwrap();

        assert_eq!(results.buildings.keys().copied().collect_vec(), vec![101, 102]);
        assert!(results.buildings.values().all(|hours| hours.len() == 48));
        assert_eq!(results.district.len(), 48);
        assert_eq!(results.load_shift.len(), 48);
        assert!(results.cup.is_none());
        assert_eq!(
            results.district[0].district_hws_flow,
            results.buildings[&101][0].district_hws_flow.unwrap()
                + results.buildings[&102][0].district_hws_flow.unwrap()
        );
        assert_eq!(results.unbalanced_building_hours(), 0);
    }

    #[rstest]
    fn should_use_peak_load_when_design_load_is_not_given() {
        let mut project = project_json();
        project["buildings"][0]["chw_max_load"] = Value::Null;
        let mut cooling_load = vec![30_000.0; 48];
        cooling_load[5] = 120_000.0;
        project["buildings"][0]["cooling_load"] = json!(cooling_load);
        let corpus =
            Corpus::from_inputs(input_from(project), None, None, &ProjectFlags::empty()).unwrap();
        let results = corpus.run().unwrap();

        let peak_hour = &results.buildings[&101][5];
        assert_relative_eq!(
            peak_hour.chwrt - peak_hour.loop_chwst,
            16.,
            max_relative = 1e-9
        );
    }

    #[rstest]
    fn should_balance_plant_when_telemetry_is_given() {
        let mut project = project_json();
        project["plant"] = plant_json();
        let corpus =
            Corpus::from_inputs(input_from(project), None, None, &ProjectFlags::empty()).unwrap();
        let results = corpus.run().unwrap();

        let cup = results.cup.unwrap();
        assert_eq!(cup.len(), 48);
        assert_eq!(cup[0].cup_hwr_flow, results.district[0].district_hws_flow);
        assert_eq!(cup[9].hw_charging, results.load_shift[9].hw_charging);
    }

    #[rstest]
    fn should_reject_plant_telemetry_not_matching_calendar() {
        let mut project = project_json();
        project["plant"] = plant_json();
        project["plant"]["hp_hw_gpm"] = json!(vec![10.0; 10]);
        let result =
            Corpus::from_inputs(input_from(project), None, None, &ProjectFlags::empty());

        let error = result.unwrap_err().to_string();
        assert!(error.contains("hp_hw_gpm"));
        assert!(error.contains("length mismatch"));
    }

    #[rstest]
    fn should_reject_district_setpoint_not_matching_calendar() {
        let mut project = project_json();
        project["plant"] = plant_json();
        project["plant"]["chw_district_setpoint"] = json!(vec![42.0; 47]);
        let result =
            Corpus::from_inputs(input_from(project), None, None, &ProjectFlags::empty());

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("chw_district_setpoint"));
    }

    #[rstest]
    fn should_skip_plant_balance_when_flagged() {
        let mut project = project_json();
        project["plant"] = plant_json();
        let corpus = Corpus::from_inputs(
            input_from(project),
            None,
            None,
            &ProjectFlags::SKIP_PLANT_BALANCE,
        )
        .unwrap();

        assert!(corpus.run().unwrap().cup.is_none());
    }

    #[rstest]
    fn should_prefer_given_schedule_over_input_schedule() {
        let hot_tank_schedule: ScheduleTable =
            serde_json::from_value(schedule_json(&[20])).unwrap();
        let corpus = Corpus::from_inputs(
            input_from(project_json()),
            Some(hot_tank_schedule),
            None,
            &ProjectFlags::empty(),
        )
        .unwrap();
        let results = corpus.run().unwrap();

        assert!(results.load_shift[20].hw_charging);
        assert!(!results.load_shift[9].hw_charging);
    }

    #[rstest]
    fn should_require_a_schedule_for_each_tank() {
        let mut project = project_json();
        project.as_object_mut().unwrap().remove("cold_tank_schedule");
        let result =
            Corpus::from_inputs(input_from(project), None, None, &ProjectFlags::empty());

        assert!(result.is_err());
    }

    #[rstest]
    fn should_reject_duplicate_building_ids() {
        let mut project = project_json();
        project["buildings"][1]["id"] = json!(101);
        let result =
            Corpus::from_inputs(input_from(project), None, None, &ProjectFlags::empty());

        assert!(result.is_err());
    }

    #[rstest]
    fn should_reject_building_loads_not_matching_calendar() {
        let mut project = project_json();
        project["buildings"][1]["dhw_load"] = json!(vec![0.0; 47]);
        let result =
            Corpus::from_inputs(input_from(project), None, None, &ProjectFlags::empty());

        let error = result.unwrap_err().to_string();
        assert!(error.contains("Gym"));
        assert!(error.contains("length mismatch"));
    }
}

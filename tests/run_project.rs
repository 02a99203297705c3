use approx::assert_relative_eq;
use chrono::NaiveDate;
use district::core::schedule::ScheduleTable;
use district::errors::DistrictError;
use district::output::Output;
use district::{run_project, summary_rows, ProjectFlags};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::io::{Cursor, Write};
use std::rc::Rc;

/// Keeps every written location in memory so tests can read it back.
#[derive(Clone, Debug, Default)]
struct MemoryOutput {
    files: Rc<RefCell<IndexMap<String, Vec<u8>>>>,
}

impl MemoryOutput {
    fn keys(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }

    fn csv(&self, key: &str) -> String {
        String::from_utf8(self.files.borrow()[key].clone()).unwrap()
    }
}

struct MemoryWriter {
    key: String,
    files: Rc<RefCell<IndexMap<String, Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.files
            .borrow_mut()
            .entry(self.key.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Output for MemoryOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        self.files
            .borrow_mut()
            .insert(location_key.to_string(), vec![]);
        Ok(MemoryWriter {
            key: location_key.to_string(),
            files: self.files.clone(),
        })
    }
}

fn schedule_json(hours_on: &[usize]) -> Value {
    Value::Array(
        (1..=12)
            .map(|month| {
                json!({
                    "month": month,
                    "hours": (0..24)
                        .map(|hour| if hours_on.contains(&hour) { 1 } else { 0 })
                        .collect::<Vec<_>>(),
                    "total": hours_on.len(),
                })
            })
            .collect(),
    )
}

#[fixture]
fn project() -> Value {
    let daily_cooling = (0..48)
        .map(|hour| if hour % 24 < 12 { 20_000.0 } else { 80_000.0 })
        .collect::<Vec<_>>();
    json!({
        "calendar": {"start": "2045-07-01T00:00:00", "hours": 48},
        "parameters": {
            "hw_loop_setpoint": 160.0,
            "hw_supply_losses": -2.0,
            "chw_loop_setpoint": 42.0,
            "chw_supply_losses": 1.0,
            "chw_delta_t_max": 16.0,
            "chw_delta_t_min": 6.0,
            "hhw_supply_temps": [180.0, 160.0, 140.0, 120.0],
            "hhw_return_temps": [40.0, 30.0, 20.0, 10.0],
            "hhw_building_setpoint": 140.0,
            "dhw_setpoints": [
                {"month": 6, "setpoint": 130.0},
                {"month": 7, "setpoint": 135.0}
            ],
            "dhw_max_approach": 15.0,
            "dhw_min_approach": 5.0,
            "hw_return_losses": -1.0
        },
        "buildings": [
            {
                "id": 7,
                "name": "Science Hall",
                "cooling_load": daily_cooling,
                "heating_load": vec![40_000.0; 48],
                "dhw_load": vec![20_000.0; 48],
                "dhw_load_min_approach": 5_000.0
            },
            {
                "id": 9,
                "name": "Dormitory",
                "cooling_load": vec![50_000.0; 48],
                "heating_load": vec![20_000.0; 48],
                "dhw_load": vec![40_000.0; 48],
                "chw_max_load": 100_000.0,
                "dhw_max_load": 60_000.0,
                "dhw_load_min_approach": 5_000.0
            }
        ],
        "hot_tank_schedule": schedule_json(&[1, 2, 3]),
        "cold_tank_schedule": schedule_json(&[22, 23]),
        "plant": {
            "hp_hw_gpm": 2.0,
            "hp_chwst": 42.0,
            "hp_chw_gpm": 4.0,
            "tes_h_temp_out": 150.0,
            "tes_h_flow_out": 0.5,
            "tes_h_flow_in": 0.5,
            "tes_c_temp_out": 40.0,
            "tes_c_flow_out": 1.0,
            "tes_c_flow_in": 1.0,
            "boiler_hw_gpm": 3.0,
            "chiller_chws_gpm": 5.0
        }
    })
}

fn run(
    project: &Value,
    output: &MemoryOutput,
    flags: ProjectFlags,
) -> Result<district::RunResults, DistrictError> {
    run_project(
        Cursor::new(project.to_string()),
        output.clone(),
        None,
        None,
        &flags,
    )
}

#[rstest]
fn should_write_district_cup_and_summary_tables(project: Value) {
    let output = MemoryOutput::default();
    let results = run(&project, &output, ProjectFlags::empty()).unwrap();

    assert_eq!(output.keys(), vec!["district", "cup", "summary"]);

    let district = output.csv("district");
    let mut lines = district.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Time Stamp,Total Space Heating Load (Btu/h),Total DHW Load (Btu/h),\
         District HWS Flow (gpm),District HWRT (°F),District CHWS Flow (gpm),\
         District CHWRT (°F),Total Heating Load (Btu/h),Total Cooling Load (Btu/h)"
    );
    assert_eq!(lines.count(), 48);
    assert_eq!(results.district.len(), 48);

    let cup = output.csv("cup");
    let header = cup.lines().next().unwrap();
    assert!(header.starts_with("Time Stamp,Cooling Shortfall (Btu/h),Heating Shortfall (Btu/h)"));
    assert!(header.ends_with("CUP CHWST (°F),Max diff between District CHWRT and CUP CHWRT"));
    assert_eq!(results.cup.as_ref().map(|cup| cup.len()), Some(48));
}

#[rstest]
fn should_project_each_day_onto_charging_window(project: Value) {
    let results = run(&project, &MemoryOutput::default(), ProjectFlags::empty()).unwrap();

    let day_0_cooling: f64 = results.district[..24]
        .iter()
        .map(|hour| hour.total_cooling_load)
        .sum();
    let window_cooling: f64 = results.district[22..24]
        .iter()
        .map(|hour| hour.total_cooling_load)
        .sum();

    let first_hour = &results.load_shift[0];
    assert_eq!(first_hour.shift_count, 181);
    assert_eq!(first_hour.predicted_day_cooling, day_0_cooling);
    assert_eq!(first_hour.predicted_day_cooling_shift, window_cooling);
    assert!(first_hour.predicted_day_cooling_shift > 0.);
    assert!(results.load_shift[23].chw_charging);
    assert!(!results.load_shift[21].chw_charging);
}

#[rstest]
fn should_write_building_results_when_flagged(project: Value) {
    let output = MemoryOutput::default();
    run(&project, &output, ProjectFlags::BUILDING_RESULTS).unwrap();

    assert_eq!(
        output.keys(),
        vec!["buildings_7", "buildings_9", "district", "cup", "summary"]
    );
    let building = output.csv("buildings_9");
    assert!(building
        .lines()
        .next()
        .unwrap()
        .starts_with("caan_no,Time Stamp,"));
    assert!(building.lines().nth(1).unwrap().starts_with("9,2045-07-01T00:00:00,"));
}

#[rstest]
fn should_write_load_shift_columns_only_without_plant_balance(project: Value) {
    let output = MemoryOutput::default();
    let results = run(&project, &output, ProjectFlags::SKIP_PLANT_BALANCE).unwrap();

    assert!(results.cup.is_none());
    let cup = output.csv("cup");
    let header = cup.lines().next().unwrap();
    assert!(header.starts_with("Time Stamp,Hot Load Shift Charging"));
    assert!(header.ends_with("Predicted Cooling Load in Load Shift Window (Btu/h)"));
}

#[rstest]
fn should_summarise_district_loads(project: Value) {
    let output = MemoryOutput::default();
    run(&project, &output, ProjectFlags::empty()).unwrap();

    let summary = output.csv("summary");
    let metrics = summary
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        metrics,
        vec![
            "Total Heating Load (Btu/h)",
            "Total Cooling Load (Btu/h)",
            "Daily Heating Load (Btu)",
            "Daily Cooling Load (Btu)",
            "Heating Shortfall (Btu/h)",
            "Cooling Shortfall (Btu/h)",
            "Unbalanced Building Hours",
        ]
    );
    assert!(summary
        .lines()
        .last()
        .unwrap()
        .starts_with("Unbalanced Building Hours,,,,0"));
}

#[rstest]
fn should_use_schedule_given_in_place_of_project_schedule(project: Value) {
    let csv = {
        let header = ["Month".to_string()]
            .into_iter()
            .chain((0..24).map(|hour| hour.to_string()))
            .chain(["Total".to_string()])
            .collect::<Vec<_>>()
            .join(",");
        let rows = (1..=12)
            .map(|month| {
                let hours = (0..24)
                    .map(|hour| if hour == 12 { "1" } else { "0" })
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{month},{hours},1")
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("{header}\n{rows}\n")
    };
    let cold_tank_schedule = ScheduleTable::from_csv(Cursor::new(csv)).unwrap();

    let results = run_project(
        Cursor::new(project.to_string()),
        MemoryOutput::default(),
        None,
        Some(cold_tank_schedule),
        &ProjectFlags::empty(),
    )
    .unwrap();

    assert!(results.load_shift[12].chw_charging);
    assert!(!results.load_shift[23].chw_charging);
}

#[rstest]
fn should_reject_invalid_project_as_invalid_request(mut project: Value) {
    project["buildings"][0]["heating_load"] = json!(vec![0.0; 10]);
    let result = run(&project, &MemoryOutput::default(), ProjectFlags::empty());

    assert!(matches!(result, Err(DistrictError::InvalidRequest(_))));
}

#[rstest]
fn should_reject_short_plant_telemetry_before_running(mut project: Value) {
    project["plant"]["hp_hw_gpm"] = json!(vec![2.0; 10]);
    let output = MemoryOutput::default();
    let result = run(&project, &output, ProjectFlags::empty());

    match result {
        Err(DistrictError::InvalidRequest(error)) => {
            assert!(error.to_string().contains("hp_hw_gpm"))
        }
        other => panic!("expected an invalid request, got {other:?}"),
    }
    assert!(output.keys().is_empty());
}

#[rstest]
fn should_total_daily_loads_by_calendar_day_when_starting_mid_day(mut project: Value) {
    project["calendar"]["start"] = json!("2045-07-01T12:00:00");
    let heating_load = (0..48)
        .map(|hour| if hour < 24 { 40_000.0 } else { 80_000.0 })
        .collect::<Vec<_>>();
    project["buildings"][0]["heating_load"] = json!(heating_load);
    project["buildings"][1]["heating_load"] = json!(heating_load);

    let results = run(&project, &MemoryOutput::default(), ProjectFlags::empty()).unwrap();

    let mut calendar_days: IndexMap<NaiveDate, f64> = IndexMap::new();
    for hour in &results.district {
        *calendar_days.entry(hour.time_stamp.date()).or_default() += hour.total_heating_load;
    }
    assert_eq!(calendar_days.len(), 3);
    let busiest_day = calendar_days.values().copied().fold(0., f64::max);

    let daily_heating = summary_rows(&results)
        .into_iter()
        .find(|row| row.metric == "Daily Heating Load (Btu)")
        .unwrap();
    assert_relative_eq!(daily_heating.peak.unwrap(), busiest_day, max_relative = 1e-9);
    assert_relative_eq!(
        daily_heating.mean.unwrap(),
        daily_heating.total / 3.,
        max_relative = 1e-9
    );
    assert_eq!(
        results.load_shift[12].predicted_day_heating,
        calendar_days[1]
    );
}

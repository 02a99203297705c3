use clap::Parser;
use district::core::schedule::ScheduleTable;
use district::output::FileOutput;
use district::{run_project, summary_rows, ProjectFlags};
use std::ffi::OsStr;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser, Default, Debug)]
#[clap(author, version, about, long_about = None)]
struct DistrictArgs {
    input_file: String,
    #[arg(
        long,
        help = "Path to hot tank charging schedule in .csv format (Month, 0-23, Total columns)"
    )]
    hot_tank_schedule: Option<String>,
    #[arg(
        long,
        help = "Path to cold tank charging schedule in .csv format (Month, 0-23, Total columns)"
    )]
    cold_tank_schedule: Option<String>,
    #[clap(
        long,
        default_value_t = false,
        help = "Output hourly results for each building"
    )]
    building_results: bool,
    #[clap(
        long,
        default_value_t = false,
        help = "Report load shift columns only, without balancing the central plant"
    )]
    skip_plant_balance: bool,
    #[clap(long, short, default_value_t = false, help = "Log debug detail")]
    verbose: bool,
    #[clap(long, default_value_t = false, help = "Whether to log out spans")]
    log_spans: bool,
}

fn main() -> anyhow::Result<()> {
    let args = DistrictArgs::parse();

    // set up basic tracing
    let tracing_subscriber = {
        let max_level = if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };
        let mut builder = tracing_subscriber::fmt::fmt().with_max_level(max_level);

        if args.log_spans {
            builder = builder.with_span_events(FmtSpan::CLOSE);
        }

        builder.finish()
    };
    tracing::subscriber::set_global_default(tracing_subscriber)
        .expect("setting tracing subscriber failed");

    let input_file = args.input_file.as_str();
    let input_file_ext = Path::new(input_file).extension().and_then(OsStr::to_str);
    let input_file_stem = match input_file_ext {
        Some(ext) => &input_file[..(input_file.len() - ext.len() - 1)],
        None => input_file,
    };
    let input_file_stem = PathBuf::from(input_file_stem);

    let mut output_path = PathBuf::new();
    output_path.push(format!("{}__results", input_file_stem.display()));
    fs::create_dir_all(&output_path)?;
    let input_file_name = input_file_stem
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("district");
    let file_output = FileOutput::new(output_path, format!("{input_file_name}__{{}}.csv"));

    let hot_tank_schedule = read_schedule(args.hot_tank_schedule.as_deref())?;
    let cold_tank_schedule = read_schedule(args.cold_tank_schedule.as_deref())?;

    let project_flags = (&args).into();

    let results = run_project(
        BufReader::new(File::open(Path::new(input_file))?),
        &file_output,
        hot_tank_schedule,
        cold_tank_schedule,
        &project_flags,
    )?;

    for row in summary_rows(&results) {
        info!(
            metric = %row.metric,
            peak = ?row.peak,
            mean = ?row.mean,
            total = row.total,
            "Summary"
        );
    }

    Ok(())
}

fn read_schedule(path: Option<&str>) -> anyhow::Result<Option<ScheduleTable>> {
    path.map(|path| -> anyhow::Result<ScheduleTable> {
        Ok(ScheduleTable::from_csv(BufReader::new(File::open(path)?))?)
    })
    .transpose()
}

impl From<&DistrictArgs> for ProjectFlags {
    fn from(args: &DistrictArgs) -> Self {
        let mut flags = ProjectFlags::empty();
        if args.building_results {
            flags.insert(ProjectFlags::BUILDING_RESULTS);
        }
        if args.skip_plant_balance {
            flags.insert(ProjectFlags::SKIP_PLANT_BALANCE);
        }

        flags
    }
}

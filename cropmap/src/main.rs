use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cropmap::boundary::{FrameSource, JsonDetector, PrestitchedRow};
use cropmap::config::Config;
use cropmap::ops;
use fieldstore::Store;
use survey::{AggregateParams, GpsFix, RunParams};

#[derive(Parser)]
#[command(about = "Crop and weed mapping from field survey imagery")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "cropmap.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate a surveyed row into a geo-referenced run
    MakeRun {
        /// Directory with the sampled video frames
        #[arg(long)]
        frames: PathBuf,
        /// Directory with the stitched mosaics and their offset file
        #[arg(long)]
        stitched: PathBuf,
        /// Field the row belongs to
        #[arg(long)]
        field: String,
        /// Crop grown on the field
        #[arg(long, default_value = "gras")]
        crop: String,
        /// GPS fix of the row start, as LAT,LON
        #[arg(long)]
        start: GpsFix,
        /// GPS fix of the row end, as LAT,LON
        #[arg(long)]
        end: GpsFix,
    },
    /// Diff two runs of the same field
    CompareRuns {
        run_a: String,
        run_b: String,
        /// Match radius in centimeters
        #[arg(long, default_value_t = 200.0)]
        delta_cm: f64,
    },
    /// List stored runs
    ListRuns {
        #[arg(long)]
        field: Option<String>,
    },
    /// List known fields
    ListFields,
    /// List known crops
    ListCrops,
    /// Delete a run and everything derived from it
    DeleteRun { run_id: String },
    /// Import field parcels from a GeoJSON export
    ImportFields { path: PathBuf },
    /// Write a run's detections as GeoJSON
    ExportRun {
        run_id: String,
        /// Output file, stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the stored comparison of two runs
    ShowComparison { run_a: String, run_b: String },
}

fn main() -> anyhow::Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let mut store = Store::open(&config.paths.database)?;

    match cli.command {
        Command::MakeRun { frames, stitched, field, crop, start, end } => {
            let frames = FrameSource::from_dir(&frames)?;
            let mut stitcher = PrestitchedRow::new(&stitched);
            let mut detector = JsonDetector;
            let run = RunParams { field, crop, start, end };
            let run_id = ops::make_run(
                &mut store,
                &frames,
                &mut stitcher,
                &mut detector,
                &run,
                &config.paths.staging_root,
                AggregateParams::new(config.survey.distance_threshold_px),
            )?;
            println!("{run_id}");
        }
        Command::CompareRuns { run_a, run_b, delta_cm } => {
            let id = ops::compare_runs(&mut store, &run_a, &run_b, delta_cm)?;
            let rows = store.comparison_rows(id)?;
            let count = |category: &str| rows.iter().filter(|r| r.category == category).count();
            println!(
                "comparison {id}: {} stayed, {} removed, {} new",
                count("stayed"),
                count("removed"),
                count("new")
            );
        }
        Command::ListRuns { field } => {
            let runs = match field {
                Some(field) => store.runs_for_field(&field)?,
                None => store.runs()?,
            };
            for run in runs {
                println!("{}\t{}\t{}\t{}", run.run_id, run.date_time, run.field, run.crop);
            }
        }
        Command::ListFields => {
            for field in store.all_fields()? {
                println!("{field}");
            }
        }
        Command::ListCrops => {
            for crop in store.all_crops()? {
                println!("{crop}");
            }
        }
        Command::DeleteRun { run_id } => {
            if !store.delete_run(&run_id)? {
                anyhow::bail!("run {run_id} does not exist");
            }
            log::info!("deleted run {run_id}");
        }
        Command::ImportFields { path } => {
            let imported = store.import_parcels(&path)?;
            println!("imported {} fields, {} crops", imported.fields, imported.crops);
        }
        Command::ExportRun { run_id, out } => {
            let text = export_geojson(&store, &run_id)?;
            match out {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => println!("{text}"),
            }
        }
        Command::ShowComparison { run_a, run_b } => {
            let Some(id) = store.find_compared_run(&run_a, &run_b)? else {
                anyhow::bail!("no stored comparison for {run_a} and {run_b}");
            };
            for row in store.comparison_rows(id)? {
                println!("{}\t{}\t{}", row.category, row.latitude, row.longitude);
            }
        }
    }

    Ok(())
}

fn export_geojson(store: &Store, run_id: &str) -> anyhow::Result<String> {
    if !store.run_exists(run_id)? {
        anyhow::bail!("run {run_id} does not exist");
    }
    let features: Vec<serde_json::Value> = store
        .detections(run_id)?
        .iter()
        .map(|d| {
            serde_json::json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [d.longitude, d.latitude] },
                "properties": { "class": d.class },
            })
        })
        .collect();
    let collection = serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    });
    Ok(serde_json::to_string_pretty(&collection)?)
}

fn setup_logging() {
    simple_log::quick!();
}

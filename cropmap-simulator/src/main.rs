mod field;

use std::fs;
use std::path::Path;

use cropmap::boundary::{FrameSource, JsonDetector, PrestitchedRow, OFFSET_FILE};
use cropmap::ops;
use field::{FieldTruth, Plant};
use fieldstore::Store;
use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use survey::{AggregateParams, BoundingBox, GpsFix, OffsetLedger, RunParams};

const MOSAIC_WIDTH: u32 = 1200;
const MOSAIC_HEIGHT: u32 = 90;
const SHARED_WIDTH: f64 = 250.0;
const BATCHES: usize = 4;

fn main() -> anyhow::Result<()> {
    setup_logging();

    let root = tempfile::tempdir()?;
    log::info!("simulating under {}", root.path().display());
    let mut store = Store::open(&root.path().join("fieldstore.db"))?;
    let mut rng = StdRng::seed_from_u64(7);

    let step = MOSAIC_WIDTH as f64 - SHARED_WIDTH;
    let first_season = FieldTruth::grow(&mut rng, BATCHES, step);
    let second_season = first_season.next_season(&mut rng, BATCHES, step);
    let gone = first_season
        .plants
        .iter()
        .filter(|p| !second_season.plants.contains(p))
        .count();
    let sprouted = second_season
        .plants
        .iter()
        .filter(|p| !first_season.plants.contains(p))
        .count();
    anyhow::ensure!(gone > 0 && sprouted > 0, "second season left the field unchanged");
    log::info!(
        "grew {} plants; season two pulled {gone} weeds and sprouted {sprouted}",
        first_season.plants.len()
    );

    let first_run = survey_pass(root.path(), "pass1", &first_season, &mut rng, &mut store)?;
    let second_run = survey_pass(root.path(), "pass2", &second_season, &mut rng, &mut store)?;
    println!("first run:  {first_run}");
    println!("second run: {second_run}");

    // Plants sit at least 36px (~38cm) apart on the row, so a 25cm radius
    // only ever reaches a plant's own counterpart in the other run.
    let id = ops::compare_runs(&mut store, &first_run, &second_run, 25.0)?;
    let rows = store.comparison_rows(id)?;
    let count = |category: &str| rows.iter().filter(|r| r.category == category).count();
    println!(
        "comparison {id}: {} stayed, {} removed, {} new",
        count("stayed"),
        count("removed"),
        count("new")
    );
    anyhow::ensure!(
        count("stayed") == first_season.plants.len() - gone
            && count("removed") == gone
            && count("new") == sprouted,
        "comparison drifted from the simulated truth"
    );

    Ok(())
}

/// Writes one pass worth of survey artifacts and feeds them through the
/// pipeline.
fn survey_pass(
    root: &Path,
    name: &str,
    truth: &FieldTruth,
    rng: &mut StdRng,
    store: &mut Store,
) -> anyhow::Result<String> {
    let frames_dir = root.join(name).join("frames");
    let stitched_dir = root.join(name).join("stitched");
    fs::create_dir_all(&frames_dir)?;
    fs::create_dir_all(&stitched_dir)?;

    for i in 0..BATCHES * 3 {
        GrayImage::new(640, MOSAIC_HEIGHT).save(frames_dir.join(format!("frame{i}.jpg")))?;
    }

    let mut ledger = OffsetLedger::new();
    for batch in 0..BATCHES {
        let batch_name = format!("batch{batch}.jpg");
        ledger.push(&batch_name, MOSAIC_WIDTH as f64, SHARED_WIDTH);
        let offset = ledger.get(&batch_name)?.offset_px;

        let visible: Vec<&Plant> = truth
            .plants
            .iter()
            .filter(|p| p.x_global >= offset && p.x_global < offset + MOSAIC_WIDTH as f64)
            .collect();

        let mut mosaic = GrayImage::new(MOSAIC_WIDTH, MOSAIC_HEIGHT);
        let mut boxes = Vec::new();
        for plant in visible {
            // Mosaics come out mirrored, so place the plant accordingly. The
            // boxes get a little jitter, like a real model would produce.
            let x = MOSAIC_WIDTH as f64 - (plant.x_global - offset);
            draw_dot(&mut mosaic, x, plant.y);
            boxes.push(BoundingBox {
                x1: x - 12.0 + rng.gen_range(-2.0..2.0),
                y1: plant.y - 12.0 + rng.gen_range(-2.0..2.0),
                x2: x + 12.0 + rng.gen_range(-2.0..2.0),
                y2: plant.y + 12.0 + rng.gen_range(-2.0..2.0),
                confidence: rng.gen_range(0.72..0.98),
                class: plant.class,
            });
        }
        mosaic.save(stitched_dir.join(&batch_name))?;
        fs::write(
            stitched_dir.join(format!("batch{batch}.detections.json")),
            serde_json::to_string_pretty(&boxes)?,
        )?;
    }
    ledger.save(&stitched_dir.join(OFFSET_FILE))?;

    let frames = FrameSource::from_dir(&frames_dir)?;
    let params = RunParams {
        field: "Veld_3".into(),
        crop: "gras".into(),
        start: GpsFix::new(52.0, 4.0),
        end: GpsFix::new(52.00035, 4.00025),
    };
    ops::make_run(
        store,
        &frames,
        &mut PrestitchedRow::new(&stitched_dir),
        &mut JsonDetector,
        &params,
        &root.join("staging"),
        AggregateParams::new(30.0),
    )
}

fn draw_dot(img: &mut GrayImage, x: f64, y: f64) {
    for dx in -1i32..=1 {
        for dy in -1i32..=1 {
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                img.put_pixel(px as u32, py as u32, image::Luma([255u8]));
            }
        }
    }
}

fn setup_logging() {
    simple_log::quick!();
}

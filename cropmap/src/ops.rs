use std::path::Path;

use fieldstore::Store;
use survey::{materialize_run, AggregateParams, BatchAggregator, Detector, RunParams};

use crate::boundary::{FrameSource, StitchedRow, Stitcher};
use crate::staging::StagingDir;

/// Stitches, detects, aggregates and persists one survey pass, returning
/// the new run id. The staging directory lives exactly as long as the call.
pub fn make_run(
    store: &mut Store,
    frames: &FrameSource,
    stitcher: &mut dyn Stitcher,
    detector: &mut dyn Detector,
    run: &RunParams,
    staging_root: &Path,
    params: AggregateParams,
) -> anyhow::Result<String> {
    let staging = StagingDir::create(staging_root)?;
    log::info!("stitching {} frames for field {}", frames.len(), run.field);
    let StitchedRow { mosaics, ledger } = stitcher.stitch(frames, staging.path())?;

    let mut aggregator = BatchAggregator::new(ledger, params);
    for mosaic in &mosaics {
        let boxes = detector.detect(&mosaic.path)?;
        aggregator.process_batch(mosaic, &boxes)?;
    }
    log::info!("aggregated {} detections from {} mosaics", aggregator.point_count(), mosaics.len());

    let run_id = materialize_run(store, &aggregator.finish(), run)?;
    Ok(run_id)
}

/// Diffs two stored runs, replacing any earlier result for the pair.
pub fn compare_runs(
    store: &mut Store,
    run_a: &str,
    run_b: &str,
    delta_cm: f64,
) -> anyhow::Result<i64> {
    Ok(survey::compare_runs(store, run_a, run_b, delta_cm)?)
}

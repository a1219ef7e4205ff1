use fieldstore::{DetectionRow, Store};

use crate::aggregate::AggregateOutput;
use crate::error::SurveyError;
use crate::track::{GpsFix, TrackProjector};

/// Everything a run needs besides imagery: where it was flown and what
/// grows there.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub field: String,
    pub crop: String,
    pub start: GpsFix,
    pub end: GpsFix,
}

/// Projects the aggregated cloud onto the survey track and persists it as
/// a new run. Nothing is stored when projection fails.
pub fn materialize_run(
    store: &mut Store,
    output: &AggregateOutput,
    params: &RunParams,
) -> Result<String, SurveyError> {
    let projector = TrackProjector::new(params.start, params.end, output.chain_width_px)?;
    let rows: Vec<DetectionRow> = projector
        .project(&output.points)
        .into_iter()
        .map(|g| DetectionRow { latitude: g.latitude, longitude: g.longitude, class: g.class })
        .collect();

    let run_id = store.create_run_id()?;
    store.insert_run(&run_id, &params.field, &params.crop, &rows)?;
    log::info!("stored run {run_id} for field {} with {} detections", params.field, rows.len());
    Ok(run_id)
}

use nalgebra::Vector2;

use crate::detection::BoundingBox;
use crate::error::SurveyError;
use crate::imagery::Mosaic;
use crate::offsets::OffsetLedger;

/// Pixel shift range scanned when aligning a mosaic against the cloud.
const SEARCH_RANGE_PX: i32 = 200;
const SEARCH_STEP_PX: i32 = 5;

#[derive(Debug, Clone)]
pub struct AggregateParams {
    pub distance_threshold_px: f64,
    pub search_range_px: i32,
    pub search_step_px: i32,
}

impl AggregateParams {
    pub fn new(distance_threshold_px: f64) -> AggregateParams {
        AggregateParams {
            distance_threshold_px,
            search_range_px: SEARCH_RANGE_PX,
            search_step_px: SEARCH_STEP_PX,
        }
    }
}

/// One deduplicated detection in run-global pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedPoint {
    pub position: Vector2<f64>,
    pub class: i64,
}

pub struct AggregateOutput {
    pub points: Vec<CombinedPoint>,
    pub chain_width_px: f64,
    pub max_height_px: f64,
    pub batches: usize,
}

/// Merges per-mosaic detections into one run-global point cloud.
///
/// Mosaics must be fed in chain order: the shift search and the duplicate
/// test for mosaic `i` both run against the cloud built from mosaics `< i`.
pub struct BatchAggregator {
    ledger: OffsetLedger,
    params: AggregateParams,
    points: Vec<CombinedPoint>,
    chain_width_px: f64,
    max_height_px: f64,
    batches: usize,
}

impl BatchAggregator {
    pub fn new(ledger: OffsetLedger, params: AggregateParams) -> BatchAggregator {
        BatchAggregator {
            ledger,
            params,
            points: Vec::new(),
            chain_width_px: 0.0,
            max_height_px: 0.0,
            batches: 0,
        }
    }

    /// Reads the mosaic dimensions from disk and folds its detections in.
    pub fn process_batch(
        &mut self,
        mosaic: &Mosaic,
        boxes: &[BoundingBox],
    ) -> Result<(), SurveyError> {
        let (width, height) = mosaic.dimensions()?;
        self.add_batch(&mosaic.name, width as f64, height as f64, boxes)
    }

    pub fn add_batch(
        &mut self,
        batch: &str,
        width_px: f64,
        height_px: f64,
        boxes: &[BoundingBox],
    ) -> Result<(), SurveyError> {
        let record = self.ledger.get(batch)?;
        let (offset, shared) = (record.offset_px, record.shared_width_px);

        // Mosaics are stitched right-to-left, so mirror x before placing the
        // center on the global axis. Centers within the shared edge were
        // already covered by the previous mosaic.
        let mut centers = Vec::new();
        for b in boxes.iter().filter(|b| b.qualifies()) {
            let local = b.center();
            let flipped_x = width_px - local.x;
            if self.batches > 0 && flipped_x > width_px - shared {
                continue;
            }
            centers.push((Vector2::new(flipped_x + offset, local.y), b.class));
        }

        let shift = self.best_shift(&centers);
        let mut kept = 0;
        for (center, class) in centers.iter() {
            let adjusted = Vector2::new(center.x + shift, center.y);
            if !self.is_duplicate(&adjusted) {
                self.insert_point(adjusted, *class);
                kept += 1;
            }
        }
        log::debug!(
            "batch {batch}: kept {kept} of {} detections at shift {shift}",
            boxes.len()
        );

        self.chain_width_px = self.chain_width_px.max(offset + width_px);
        self.max_height_px = self.max_height_px.max(height_px);
        self.batches += 1;
        Ok(())
    }

    /// Scans shifts over the search range and keeps the one colliding with
    /// the fewest existing points. Ties go to the first candidate scanned,
    /// so an empty cloud always yields the range minimum.
    fn best_shift(&self, centers: &[(Vector2<f64>, i64)]) -> f64 {
        let mut best_shift = -self.params.search_range_px;
        let mut best_count = usize::MAX;
        for shift in (-self.params.search_range_px..=self.params.search_range_px)
            .step_by(self.params.search_step_px as usize)
        {
            let count = centers
                .iter()
                .filter(|(c, _)| self.is_duplicate(&Vector2::new(c.x + shift as f64, c.y)))
                .count();
            if count < best_count {
                best_count = count;
                best_shift = shift;
            }
        }
        best_shift as f64
    }

    fn is_duplicate(&self, candidate: &Vector2<f64>) -> bool {
        let threshold = self.params.distance_threshold_px;
        self.points
            .iter()
            .any(|p| (p.position - candidate).norm_squared() <= threshold * threshold)
    }

    fn insert_point(&mut self, position: Vector2<f64>, class: i64) {
        self.points.push(CombinedPoint { position, class });
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn finish(self) -> AggregateOutput {
        AggregateOutput {
            points: self.points,
            chain_width_px: self.chain_width_px,
            max_height_px: self.max_height_px,
            batches: self.batches,
        }
    }
}

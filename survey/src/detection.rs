use std::path::Path;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Detections at or below this confidence are dropped before aggregation.
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

/// One detected plant in mosaic pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
    pub class: i64,
}

impl BoundingBox {
    pub fn center(&self) -> Vector2<f64> {
        Vector2::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn qualifies(&self) -> bool {
        self.confidence > CONFIDENCE_THRESHOLD
    }
}

/// Source of per-mosaic detections, detached from any particular model.
pub trait Detector {
    fn detect(&mut self, image: &Path) -> anyhow::Result<Vec<BoundingBox>>;
}

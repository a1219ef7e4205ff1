mod aggregate;
mod compare;
mod detection;
mod error;
mod imagery;
mod offsets;
mod runs;
mod track;

pub use aggregate::{AggregateOutput, AggregateParams, BatchAggregator, CombinedPoint};
pub use compare::{classify, compare_runs, ComparisonCategory, RunDiff};
pub use detection::{BoundingBox, Detector};
pub use error::SurveyError;
pub use imagery::Mosaic;
pub use offsets::{natural_cmp, OffsetLedger, OffsetRecord};
pub use runs::{materialize_run, RunParams};
pub use track::{GeoPoint, GpsFix, TrackProjector};

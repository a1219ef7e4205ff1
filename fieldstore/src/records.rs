/// One geo-tagged detection row of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRow {
    pub latitude: f64,
    pub longitude: f64,
    pub class: i64,
}

/// A run joined with its field and crop names.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub run_id: String,
    pub date_time: String,
    pub field: String,
    pub crop: String,
}

/// One classified detection of a stored comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub latitude: f64,
    pub longitude: f64,
    pub category: String,
}

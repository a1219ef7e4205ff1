use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while aggregating, geo-referencing or comparing runs.
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("no offset data for mosaic {batch}")]
    MissingOffsetData { batch: String },
    #[error("cannot read image {}", path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot read offset file {}", path.display())]
    OffsetFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("offset file {} is not valid JSON", path.display())]
    OffsetFileFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("track start and end coincide")]
    InvalidPath,
    #[error("runs {run_a} and {run_b} belong to different fields")]
    FieldMismatch { run_a: String, run_b: String },
    #[error("run {0} does not exist")]
    NoRuns(String),
    #[error(transparent)]
    Store(#[from] fieldstore::StoreError),
}

use std::path::{Path, PathBuf};

use crate::error::SurveyError;

/// One stitched mosaic image on disk.
#[derive(Debug, Clone)]
pub struct Mosaic {
    pub name: String,
    pub path: PathBuf,
}

impl Mosaic {
    pub fn from_path(path: &Path) -> Option<Mosaic> {
        let name = path.file_name()?.to_str()?.to_string();
        Some(Mosaic { name, path: path.to_path_buf() })
    }

    /// Reads (width, height) from the image header without decoding pixels.
    pub fn dimensions(&self) -> Result<(u32, u32), SurveyError> {
        image::image_dimensions(&self.path).map_err(|e| SurveyError::ImageRead {
            path: self.path.clone(),
            source: e,
        })
    }
}

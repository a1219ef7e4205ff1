use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use survey::{natural_cmp, BoundingBox, Detector, Mosaic, OffsetLedger};

/// File the stitching stage writes next to its mosaics.
pub const OFFSET_FILE: &str = "batch_offset.json";

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Ordered video frames feeding one run.
pub struct FrameSource {
    frames: Vec<PathBuf>,
}

impl FrameSource {
    pub fn from_dir(dir: &Path) -> anyhow::Result<FrameSource> {
        let frames = list_images(dir)?;
        if frames.is_empty() {
            bail!("no frames found in {}", dir.display());
        }
        Ok(FrameSource { frames: frames.into_iter().map(|(_, path)| path).collect() })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }
}

/// A stitched chain of mosaics plus the ledger that places them.
pub struct StitchedRow {
    pub mosaics: Vec<Mosaic>,
    pub ledger: OffsetLedger,
}

/// Stitching stage contract: turn frames into a mosaic chain, using the
/// staging directory for scratch files.
pub trait Stitcher {
    fn stitch(&mut self, frames: &FrameSource, staging: &Path) -> anyhow::Result<StitchedRow>;
}

/// Picks up a row an external stitcher already wrote to a directory. The
/// mosaics on disk decide what gets processed; ledger entries without a
/// mosaic only get a warning.
pub struct PrestitchedRow {
    dir: PathBuf,
}

impl PrestitchedRow {
    pub fn new(dir: &Path) -> PrestitchedRow {
        PrestitchedRow { dir: dir.to_path_buf() }
    }
}

impl Stitcher for PrestitchedRow {
    fn stitch(&mut self, _frames: &FrameSource, _staging: &Path) -> anyhow::Result<StitchedRow> {
        let ledger = OffsetLedger::load(&self.dir.join(OFFSET_FILE))?;
        let images = list_images(&self.dir)?;
        if images.is_empty() {
            bail!("no mosaics found in {}", self.dir.display());
        }
        let mosaics: Vec<Mosaic> =
            images.iter().filter_map(|(_, path)| Mosaic::from_path(path)).collect();
        for record in ledger.records() {
            if !mosaics.iter().any(|m| m.name == record.batch) {
                log::warn!("offset entry {} has no mosaic on disk", record.batch);
            }
        }
        Ok(StitchedRow { mosaics, ledger })
    }
}

/// Detector contract satisfied from sidecar files: the model stage writes
/// `<mosaic>.detections.json` next to each mosaic.
pub struct JsonDetector;

impl Detector for JsonDetector {
    fn detect(&mut self, image: &Path) -> anyhow::Result<Vec<BoundingBox>> {
        let path = sidecar_path(image);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("cannot read detections for {}", image.display()))?;
        let boxes = serde_json::from_str(&text)
            .with_context(|| format!("invalid detections in {}", path.display()))?;
        Ok(boxes)
    }
}

fn sidecar_path(image: &Path) -> PathBuf {
    image.with_extension("detections.json")
}

fn list_images(dir: &Path) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut images = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("cannot list {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
        if !IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        images.push((name.to_string(), path.clone()));
    }
    images.sort_by(|a, b| natural_cmp(&a.0, &b.0));
    Ok(images)
}

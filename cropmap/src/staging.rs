use std::path::Path;

use anyhow::Context;
use tempfile::TempDir;

/// Per-run scratch directory under the configured staging root.
///
/// The stitching stage needs exclusive use of its folder, so every run gets
/// a fresh one, removed again when this is dropped.
pub struct StagingDir {
    dir: TempDir,
}

impl StagingDir {
    pub fn create(root: &Path) -> anyhow::Result<StagingDir> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("cannot create staging root {}", root.display()))?;
        let dir = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(root)
            .with_context(|| format!("cannot create staging directory under {}", root.display()))?;
        Ok(StagingDir { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// On-disk snapshot of extracted samples (`data.csv` / `labels.csv`)
use std::path::{Path, PathBuf};

use super::table;
use super::{Dataset, FEATURE_DIM, LABEL_DIM};

pub const FEATURES_FILE: &str = "data.csv";
pub const LABELS_FILE: &str = "labels.csv";

/// CSV cache of a parsed dataset.
///
/// Single writer, single reader; there is no locking.
#[derive(Debug, Clone)]
pub struct TelemetryCache {
    dir: PathBuf,
}

impl TelemetryCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn features_path(&self) -> PathBuf {
        self.dir.join(FEATURES_FILE)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.dir.join(LABELS_FILE)
    }

    /// Load the cached dataset.
    ///
    /// `Ok(None)` means there is no usable cache: a file is missing, a table
    /// is empty or has the wrong width, or the row counts differ.
    pub fn load(&self) -> crate::Result<Option<Dataset>> {
        let features_path = self.features_path();
        let labels_path = self.labels_path();

        if !features_path.is_file() || !labels_path.is_file() {
            return Ok(None);
        }

        let Some(features) = table::read_array(&features_path, FEATURE_DIM)? else {
            return Ok(None);
        };
        let Some(labels) = table::read_array(&labels_path, LABEL_DIM)? else {
            return Ok(None);
        };

        if features.nrows() != labels.nrows() {
            log::warn!(
                "Ignoring cache: {} feature rows vs {} label rows",
                features.nrows(),
                labels.nrows()
            );
            return Ok(None);
        }
        if features.nrows() == 0 {
            log::warn!("Ignoring empty cache in {:?}", self.dir);
            return Ok(None);
        }

        Dataset::new(features, labels).map(Some)
    }

    /// Overwrite both cache files with `dataset`
    pub fn save(&self, dataset: &Dataset) -> crate::Result<()> {
        log::info!("Saving {} samples to {:?}", dataset.len(), self.dir);
        table::write_array(self.features_path(), dataset.features())?;
        table::write_array(self.labels_path(), dataset.labels())?;
        Ok(())
    }
}

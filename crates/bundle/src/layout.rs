use datamarket_types::{DataFrequency, DatasetId};
use std::path::{Path, PathBuf};

use crate::{BundleError, Result};

pub const DATA_FILE: &str = "data.parquet";

/// Where bundles, locks and temp bundles live on disk
///
/// ```text
/// <root>/<dataset>/<frequency>/data.parquet   bundle
/// <root>/<dataset>/.<frequency>.lock          merge lock
/// <root>/<dataset>/.staging-<uuid>/           merge output before rename
/// <temp_root>/bundle-<uuid>/data.parquet      temp bundle
/// ```
#[derive(Debug, Clone)]
pub struct BundleLayout {
    root: PathBuf,
    temp_root: PathBuf,
}

impl BundleLayout {
    pub fn new(root: impl Into<PathBuf>, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp_root: temp_root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// The dataset's directory; names that would escape the root are refused
    pub fn dataset_dir(&self, dataset: &DatasetId) -> Result<PathBuf> {
        let name = dataset.as_str();
        if name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(BundleError::InvalidDatasetName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    pub fn bundle_dir(&self, dataset: &DatasetId, frequency: DataFrequency) -> Result<PathBuf> {
        Ok(self.dataset_dir(dataset)?.join(frequency.as_str()))
    }

    pub fn data_file(&self, dataset: &DatasetId, frequency: DataFrequency) -> Result<PathBuf> {
        Ok(self.bundle_dir(dataset, frequency)?.join(DATA_FILE))
    }

    pub fn lock_file(&self, dataset: &DatasetId, frequency: DataFrequency) -> Result<PathBuf> {
        Ok(self
            .dataset_dir(dataset)?
            .join(format!(".{}.lock", frequency.as_str())))
    }

    pub fn staging_dir(&self, dataset: &DatasetId) -> Result<PathBuf> {
        Ok(self
            .dataset_dir(dataset)?
            .join(format!(".staging-{}", uuid::Uuid::new_v4())))
    }

    pub fn new_temp_dir(&self) -> PathBuf {
        self.temp_root
            .join(format!("bundle-{}", uuid::Uuid::new_v4()))
    }

    /// Frequencies that currently hold a bundle for `dataset`
    pub fn frequencies(&self, dataset: &DatasetId) -> Result<Vec<DataFrequency>> {
        let mut found = Vec::new();
        for frequency in DataFrequency::ALL {
            if self.data_file(dataset, frequency)?.is_file() {
                found.push(frequency);
            }
        }
        Ok(found)
    }
}

/// True when `dir` is missing or has no entries
pub(crate) fn is_empty_dir(dir: &Path) -> Result<bool> {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

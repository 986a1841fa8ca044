//! Bundle merge engine
//!
//! A temp bundle either becomes the bundle (directory rename) when nothing
//! was ingested for its dataset/frequency before, or is merged with the
//! existing rows. Merged output is written to a staging directory and
//! renamed over the bundle file, so readers see the old or the new file and
//! nothing in between.

use datamarket_types::{DataFrequency, DatasetId};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::layout::{is_empty_dir, DATA_FILE};
use crate::lock::{LockTable, MergeGuard};
use crate::{BundleData, BundleError, BundleLayout, BundleStore, Result, TempBundle};

/// What a merge did to the bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The temp bundle became the bundle
    Installed { bundle: PathBuf },
    /// Rows were merged into an existing bundle
    Merged {
        bundle: PathBuf,
        existing: usize,
        incoming: usize,
        total: usize,
    },
}

impl MergeOutcome {
    pub fn bundle(&self) -> &Path {
        match self {
            Self::Installed { bundle } | Self::Merged { bundle, .. } => bundle,
        }
    }
}

pub struct MergeEngine {
    layout: BundleLayout,
    store: Arc<dyn BundleStore>,
    locks: LockTable,
}

impl MergeEngine {
    pub fn new(layout: BundleLayout, store: Arc<dyn BundleStore>) -> Self {
        Self {
            layout,
            store,
            locks: LockTable::default(),
        }
    }

    pub fn layout(&self) -> &BundleLayout {
        &self.layout
    }

    pub fn store(&self) -> &dyn BundleStore {
        self.store.as_ref()
    }

    /// Stage a downloaded part as a temp bundle
    pub fn extract(&self, part: &Path) -> Result<TempBundle> {
        TempBundle::extract(part, &self.layout, self.store.as_ref())
    }

    /// Install `temp` as the dataset's bundle, or merge it into the existing
    /// one; incoming rows win on shared `(date, symbol)` keys
    ///
    /// Blocks while another merge of the same dataset/frequency is running.
    pub fn merge_or_install(&self, temp: TempBundle, dataset: &DatasetId) -> Result<MergeOutcome> {
        let frequency = temp.frequency();
        let bundle_dir = self.layout.bundle_dir(dataset, frequency)?;
        let data_file = bundle_dir.join(DATA_FILE);

        let lock_path = self.layout.lock_file(dataset, frequency)?;
        let local = self.locks.entry(&lock_path);
        let _guard = MergeGuard::acquire(&local, &lock_path)?;

        if data_file.is_file() {
            self.merge_into(temp, dataset, &data_file)
        } else {
            self.install(temp, dataset, &bundle_dir)
        }
    }

    fn install(
        &self,
        temp: TempBundle,
        dataset: &DatasetId,
        bundle_dir: &Path,
    ) -> Result<MergeOutcome> {
        if bundle_dir.exists() {
            if !is_empty_dir(bundle_dir)? {
                return Err(BundleError::UnexpectedContents(bundle_dir.to_path_buf()));
            }
            std::fs::remove_dir(bundle_dir)?;
        }
        if let Some(parent) = bundle_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if std::fs::rename(temp.dir(), bundle_dir).is_err() {
            // Temp root on another filesystem: copy beside the bundle first so
            // the final step is still a rename.
            let staging = self.layout.staging_dir(dataset)?;
            std::fs::create_dir_all(&staging)?;
            let result = std::fs::copy(temp.data_file(), staging.join(DATA_FILE))
                .map_err(BundleError::from)
                .and_then(|_| std::fs::rename(&staging, bundle_dir).map_err(BundleError::from));
            if result.is_err() {
                let _ = std::fs::remove_dir_all(&staging);
            }
            result?;
        }

        tracing::info!(
            dataset = %dataset,
            frequency = %temp.frequency(),
            bundle = %bundle_dir.display(),
            "Installed new bundle"
        );
        Ok(MergeOutcome::Installed {
            bundle: bundle_dir.to_path_buf(),
        })
    }

    fn merge_into(
        &self,
        temp: TempBundle,
        dataset: &DatasetId,
        data_file: &Path,
    ) -> Result<MergeOutcome> {
        let existing = self.store.read_all(data_file)?;
        let incoming = self.store.read_all(&temp.data_file())?;
        let (existing_rows, incoming_rows) = (existing.len(), incoming.len());

        let merged = existing.merge(incoming)?;
        let total = merged.len();

        let staging = self.layout.staging_dir(dataset)?;
        std::fs::create_dir_all(&staging)?;
        let staged_file = staging.join(DATA_FILE);

        let result = self
            .store
            .write(&staged_file, &merged)
            .and_then(|()| self.store.replace(&staged_file, data_file));
        if let Err(e) = std::fs::remove_dir_all(&staging) {
            tracing::warn!(dir = %staging.display(), error = %e, "Failed to remove staging directory");
        }
        result?;

        tracing::info!(
            dataset = %dataset,
            frequency = %temp.frequency(),
            existing = existing_rows,
            incoming = incoming_rows,
            total,
            "Merged temp bundle"
        );
        Ok(MergeOutcome::Merged {
            bundle: data_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            existing: existing_rows,
            incoming: incoming_rows,
            total,
        })
    }

    /// Read a bundle; `None` if it was never ingested
    pub fn read(&self, dataset: &DatasetId, frequency: DataFrequency) -> Result<Option<BundleData>> {
        let data_file = self.layout.data_file(dataset, frequency)?;
        if !data_file.is_file() {
            return Ok(None);
        }
        self.store.read_all(&data_file).map(Some)
    }

    /// Delete one frequency's bundle, or every bundle of the dataset
    ///
    /// Each bundle directory is removed under its merge lock. Lock files and
    /// the staging area of a merge in flight elsewhere are left alone.
    /// Returns whether anything was removed. Missing bundles are not an error.
    pub fn remove(&self, dataset: &DatasetId, frequency: Option<DataFrequency>) -> Result<bool> {
        let frequencies = match frequency {
            Some(frequency) => vec![frequency],
            None => DataFrequency::ALL.to_vec(),
        };

        let mut removed = false;
        for frequency in frequencies {
            let bundle_dir = self.layout.bundle_dir(dataset, frequency)?;
            if !bundle_dir.exists() {
                continue;
            }
            let lock_path = self.layout.lock_file(dataset, frequency)?;
            let local = self.locks.entry(&lock_path);
            let _guard = MergeGuard::acquire(&local, &lock_path)?;

            match std::fs::remove_dir_all(&bundle_dir) {
                Ok(()) => {
                    tracing::info!(dataset = %dataset, frequency = %frequency, "Removed bundle");
                    removed = true;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }
}

/// Stage and merge one part file in a single step
pub fn merge_part(engine: &MergeEngine, part: &Path, dataset: &DatasetId) -> Result<MergeOutcome> {
    let temp = engine.extract(part)?;
    engine.merge_or_install(temp, dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParquetBundleStore, Row};

    #[test]
    fn test_non_empty_bundle_dir_without_data_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let layout = BundleLayout::new(dir.path().join("bundles"), dir.path().join("tmp"));
        let engine = MergeEngine::new(layout.clone(), Arc::new(ParquetBundleStore));
        let dataset = DatasetId::new("github").unwrap();

        let bundle_dir = layout.bundle_dir(&dataset, DataFrequency::Daily).unwrap();
        std::fs::create_dir_all(&bundle_dir).unwrap();
        std::fs::write(bundle_dir.join("notes.txt"), b"keep me").unwrap();

        let part = dir.path().join("part.parquet");
        let data = BundleData::new(
            DataFrequency::Daily,
            vec!["v".into()],
            vec![Row::new(1, "A", vec![Some(1.0)])],
        )
        .unwrap();
        ParquetBundleStore.write(&part, &data).unwrap();

        let err = merge_part(&engine, &part, &dataset).unwrap_err();
        assert!(matches!(err, BundleError::UnexpectedContents(_)));
        assert!(bundle_dir.join("notes.txt").exists());
    }
}

use datamarket_types::DataFrequency;
use std::path::{Path, PathBuf};

use crate::layout::DATA_FILE;
use crate::{BundleLayout, BundleStore, Result};

/// A downloaded part staged as a bundle directory, ready to merge
///
/// The directory is removed on drop unless the merge engine adopted it.
#[derive(Debug)]
pub struct TempBundle {
    dir: PathBuf,
    frequency: DataFrequency,
    value_columns: Vec<String>,
}

impl TempBundle {
    /// Move `part` into a fresh temp bundle directory and read its header
    pub fn extract(part: &Path, layout: &BundleLayout, store: &dyn BundleStore) -> Result<Self> {
        let dir = layout.new_temp_dir();
        std::fs::create_dir_all(&dir)?;
        let data_file = dir.join(DATA_FILE);

        let staged = move_file(part, &data_file).and_then(|()| store.open(&data_file));
        match staged {
            Ok(header) => {
                tracing::debug!(
                    part = %part.display(),
                    dir = %dir.display(),
                    frequency = %header.frequency,
                    "Extracted temp bundle"
                );
                Ok(Self {
                    dir,
                    frequency: header.frequency,
                    value_columns: header.value_columns,
                })
            }
            Err(e) => {
                let _ = std::fs::remove_dir_all(&dir);
                Err(e)
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn data_file(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    pub fn frequency(&self) -> DataFrequency {
        self.frequency
    }

    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }
}

impl Drop for TempBundle {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to remove temp bundle");
            }
        }
    }
}

/// Rename, falling back to copy and remove across filesystems
pub(crate) fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

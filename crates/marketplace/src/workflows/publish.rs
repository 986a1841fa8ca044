use datamarket_types::{Address, DatasetId};
use std::path::{Path, PathBuf};

use crate::{MarketplaceError, MarketplaceSession, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub dataset: DatasetId,
    pub owner: Address,
    pub files: Vec<PathBuf>,
}

impl MarketplaceSession {
    /// Upload every CSV file in `dir` as the dataset's on-chain owner
    ///
    /// The owner must be one of the configured addresses; its credentials
    /// sign the upload.
    pub async fn publish(&self, dataset: &DatasetId, dir: &Path) -> Result<PublishOutcome> {
        let info = self.registry.provider_info(dataset).await?;
        if !info.is_registered {
            return Err(MarketplaceError::DatasetNotRegistered {
                dataset: dataset.clone(),
            });
        }

        let owner = self
            .addresses
            .find(&info.owner)
            .ok_or_else(|| MarketplaceError::OwnerMismatch {
                dataset: dataset.clone(),
                owner: info.owner,
            })?;

        let files = csv_files(dir)?;
        if files.is_empty() {
            return Err(MarketplaceError::NoFilesFound {
                dir: dir.to_path_buf(),
            });
        }

        let credentials = self.retriever.credentials_for(owner.entry, dataset).await?;
        self.retriever
            .client()
            .publish(dataset, &credentials, &files)
            .await?;

        tracing::info!(dataset = %dataset, owner = %owner.address, files = files.len(), "Published");
        Ok(PublishOutcome {
            dataset: dataset.clone(),
            owner: owner.address,
            files,
        })
    }
}

/// `*.csv` files directly inside `dir`, sorted by name
fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/*.csv", escaped.trim_end_matches('/'));

    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry.map_err(|e| MarketplaceError::Io(e.into_error()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_files_only_matches_csv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), "1").unwrap();
        std::fs::write(dir.path().join("a.csv"), "1").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "1").unwrap();
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files = csv_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_csv_files_in_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(csv_files(&dir.path().join("missing")).unwrap().is_empty());
    }
}

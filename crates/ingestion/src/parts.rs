//! Streaming multipart response reader
//!
//! Each part is written to disk chunk by chunk as it arrives; the whole
//! response is never held in memory.

use bytes::Bytes;
use futures::Stream;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::IngestionError;

/// One file received from the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPart {
    /// Name from the part's `Content-Disposition`
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Lazily yields the parts of a multipart body
pub struct PartStream {
    multipart: multer::Multipart<'static>,
    target_dir: PathBuf,
    received: usize,
}

impl PartStream {
    pub fn new<S, E>(body: S, boundary: String, target_dir: impl Into<PathBuf>) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        Self {
            multipart: multer::Multipart::new(body, boundary),
            target_dir: target_dir.into(),
            received: 0,
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Write the next part to the target directory; `None` once the body ends
    pub async fn next_part(&mut self) -> Result<Option<DownloadedPart>, IngestionError> {
        let Some(mut field) = self.multipart.next_field().await? else {
            return Ok(None);
        };

        let raw_name = field.file_name().unwrap_or_default().to_string();
        let file_name = sanitize_file_name(&raw_name)?;
        let path = self.target_dir.join(&file_name);

        let mut file = tokio::fs::File::create(&path).await?;
        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await? {
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        self.received += 1;
        tracing::debug!(file = %file_name, size, path = %path.display(), "Received part");

        Ok(Some(DownloadedPart {
            file_name,
            path,
            size,
        }))
    }
}

/// Boundary of a `multipart/*` content type, `None` for anything else
pub fn multipart_boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim().to_ascii_lowercase();
    if !mime.starts_with("multipart/") {
        return None;
    }

    params.find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Keep only the final path component of a service-supplied name
fn sanitize_file_name(raw: &str) -> Result<String, IngestionError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(IngestionError::InvalidFilename(raw.to_string()));
    }
    Ok(name.to_string())
}

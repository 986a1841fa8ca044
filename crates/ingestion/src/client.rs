use datamarket_types::{Credentials, DataFrequency, DatasetId};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::parts::{multipart_boundary, PartStream};
use crate::{IngestionError, SignedHeaders};

/// Dataset description sent to the service after on-chain registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetMetadata {
    #[serde(rename = "ds_name")]
    pub dataset: DatasetId,
    pub desc: String,
    pub data_frequency: DataFrequency,
    pub has_history: bool,
    pub has_live: bool,
}

/// HTTP client for the ingestion service
#[derive(Clone)]
pub struct IngestionClient {
    http: reqwest::Client,
    base_url: String,
}

impl IngestionClient {
    /// `timeout` bounds connecting and receiving response headers; streamed
    /// bodies may take longer.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, IngestionError> {
        let http = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /marketplace/register`
    pub async fn register_metadata(
        &self,
        credentials: &Credentials,
        metadata: &DatasetMetadata,
    ) -> Result<(), IngestionError> {
        let headers = SignedHeaders::new(&metadata.dataset, credentials)?.to_header_map()?;

        let response = self
            .http
            .post(self.endpoint("/marketplace/register"))
            .headers(headers)
            .json(metadata)
            .send()
            .await?;

        check_envelope("register", response).await
    }

    /// `POST /marketplace/ingest`, returning the streamed parts
    ///
    /// A response that is not multipart is decoded as the service's error
    /// envelope.
    pub async fn open_ingest(
        &self,
        dataset: &DatasetId,
        credentials: &Credentials,
        target_dir: &Path,
    ) -> Result<PartStream, IngestionError> {
        let headers = SignedHeaders::new(dataset, credentials)?.to_header_map()?;
        tracing::debug!(dataset = %dataset, "Starting dataset download");

        let response = self
            .http
            .post(self.endpoint("/marketplace/ingest"))
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(IngestionError::request_failed(
                "ingest dataset",
                status.as_u16(),
                None,
            ));
        }

        let boundary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(multipart_boundary);

        match boundary {
            Some(boundary) => Ok(PartStream::new(
                response.bytes_stream(),
                boundary,
                target_dir,
            )),
            None => {
                let payload = error_payload(response).await;
                Err(IngestionError::request_failed(
                    "ingest dataset",
                    status.as_u16(),
                    Some(payload),
                ))
            }
        }
    }

    /// `POST /publish` with one `file` form field per path
    pub async fn publish(
        &self,
        dataset: &DatasetId,
        credentials: &Credentials,
        files: &[PathBuf],
    ) -> Result<(), IngestionError> {
        let headers = SignedHeaders::new(dataset, credentials)?.to_header_map()?;

        let mut form = Form::new();
        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let content = tokio::fs::read(path).await?;
            let part = Part::bytes(content)
                .file_name(name)
                .mime_str("text/csv")?;
            form = form.part("file", part);
        }

        tracing::info!(dataset = %dataset, files = files.len(), "Uploading dataset files");
        let response = self
            .http
            .post(self.endpoint("/publish"))
            .headers(headers)
            .multipart(form)
            .send()
            .await?;

        check_envelope("upload file", response).await
    }
}

/// Non-200 status or a JSON body carrying an `error` key is a failure
async fn check_envelope(request: &str, response: reqwest::Response) -> Result<(), IngestionError> {
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(IngestionError::request_failed(request, status.as_u16(), None));
    }

    let body = response.bytes().await?;
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(&body) {
        if let Some(error) = map.get("error") {
            return Err(IngestionError::request_failed(
                request,
                status.as_u16(),
                Some(error.clone()),
            ));
        }
    }
    Ok(())
}

/// Service error body; non-JSON bodies are kept as text
async fn error_payload(response: reqwest::Response) -> Value {
    match response.bytes().await {
        Ok(body) => serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned())),
        Err(e) => Value::String(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_serialises_service_fields() {
        let metadata = DatasetMetadata {
            dataset: DatasetId::new("weather").unwrap(),
            desc: "Weather".to_string(),
            data_frequency: DataFrequency::Daily,
            has_history: true,
            has_live: false,
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["ds_name"], "weather");
        assert_eq!(json["data_frequency"], "daily");
        assert_eq!(json["has_live"], false);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = IngestionClient::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint("/publish"), "http://localhost:5000/publish");
    }
}

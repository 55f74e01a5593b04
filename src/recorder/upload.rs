//! Artifact handoff
//!
//! A finished recording is pushed to object storage through a pre-signed
//! upload URL. Obtaining that URL is the caller's business.

use super::state::RecordingArtifact;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upload failed with status: {0}")]
    Status(u16),

    #[error("Nothing to upload")]
    Empty,
}

/// Destination for finished recordings
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Upload the artifact, returning the URL it can be read back from
    async fn upload(&self, artifact: &RecordingArtifact, name: &str) -> Result<String, UploadError>;
}

/// Uploads with a single PUT to a pre-signed URL
pub struct HttpArtifactUploader {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpArtifactUploader {
    pub fn new(client: reqwest::Client, upload_url: impl Into<String>) -> Self {
        Self {
            client,
            upload_url: upload_url.into(),
        }
    }
}

/// The readable location of an object: the upload URL without its signature
pub fn public_url(upload_url: &str) -> &str {
    upload_url.split('?').next().unwrap_or(upload_url)
}

#[async_trait]
impl ArtifactUploader for HttpArtifactUploader {
    async fn upload(&self, artifact: &RecordingArtifact, name: &str) -> Result<String, UploadError> {
        if artifact.is_empty() {
            return Err(UploadError::Empty);
        }
        tracing::info!(name, size = artifact.size(), "Uploading recording");

        let content_type = artifact
            .mime_type
            .split(';')
            .next()
            .unwrap_or("application/octet-stream");
        let response = self
            .client
            .put(&self.upload_url)
            .header("Content-Type", content_type)
            .header("Content-Length", artifact.size())
            .header("x-ms-blob-type", "BlockBlob")
            .body(artifact.data.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UploadError::Status(response.status().as_u16()));
        }

        tracing::info!(name, "Upload successful");
        Ok(public_url(&self.upload_url).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_strips_signature() {
        assert_eq!(
            public_url("https://store.example.com/rec/a.webm?sv=2024&sig=abc"),
            "https://store.example.com/rec/a.webm"
        );
        assert_eq!(public_url("https://store.example.com/a.webm"), "https://store.example.com/a.webm");
    }

    #[tokio::test]
    async fn test_empty_artifact_is_rejected() {
        let uploader = HttpArtifactUploader::new(reqwest::Client::new(), "http://127.0.0.1:9/upload");
        let artifact = RecordingArtifact {
            data: Vec::new(),
            mime_type: "video/webm".into(),
        };
        assert!(matches!(
            uploader.upload(&artifact, "empty").await,
            Err(UploadError::Empty)
        ));
    }
}

//! HTTP image uploader

use super::ImageUploader;
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const UPLOAD_PATH: &str = "/ihs/monitor/minioFile/upload";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: UploadData,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    access_url: String,
}

/// Multipart upload to the cloud object store gateway
pub struct HttpImageUploader {
    url: String,
    client: Client,
}

impl HttpImageUploader {
    /// `host` is `host[:port]` or a base URL
    pub fn new(host: &str) -> Result<Self> {
        let base = if host.contains("://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host)
        };
        Ok(Self {
            url: format!("{}{}", base, UPLOAD_PATH),
            client: Client::builder().timeout(Duration::from_secs(10)).build()?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, image: Vec<u8>) -> Result<String> {
        let size = image.len();
        let part = Part::bytes(image)
            .file_name("event_image.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part("file", part);

        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upload(format!("{} returned {}", self.url, status)));
        }

        let body = response.text().await?;
        let url = parse_access_url(&body)?;
        tracing::info!(size, url = %url, "Uploaded event image");
        Ok(url)
    }
}

impl ImageUploader for HttpImageUploader {
    fn upload(&self, image: Vec<u8>) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.post(image))
    }
}

fn parse_access_url(body: &str) -> Result<String> {
    let parsed: UploadResponse = serde_json::from_str(body)
        .map_err(|e| Error::Upload(format!("unexpected upload response: {}", e)))?;
    Ok(parsed.data.access_url)
}

//! HTTP utilities
//!
//! One reqwest client shared by the lookup services and the artifact
//! downloader. JSON lookups retry with exponential backoff; downloads stream
//! into a `.part` file that is renamed into place once complete.

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::files::{atomic_rename, create_temp_path, remove_if_exists};
use crate::core::{ClientConfig, FileOperation, PackError, Result};

/// HTTP client with JSON lookup and streaming download support
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| PackError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
                field: None,
                suggestion: None,
            })?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sleep for the configured inter-request delay
    pub async fn pace(&self) {
        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }
    }

    /// GET `url` and decode the JSON body
    ///
    /// `Ok(None)` means the service has nothing for this URL: a 404 or an
    /// empty body. Transport errors, 429 and 5xx are retried.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let body =
            retry_with_backoff(&self.config, url, || self.get_text_once(url, headers)).await?;

        match body {
            None => Ok(None),
            Some(text) if text.trim().is_empty() || text.trim() == "null" => Ok(None),
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| PackError::InvalidResponse {
                    url: url.to_string(),
                    source: e,
                }),
        }
    }

    async fn get_text_once(&self, url: &str, headers: &[(&str, &str)]) -> Result<Option<String>> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PackError::from_reqwest(url, e))?;
        let status = response.status();
        debug!("GET {} -> {}", url, status);

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PackError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| PackError::from_reqwest(url, e))?;
        Ok(Some(text))
    }

    /// Download `url` to `dest_path`, following redirects
    ///
    /// The body is streamed into a sibling `.part` file which replaces the
    /// destination only after the transfer finished; a failed transfer leaves
    /// no partial file behind.
    pub async fn download_to_file(&self, url: &str, dest_path: &Path) -> Result<u64> {
        debug!("Stream downloading: {} to {}", url, dest_path.display());

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PackError::fs(parent, FileOperation::CreateDir, e))?;
        }

        let temp_path = create_temp_path(dest_path);
        let result = self.stream_to(url, &temp_path).await;

        match result {
            Ok(downloaded) => {
                atomic_rename(&temp_path, dest_path).await?;
                debug!("Stream download completed: {} bytes", downloaded);
                Ok(downloaded)
            }
            Err(e) => {
                if let Err(cleanup) = remove_if_exists(&temp_path).await {
                    debug!("Could not remove partial file: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    async fn stream_to(&self, url: &str, temp_path: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .timeout(self.config.download_timeout)
            .send()
            .await
            .map_err(|e| PackError::from_reqwest(url, e))?;

        if !response.status().is_success() {
            return Err(PackError::HttpStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| PackError::fs(temp_path, FileOperation::Create, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| PackError::from_reqwest(url, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| PackError::fs(temp_path, FileOperation::Write, e))?;
            downloaded += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| PackError::fs(temp_path, FileOperation::Write, e))?;
        file.sync_all()
            .await
            .map_err(|e| PackError::fs(temp_path, FileOperation::Write, e))?;

        Ok(downloaded)
    }
}

/// Run `operation` until it succeeds, fails unrecoverably, or retries run out
pub async fn retry_with_backoff<F, T, Fut>(
    config: &ClientConfig,
    url: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_recoverable() => {
                debug!("Error is not recoverable, failing immediately: {}", e);
                return Err(e);
            }
            Err(e) if attempt >= config.max_retries => {
                return Err(PackError::MaxRetriesExceeded {
                    url: url.to_string(),
                    max_retries: config.max_retries,
                    last_error: e.to_string(),
                });
            }
            Err(e) => {
                let delay = config.retry_delay(attempt);
                attempt += 1;
                debug!("Retry attempt {} for {} after {:?} ({})", attempt, url, delay, e);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

use async_trait::async_trait;
use doorwatch_core::ports::ImageSource;
use doorwatch_core::CheckError;
use std::time::Duration;
use tracing::debug;

use crate::transport::{request_error, status_error};

/// IP camera exposing a single JPEG still over HTTP
pub struct HttpCamera {
    client: reqwest::Client,
    url: String,
}

impl HttpCamera {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl ImageSource for HttpCamera {
    async fn fetch(&self) -> Result<Vec<u8>, CheckError> {
        let resp = self.client.get(&self.url).send().await.map_err(|e| request_error("camera", e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(status_error("camera", status));
        }
        let bytes = resp.bytes().await.map_err(|e| request_error("camera", e))?;
        if bytes.is_empty() {
            return Err(CheckError::terminal("camera returned an empty image"));
        }
        debug!(bytes = bytes.len(), "camera still fetched");
        Ok(bytes.to_vec())
    }
}

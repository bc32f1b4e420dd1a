//! Figma REST API クライアント

use super::{AssetFormat, DesignDocument, DesignSource};
use crate::config::Config;
use crate::error::{Result, UiRefineError};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// `GET /v1/images/:key` の応答
#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    err: Option<String>,
    #[serde(default)]
    images: HashMap<String, Option<String>>,
}

pub struct FigmaClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl FigmaClient {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UiRefineError::Config(format!("HTTPクライアント初期化に失敗: {}", e)))?;

        Ok(Self {
            http,
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.get_figma_token()?,
            config.figma_base_url.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        let response = self
            .http
            .get(url)
            .header("X-Figma-Token", &self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| UiRefineError::ApiCall(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(UiRefineError::RateLimited(url.to_string())),
            status if !status.is_success() => Err(UiRefineError::ApiCall(format!("HTTP {}: {}", status.as_u16(), url))),
            _ => Ok(response),
        }
    }
}

#[async_trait]
impl DesignSource for FigmaClient {
    async fn fetch_document(&self, file_key: &str) -> Result<DesignDocument> {
        let url = format!("{}/v1/files/{}", self.base_url, file_key);
        let response = self.get(&url, &[]).await?;
        response
            .json()
            .await
            .map_err(|e| UiRefineError::ApiParse(format!("Figmaファイル: {}", e)))
    }

    async fn image_reference(
        &self,
        file_key: &str,
        node_id: &str,
        format: AssetFormat,
        scale: u32,
    ) -> Result<Option<String>> {
        let url = format!("{}/v1/images/{}", self.base_url, file_key);
        let query = [
            ("ids", node_id.to_string()),
            ("format", format.as_str().to_string()),
            ("scale", scale.to_string()),
        ];
        let response = self.get(&url, &query).await?;
        let parsed: ImagesResponse = response
            .json()
            .await
            .map_err(|e| UiRefineError::ApiParse(format!("Figma画像: {}", e)))?;

        if let Some(err) = parsed.err.filter(|e| !e.is_empty()) {
            return Err(UiRefineError::ApiCall(err));
        }

        Ok(parsed.images.get(node_id).cloned().flatten())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| UiRefineError::AssetDownload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UiRefineError::AssetDownload(format!("HTTP {}", response.status().as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| UiRefineError::AssetDownload(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

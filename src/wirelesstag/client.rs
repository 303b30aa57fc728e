//! Wireless Sensor Tag cloud API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::ApiConfig;
use crate::error::BridgeError;
use crate::models::{normalize_mac, DeviceRecord, TagListResponse};

/// Source of device records for one tag manager
#[async_trait]
pub trait TagSource: Send + Sync {
    /// Fetch the current device list of the manager with the given MAC
    async fn fetch_tag_list(&self, mac: &str) -> Result<Vec<DeviceRecord>, BridgeError>;
}

pub struct TagListClient {
    http_client: Client,
    url: String,
    token: String,
}

impl TagListClient {
    pub fn new(api: &ApiConfig, token: &str) -> Result<Self, BridgeError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .connect_timeout(Duration::from_secs(api.timeout_secs.min(5)))
            .build()?;

        Ok(Self::with_client(http_client, &api.base_url, &api.tag_list_path, token))
    }

    pub fn with_client(http_client: Client, base_url: &str, path: &str, token: &str) -> Self {
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        Self {
            http_client,
            url,
            token: token.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TagSource for TagListClient {
    async fn fetch_tag_list(&self, mac: &str) -> Result<Vec<DeviceRecord>, BridgeError> {
        let resp = self
            .http_client
            .post(&self.url)
            .bearer_auth(&self.token)
            .header("X-Set-Mac", mac)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        let result: TagListResponse = serde_json::from_slice(&body)
            .map_err(|e| BridgeError::DecodeError(format!("tag list: {}", e)))?;

        let wanted = normalize_mac(mac);
        let total = result.d.len();
        let devices: Vec<DeviceRecord> = result
            .d
            .into_iter()
            .filter(|d| {
                d.mac
                    .as_deref()
                    .map(|m| normalize_mac(m) == wanted)
                    .unwrap_or(true)
            })
            .collect();

        tracing::debug!(
            "[TagClient] Fetched tag list for manager {}: {} of {} tags",
            mac,
            devices.len(),
            total
        );

        Ok(devices)
    }
}

// HTTP sensor API client - health probe and record fetch over reqwest
use crate::application::sensor_api::SensorApi;
use crate::domain::channel::ChannelId;
use crate::domain::error::SyncError;
use crate::domain::record::{RawRecord, parse_batch};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpSensorApi {
    client: reqwest::Client,
    base_url: String,
    channel_in_path: bool,
}

impl HttpSensorApi {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        channel_in_path: bool,
        use_system_proxy: bool,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if !use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            channel_in_path,
        })
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    fn data_url(&self, channel: &ChannelId) -> String {
        if self.channel_in_path {
            format!(
                "{}/data/{}",
                self.base_url,
                urlencoding::encode(channel.as_str())
            )
        } else {
            format!("{}/data", self.base_url)
        }
    }
}

#[async_trait]
impl SensorApi for HttpSensorApi {
    async fn probe_health(&self) -> bool {
        match self.client.get(self.health_url()).send().await {
            Ok(response) if response.status().is_success() => {
                // The body is informational only
                if let Ok(body) = response.text().await {
                    if !body.is_empty() {
                        tracing::debug!(body = %body, "API health");
                    }
                }
                true
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "health check returned non-success status");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "health check failed");
                false
            }
        }
    }

    async fn fetch_records(&self, channel: &ChannelId) -> Result<Vec<RawRecord>, SyncError> {
        let url = self.data_url(channel);
        tracing::debug!(url = %url, "fetching records");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SyncError::NetworkUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpError {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("application/json") {
            let shown = if content_type.is_empty() {
                "missing".to_string()
            } else {
                content_type
            };
            return Err(SyncError::InvalidContentType(shown));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::NetworkUnreachable(e.to_string()))?;
        let payload: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| SyncError::InvalidPayloadShape(format!("body is not valid JSON: {}", e)))?;

        let records = parse_batch(payload)?;
        tracing::debug!(channel = %channel, records = records.len(), "fetched records");
        Ok(records)
    }
}

//! HTTP implementation of the snap service.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::Serialize;
use tracing::debug;

use crate::domain::{GpsFix, SnapResult};

use super::SnapService;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the remote snap endpoint.
///
/// One POST per photo; the server does identification, guide generation
/// and narration synthesis in a single call, so the timeout is generous.
pub struct HttpSnapClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct SnapRequest<'a> {
    image_base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gps: Option<GpsFix>,
    locale: &'a str,
}

impl HttpSnapClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl SnapService for HttpSnapClient {
    async fn snap(
        &self,
        image: &[u8],
        gps: Option<GpsFix>,
        locale: &str,
    ) -> Result<SnapResult> {
        let url = format!("{}/snap", self.base_url);
        let body = SnapRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(image),
            gps,
            locale,
        };
        debug!(%url, locale, bytes = image.len(), "posting snap");

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("snap request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("snap endpoint returned {status}: {detail}"));
        }

        let mut result: SnapResult = response
            .json()
            .await
            .context("failed to decode snap response")?;

        // The backend returns audio URLs relative to its own base; the
        // playback adapters need something absolute.
        if let Some(audio) = result.audio.as_mut() {
            if audio.url.starts_with('/') {
                audio.url = format!("{}{}", self.base_url, audio.url);
            }
        }
        debug!(
            landmark = result.primary_landmark_name().unwrap_or("<none>"),
            cached = result.cached,
            "snap resolved"
        );
        Ok(result)
    }
}

//! Network order API client
//!
//! GETs all orders of a campaign window as JSON and hands the payload to the
//! loose extractor. Large responses occasionally arrive cut off; a request
//! whose connection or body read fails, or whose body ends mid-document, is
//! sent once more before giving up. Timeouts and non-2xx answers are final.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

use super::order_extract::extract_orders;
use super::order_source::{FetchError, OrderSource};
use crate::models::remote::{CampaignContext, RemoteOrderRecord};

const USER_AGENT: &str = concat!("ordr-rv/", env!("CARGO_PKG_VERSION"));
const MAX_ATTEMPTS: u32 = 2;
const BODY_PREVIEW_CHARS: usize = 300;

/// HTTP client for the network order API
pub struct NetworkOrderClient {
    http_client: reqwest::Client,
    api_url: String,
}

impl NetworkOrderClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: api_url.into(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn fetch_body(&self, campaign: &CampaignContext) -> Result<(StatusCode, String), reqwest::Error> {
        let from = campaign.from_date.format("%Y-%m-%d").to_string();
        let to = campaign.to_date.format("%Y-%m-%d").to_string();

        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[
                ("campaign_id", campaign.campaign_id.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::ACCEPT_ENCODING, "identity")
            .header(reqwest::header::CONNECTION, "close")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = status.as_u16(), body_bytes = body.len(), "Network API responded");

        Ok((status, body))
    }
}

#[async_trait]
impl OrderSource for NetworkOrderClient {
    async fn fetch_orders(&self, campaign: &CampaignContext) -> Result<Vec<RemoteOrderRecord>, FetchError> {
        let mut last_error = FetchError::Transport("no attempt made".to_string());

        for attempt in 1..=MAX_ATTEMPTS {
            tracing::debug!(
                attempt,
                campaign_id = %campaign.campaign_id,
                url = %self.api_url,
                "Fetching orders from network API"
            );

            let (status, body) = match self.fetch_body(campaign).await {
                Ok(response) => response,
                Err(e) => match map_reqwest_error(e) {
                    FetchError::Transport(reason) => {
                        tracing::warn!(attempt, error = %reason, "Network API request failed, retrying");
                        last_error = FetchError::Transport(reason);
                        continue;
                    }
                    fatal => return Err(fatal),
                },
            };

            if !status.is_success() {
                return Err(FetchError::Transport(format!(
                    "network api status {} | body: {}",
                    status.as_u16(),
                    body_preview(&body)
                )));
            }

            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(payload) => {
                    let orders = extract_orders(&payload);
                    tracing::info!(
                        campaign_id = %campaign.campaign_id,
                        orders = orders.len(),
                        "Orders extracted from network API"
                    );
                    return Ok(orders);
                }
                Err(e) if e.is_eof() => {
                    tracing::warn!(attempt, error = %e, "Truncated JSON from network API, retrying");
                    last_error = FetchError::Transport(format!("json parse error: {}", e));
                }
                Err(e) => return Err(FetchError::Transport(format!("json parse error: {}", e))),
            }
        }

        Err(last_error)
    }
}

fn map_reqwest_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(error.to_string())
    } else {
        FetchError::Transport(error.to_string())
    }
}

fn body_preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

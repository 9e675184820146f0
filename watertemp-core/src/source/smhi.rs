use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{AgentConfig, error::FetchError};

use super::TemperatureSource;

/// Reads the latest observation of one station from the SMHI open data API.
#[derive(Debug, Clone)]
pub struct SmhiSource {
    url: String,
    http: Client,
}

impl SmhiSource {
    pub fn new(api_url: &str, station_id: u32) -> Self {
        Self {
            url: observation_url(api_url, station_id),
            http: Client::new(),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(&config.api_url, config.station_id)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn try_fetch(&self) -> Result<Option<f64>, FetchError> {
        let res = self.http.get(&self.url).send().await?;

        let status = res.status();
        if !status.is_success() {
            // The body is only context for the warning.
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        let body = res.text().await?;
        let parsed: Value = serde_json::from_str(&body)?;

        Ok(latest_value(&parsed))
    }
}

#[async_trait]
impl TemperatureSource for SmhiSource {
    async fn fetch(&self) -> Option<f64> {
        match self.try_fetch().await {
            Ok(Some(temperature)) => {
                debug!(url = %self.url, temperature, "Fetched water temperature");
                Some(temperature)
            }
            Ok(None) => {
                warn!(url = %self.url, "Response contained no latest reading");
                None
            }
            Err(FetchError::Status { status, body }) => {
                warn!(url = %self.url, %status, body = %body, "Failed to fetch water temperature");
                None
            }
            Err(err) => {
                error!(url = %self.url, error = ?err, "Error while fetching water temperature");
                None
            }
        }
    }
}

/// `{api_url}{station_id}/period/latest-day/data.json`, concatenated as is.
pub fn observation_url(api_url: &str, station_id: u32) -> String {
    format!("{api_url}{station_id}/period/latest-day/data.json")
}

/// `value[0].value` of the response body.
///
/// The API sends the reading as a string; plain numbers are accepted too.
fn latest_value(body: &Value) -> Option<f64> {
    let leaf = body.get("value")?.get(0)?.get("value")?;

    let temperature = match leaf {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    temperature.filter(|t| t.is_finite())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

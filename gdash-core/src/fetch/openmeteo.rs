use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::model::WeatherLog;

use super::{FetchError, WeatherFetcher};

/// Source tag stamped into every record this collector produces.
pub const SOURCE: &str = "gdash-collector";

/// Current-weather variables requested from the upstream API.
const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m,weather_code";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches current conditions from the Open-Meteo forecast API and
/// normalizes them into a [`WeatherLog`].
#[derive(Debug, Clone)]
pub struct OpenMeteoFetcher {
    http: Client,
    api_url: String,
    latitude: f64,
    longitude: f64,
    location: String,
    timezone: String,
}

impl OpenMeteoFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            latitude: config.latitude,
            longitude: config.longitude,
            location: config.location.clone(),
            timezone: config.timezone.clone(),
        })
    }

    /// Map an upstream payload to the wire model. The timestamp is stamped
    /// here, not taken from the upstream response.
    fn normalize(&self, response: OmResponse) -> WeatherLog {
        let current = response.current.unwrap_or_default();

        WeatherLog {
            timestamp: Utc::now(),
            location: self.location.clone(),
            temperature: current.temperature_2m,
            humidity: current.relative_humidity_2m,
            wind_speed: current.wind_speed_10m,
            condition: condition_from_code(current.weather_code.as_ref()).to_string(),
            source: SOURCE.to_string(),
            user_id: None,
        }
    }
}

#[async_trait]
impl WeatherFetcher for OpenMeteoFetcher {
    async fn fetch_current(&self) -> Result<WeatherLog, FetchError> {
        let res = self
            .http
            .get(&self.api_url)
            .query(&[
                ("latitude", self.latitude.to_string()),
                ("longitude", self.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("timezone", self.timezone.clone()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(FetchError::UpstreamStatus {
                status,
                body: truncate_body(&body),
            });
        }

        let parsed: OmResponse = serde_json::from_str(&body)?;
        Ok(self.normalize(parsed))
    }
}

#[derive(Debug, Default, Deserialize)]
struct OmResponse {
    #[serde(default)]
    current: Option<OmCurrent>,
}

#[derive(Debug, Default, Deserialize)]
struct OmCurrent {
    #[serde(default)]
    temperature_2m: Option<f64>,
    #[serde(default)]
    relative_humidity_2m: Option<f64>,
    #[serde(default)]
    wind_speed_10m: Option<f64>,
    #[serde(default)]
    weather_code: Option<Value>,
}

/// WMO weather interpretation code to a short classification label.
/// Anything outside the table, including non-integer codes, is "unknown".
fn condition_from_code(code: Option<&Value>) -> &'static str {
    match code.and_then(code_as_integer) {
        Some(0) => "clear",
        Some(1..=3) => "clouds",
        Some(51..=67) => "drizzle",
        Some(71..=77) => "snow",
        Some(80..=82) => "rain",
        Some(95..=99) => "storm",
        _ => "unknown",
    }
}

/// The table keys on the numeric code, so an integral float (`2.0`)
/// counts the same as its integer encoding (`2`).
fn code_as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
}

/// Cap an error body at roughly 200 bytes, never splitting a character.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized weather observation.
///
/// Wire format is a camelCase JSON object. Every field tolerates being
/// absent on input: numeric fields stay `None` (absence is distinct from
/// zero and must survive aggregation as exclusion), a missing timestamp is
/// stamped at decode time, missing strings fall back to `""`/`"unknown"`.
/// Absent optionals are omitted from the serialized object, never `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherLog {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,

    #[serde(default = "unknown_label")]
    pub condition: String,

    #[serde(default = "unknown_label")]
    pub source: String,

    /// Injected by the dashboard gateway on user-originated records; the
    /// collector never sets it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

fn unknown_label() -> String {
    "unknown".to_string()
}

/// Qualitative temperature direction over a batch, first valid sample vs.
/// last valid sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
    Unknown,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Stable => "stable",
            Trend::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregation report over a batch of [`WeatherLog`].
///
/// `count` is the batch size, not the number of valid samples. The averages
/// and the comfort index are rounded to one decimal for presentation;
/// absent optionals are omitted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherInsights {
    pub count: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_humidity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_temperature: Option<f64>,

    pub trend: Trend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comfort_index: Option<f64>,

    pub summary: String,
}

use crate::model::{Trend, WeatherInsights, WeatherLog};

/// Summary reported for an empty batch.
pub const EMPTY_SUMMARY: &str = "No data received yet.";

/// Temperature change below this magnitude counts as stable.
const TREND_THRESHOLD: f64 = 0.5;

/// Aggregate a batch of logs into an insights report.
///
/// Pure and deterministic: no I/O, no shared state, safe to call from any
/// number of requests at once. `count` reflects the whole batch; every
/// numeric result is computed over valid samples only.
pub fn generate(logs: &[WeatherLog]) -> WeatherInsights {
    if logs.is_empty() {
        return WeatherInsights {
            count: 0,
            average_temperature: None,
            average_humidity: None,
            max_temperature: None,
            min_temperature: None,
            trend: Trend::Unknown,
            comfort_index: None,
            summary: EMPTY_SUMMARY.to_string(),
        };
    }

    let temperatures = valid_samples(logs, |log| log.temperature);
    let humidities = valid_samples(logs, |log| log.humidity);

    let avg_temperature = mean(&temperatures);
    let avg_humidity = mean(&humidities);

    // The comfort index works on unrounded averages; rounding is applied
    // only to the reported fields.
    let average_temperature = avg_temperature.map(round1);
    let average_humidity = avg_humidity.map(round1);
    let max_temperature = temperatures.iter().copied().reduce(f64::max);
    let min_temperature = temperatures.iter().copied().reduce(f64::min);
    let trend = trend_of(&temperatures);
    let comfort_index = comfort_index_of(avg_temperature, avg_humidity);

    let summary = compose_summary(
        logs.len(),
        average_temperature,
        average_humidity,
        trend,
        comfort_index,
    );

    WeatherInsights {
        count: logs.len(),
        average_temperature,
        average_humidity,
        max_temperature,
        min_temperature,
        trend,
        comfort_index,
        summary,
    }
}

/// A sample is valid when it is present and a real number. Average,
/// min/max, and trend all share this predicate so they never disagree on
/// which samples count.
fn is_valid(sample: Option<f64>) -> bool {
    matches!(sample, Some(value) if !value.is_nan())
}

/// Valid samples of one field, in input order.
fn valid_samples<F>(logs: &[WeatherLog], field: F) -> Vec<f64>
where
    F: Fn(&WeatherLog) -> Option<f64>,
{
    logs.iter()
        .map(field)
        .filter(|sample| is_valid(*sample))
        .flatten()
        .collect()
}

fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

/// Direction of the last valid sample relative to the first. Intermediate
/// samples never affect the result.
fn trend_of(samples: &[f64]) -> Trend {
    if samples.len() < 2 {
        return Trend::Unknown;
    }

    let diff = samples[samples.len() - 1] - samples[0];
    if diff > TREND_THRESHOLD {
        Trend::Rising
    } else if diff < -TREND_THRESHOLD {
        Trend::Falling
    } else {
        Trend::Stable
    }
}

/// 0 to 100 score for how close conditions sit to 24°C and 50% humidity,
/// weighted 0.6/0.4. Absent unless both averages are present.
fn comfort_index_of(avg_temperature: Option<f64>, avg_humidity: Option<f64>) -> Option<f64> {
    let (Some(temperature), Some(humidity)) = (avg_temperature, avg_humidity) else {
        return None;
    };

    let temp_score = (1.0 - (temperature - 24.0).abs() / 15.0).max(0.0);
    let humidity_score = (1.0 - (humidity - 50.0).abs() / 50.0).max(0.0);
    let raw = 0.6 * temp_score + 0.4 * humidity_score;

    Some(round1(raw * 100.0))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Fixed-template summary. Clauses appear in a fixed order and only when
/// their value is present.
fn compose_summary(
    count: usize,
    average_temperature: Option<f64>,
    average_humidity: Option<f64>,
    trend: Trend,
    comfort_index: Option<f64>,
) -> String {
    let mut clauses = vec![if count == 1 {
        "Analyzed 1 weather reading.".to_string()
    } else {
        format!("Analyzed {count} weather readings.")
    }];

    if let Some(value) = average_temperature {
        clauses.push(format!("Average temperature {value:.1}°C."));
    }
    if let Some(value) = average_humidity {
        clauses.push(format!("Average humidity {value:.1}%."));
    }

    match trend {
        Trend::Rising => clauses.push("Temperature is rising.".to_string()),
        Trend::Falling => clauses.push("Temperature is falling.".to_string()),
        Trend::Stable => clauses.push("Temperature is stable.".to_string()),
        Trend::Unknown => {}
    }

    if let Some(index) = comfort_index {
        clauses.push(comfort_clause(index).to_string());
    }

    clauses.join(" ")
}

/// Tier wording keyed on the rounded index reported to callers.
fn comfort_clause(index: f64) -> &'static str {
    if index >= 75.0 {
        "Comfort level is high: pleasant conditions."
    } else if index >= 50.0 {
        "Comfort level is moderate."
    } else {
        "Comfort level is low: uncomfortable conditions."
    }
}

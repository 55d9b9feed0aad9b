//! Turns a weather entity into a sentence.

use serde_json::Value;
use tracing::error;

use crate::constants::WEATHER_UNAVAILABLE;
use crate::homeassistant::EntityState;

/// Reference cloud coverage percentages and how they read, in ascending order.
pub const CLOUDINESS: [(u8, &str); 11] = [
    (0, "The sky is completely clear."),
    (10, "A few wisps of clouds dot the sky."),
    (20, "Scattered clouds gently float by."),
    (30, "A patchwork of clouds adorns the sky."),
    (40, "Partly cloudy with blue sky peeking through."),
    (50, "A balanced mix of sun and clouds."),
    (60, "More clouds than sun overhead."),
    (70, "The sky is mostly cloudy."),
    (80, "Thick clouds blanket most of the sky."),
    (90, "The sky is grey and heavily clouded."),
    (100, "Clouds completely cover the sky."),
];

/// The bucket closest to `coverage`. Ties go to the lower bucket.
pub fn nearest_cloudiness(coverage: f64) -> (u8, &'static str) {
    let mut best = CLOUDINESS[0];
    let mut best_distance = (coverage - f64::from(best.0)).abs();
    for bucket in &CLOUDINESS[1..] {
        let distance = (coverage - f64::from(bucket.0)).abs();
        if distance < best_distance {
            best = *bucket;
            best_distance = distance;
        }
    }
    best
}

/// Sentence for the bucket closest to `coverage`
pub fn describe_cloudiness(coverage: f64) -> &'static str {
    nearest_cloudiness(coverage).1
}

/// The bits of a weather entity that end up in a prompt
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherReport {
    /// Condition label, eg `sunny`
    pub condition: String,
    /// Temperature exactly as Home Assistant reported it
    pub temperature: Option<Value>,
    /// Cloud coverage percentage, 0 when unknown
    pub cloud_coverage: f64,
}

impl WeatherReport {
    /// Pulls the report out of a weather entity
    pub fn from_entity(entity: &EntityState) -> Self {
        let cloud_coverage = match entity.attribute("cloud_coverage") {
            Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
            Some(Value::String(raw)) => raw.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        };
        Self {
            condition: entity.state.clone(),
            temperature: entity.attribute("temperature").cloned(),
            cloud_coverage,
        }
    }

    fn temperature_text(&self) -> String {
        match &self.temperature {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => "unknown".to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// eg "It's a sunny day with a temperature of 21.5°C. A few wisps of clouds dot the sky."
    pub fn sentence(&self) -> String {
        format!(
            "It's a {} day with a temperature of {}°C. {}",
            self.condition,
            self.temperature_text(),
            describe_cloudiness(self.cloud_coverage)
        )
    }
}

/// Describes the weather entity, or explains that there wasn't one.
pub fn describe_weather(entity: Option<&EntityState>) -> String {
    match entity {
        Some(entity) => WeatherReport::from_entity(entity).sentence(),
        None => {
            error!("{WEATHER_UNAVAILABLE}");
            WEATHER_UNAVAILABLE.to_string()
        }
    }
}

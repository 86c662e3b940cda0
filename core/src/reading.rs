use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One multi-channel sample as returned by the source cloud. A channel the
/// sensor did not report stays `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "capture_datetime_utc")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub light: Option<f64>,
    #[serde(default)]
    pub fertilizer_level: Option<f64>,
    #[serde(default, rename = "air_temperature_celsius")]
    pub air_temperature: Option<f64>,
    #[serde(default, rename = "soil_moisture_percent")]
    pub soil_moisture: Option<f64>,
    #[serde(default, rename = "battery_percent")]
    pub battery_level: Option<f64>,
    #[serde(default, rename = "water_tank_level_percent")]
    pub water_tank_level: Option<f64>,
    #[serde(default, rename = "calibrated_soil_moisture_percent")]
    pub calibrated_soil_moisture: Option<f64>,
}

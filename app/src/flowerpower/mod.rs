use crate::client::Client;
use crate::error::SourceError;
use crate::metrics::{Counter, Metrics};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use kudzu_core::{is_eligible, Location, Reading, Window};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

#[cfg(test)]
mod test;

pub const PROFILE_PATH: &str = "/user/v4/profile";
pub const CONFIGURATION_PATH: &str = "/garden/v2/configuration";
pub const STATUS_PATH: &str = "/garden/v1/status";
pub const DATA_PATH: &str = "/sensor_data/v6/sample/location";

/// Account details read from the user profile
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub parrot_id: String,
}

/// Read side of the device cloud the indexer pulls from
#[async_trait]
pub trait Source: Send + Sync {
    async fn user(&self, access_token: &str) -> Result<User, SourceError>;

    /// All eligible locations of the account
    async fn locations(&self, access_token: &str) -> Result<Vec<Location>, SourceError>;

    /// Readings of one location within `window`, most recent first
    async fn readings(
        &self,
        access_token: &str,
        location_id: &str,
        window: &Window,
    ) -> Result<Vec<Reading>, SourceError>;
}

#[derive(Debug, Clone)]
pub struct FlowerPowerConfig {
    pub base_url: String,
}

pub struct FlowerPower {
    client: Client,
    config: FlowerPowerConfig,
    metrics: Arc<dyn Metrics>,
}

#[derive(Deserialize)]
struct UserData {
    user_profile: UserProfile,
}

#[derive(Deserialize)]
struct UserProfile {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct StatusData {
    #[serde(default)]
    locations: Vec<StatusLocation>,
}

#[derive(Deserialize)]
struct StatusLocation {
    location_identifier: String,
    #[serde(default)]
    first_sample_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    last_sample_utc: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ConfigurationData {
    #[serde(default)]
    locations: Vec<ConfigurationLocation>,
}

#[derive(Deserialize)]
struct ConfigurationLocation {
    location_identifier: String,
    #[serde(default)]
    sensor: Option<ConfigurationSensor>,
    #[serde(default)]
    plant_nickname: Option<String>,
    #[serde(default)]
    longitude: f64,
    #[serde(default)]
    latitude: f64,
}

#[derive(Deserialize)]
struct ConfigurationSensor {
    #[serde(default)]
    sensor_serial: Option<String>,
}

#[derive(Deserialize)]
struct SampleData {
    #[serde(default)]
    samples: Vec<Reading>,
}

impl FlowerPower {
    pub fn new(client: Client, config: FlowerPowerConfig, metrics: Arc<dyn Metrics>) -> Self {
        FlowerPower {
            client,
            config,
            metrics,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Endpoint serving the readings of a location
    pub fn data_url(base_url: &str, location_id: &str) -> String {
        format!("{}{}/{}", base_url, DATA_PATH, location_id)
    }
}

#[async_trait]
impl Source for FlowerPower {
    async fn user(&self, access_token: &str) -> Result<User, SourceError> {
        let body = self.client.get(&self.url(PROFILE_PATH), access_token).await?;
        let data: UserData = serde_json::from_slice(&body)?;
        Ok(User {
            parrot_id: data.user_profile.email,
        })
    }

    async fn locations(&self, access_token: &str) -> Result<Vec<Location>, SourceError> {
        let status_body = self.client.get(&self.url(STATUS_PATH), access_token).await?;
        let status: StatusData = serde_json::from_slice(&status_body)?;

        let configuration_body = self
            .client
            .get(&self.url(CONFIGURATION_PATH), access_token)
            .await?;
        let configuration: ConfigurationData = serde_json::from_slice(&configuration_body)?;

        let locations = join_locations(status, configuration);
        debug!(count = locations.len(), "Retrieved locations from parrot");
        self.metrics
            .increment(Counter::RetrievedLocations, locations.len() as u64);
        Ok(locations)
    }

    async fn readings(
        &self,
        access_token: &str,
        location_id: &str,
        window: &Window,
    ) -> Result<Vec<Reading>, SourceError> {
        let url = Url::parse_with_params(
            &Self::data_url(&self.config.base_url, location_id),
            &[
                (
                    "from_datetime_utc",
                    window.from.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                (
                    "to_datetime_utc",
                    window.to.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
            ],
        )?;

        let body = self.client.get(url.as_str(), access_token).await?;
        let data: SampleData = serde_json::from_slice(&body)?;
        self.metrics
            .increment(Counter::RetrievedReadings, data.samples.len() as u64);
        Ok(data.samples)
    }
}

/// Joins status and configuration records on the location identifier and
/// drops everything that can't be indexed.
fn join_locations(status: StatusData, configuration: ConfigurationData) -> Vec<Location> {
    let mut configured: HashMap<String, ConfigurationLocation> = configuration
        .locations
        .into_iter()
        .map(|l| (l.location_identifier.clone(), l))
        .collect();

    status
        .locations
        .into_iter()
        .filter(|l| is_eligible(l.first_sample_utc, l.last_sample_utc))
        .filter_map(|l| {
            let config = configured.remove(&l.location_identifier)?;
            let serial_num = config.sensor.and_then(|s| s.sensor_serial)?;
            if serial_num.is_empty() {
                return None;
            }
            Some(Location {
                location_id: l.location_identifier,
                serial_num,
                nickname: config.plant_nickname.unwrap_or_default(),
                first_sample: l.first_sample_utc?,
                last_sample: l.last_sample_utc?,
                longitude: config.longitude,
                latitude: config.latitude,
            })
        })
        .collect()
}

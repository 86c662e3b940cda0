use crate::client::Client;
use crate::error::{ClientError, SinkError};
use crate::flowerpower::FlowerPower;
use crate::metrics::{Counter, Metrics};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use kudzu_core::{expand, format_value, ChannelDef, Device, Reading, CHANNELS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;


const DESCRIPTION: &str =
    "Soil sensor data produced by the GROW observatory. For more info see https://growobservatory.org";
const WEBPAGE: &str = "http://global.parrot.com/au/products/flower-power/";

/// Write side of the knowledge graph the indexer pushes to
#[async_trait]
pub trait Sink: Send + Sync {
    /// Creates the entity with its first batch of observations and returns the
    /// identifier the sink assigned.
    async fn create_thing(&self, device: &Device, readings: &[Reading]) -> Result<String, SinkError>;

    /// Refreshes title and position and appends observations
    async fn update_thing(&self, device: &Device, readings: &[Reading]) -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
pub struct ThingfulConfig {
    pub base_url: String,
    pub api_key: String,
    pub concurrency: usize,
    pub max_things: usize,
    /// Base of the source cloud, advertised as the endpoint of created things
    pub data_base_url: String,
}

pub struct Thingful {
    client: Client,
    config: ThingfulConfig,
    metrics: Arc<dyn Metrics>,
}

/*
 * Outgoing payloads
 */

#[derive(Serialize)]
struct Request {
    data: RequestData,
}

#[derive(Serialize)]
struct RequestData {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    attributes: ThingPayload,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThingPayload {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webpage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indexed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<Endpoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    metadata: Vec<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thing_type: Option<String>,
    location: Option<GeoLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_license: Option<DataLicense>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<Provider>,
    channels: Vec<ChannelPayload>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Endpoint {
    url: String,
    content_type: &'static str,
}

#[derive(Serialize)]
struct DataLicense {
    name: &'static str,
    url: &'static str,
}

#[derive(Serialize)]
struct Provider {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    url: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelPayload {
    id: &'static str,
    record_time_series: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    measured_by: Option<String>,
    quantity_kind: String,
    domain_of_interest: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(rename = "type")]
    data_type: String,
    observations: Vec<ObservationPayload>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ObservationPayload {
    recorded_at: DateTime<Utc>,
    location: GeoLocation,
    value: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    data: CreatedData,
}

#[derive(Deserialize)]
struct CreatedData {
    #[serde(default)]
    id: String,
}

/*
 * Entities read back for the serving api
 */

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    #[serde(rename = "long")]
    pub longitude: f64,
    #[serde(rename = "lat")]
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub prop: String,
    pub val: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    pub id: String,
    pub attributes: ThingAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingAttributes {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: Option<GeoLocation>,
    #[serde(default)]
    pub metadata: Vec<Metadata>,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, rename = "dataType")]
    pub data_type: Option<String>,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "recordedAt")]
    pub recorded_at: DateTime<Utc>,
    pub value: String,
}

#[derive(Deserialize)]
struct ThingResponse {
    data: Thing,
}

impl Thingful {
    pub fn new(client: Client, config: ThingfulConfig, metrics: Arc<dyn Metrics>) -> Self {
        Thingful {
            client,
            config,
            metrics,
        }
    }

    fn thing_url(&self, uid: &str) -> String {
        format!("{}/things/{}", self.config.base_url, uid)
    }

    /// Reads the entities of up to `max_things` identifiers with at most
    /// `concurrency` requests in flight. Any failed read fails the whole call,
    /// cancelling `cancel` aborts all outstanding reads.
    pub async fn get_data(
        &self,
        uids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        ascending: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Thing>, SinkError> {
        if uids.len() > self.config.max_things {
            return Err(SinkError::TooManyThings(uids.len(), self.config.max_things));
        }

        let mut urls = Vec::with_capacity(uids.len());
        for uid in uids {
            let url = Url::parse_with_params(
                &self.thing_url(uid),
                &[
                    ("from", from.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("to", to.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ],
            )?;
            urls.push(url.to_string());
        }

        // stops every reader as soon as this call returns, whatever the reason
        let cancel = cancel.child_token();
        let _cancel_guard = cancel.clone().drop_guard();

        let concurrency = self.config.concurrency.max(1);
        let permits = Arc::new(Semaphore::new(concurrency));
        let (sender, mut receiver) =
            mpsc::channel::<(usize, Result<Vec<u8>, ClientError>)>(concurrency);
        let mut readers = JoinSet::new();

        for (index, url) in urls.into_iter().enumerate() {
            let sender = sender.clone();
            let permits = permits.clone();
            let client = self.client.clone();
            let api_key = self.config.api_key.clone();
            let cancel = cancel.clone();

            readers.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                debug!(url = url.as_str(), "Fetching time series data from thingful");
                let res = tokio::select! {
                    _ = cancel.cancelled() => return,
                    res = client.get(&url, &api_key) => res,
                };
                // the permit is only released once the result got queued
                let _ = sender.send((index, res)).await;
            });
        }
        drop(sender);

        let mut things: Vec<Option<Thing>> = (0..uids.len()).map(|_| None).collect();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(SinkError::Cancelled),
                received = receiver.recv() => match received {
                    Some((index, res)) => {
                        let body = res?;
                        things[index] = Some(self.build_thing(&body, ascending)?);
                    }
                    None => break,
                },
            }
        }

        while let Some(res) = readers.join_next().await {
            res?;
        }

        things
            .into_iter()
            .map(|thing| thing.ok_or(SinkError::Cancelled))
            .collect()
    }

    fn build_thing(&self, body: &[u8], ascending: bool) -> Result<Thing, SinkError> {
        let mut thing = serde_json::from_slice::<ThingResponse>(body)?.data;

        for channel in thing.attributes.channels.iter_mut() {
            if ascending {
                channel.observations.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
            } else {
                channel.observations.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
            }
            self.metrics.increment(Counter::RetrievedChannels, 1);
            self.metrics
                .increment(Counter::RetrievedObservations, channel.observations.len() as u64);
        }
        Ok(thing)
    }

    fn create_payload(&self, device: &Device, readings: &[Reading]) -> ThingPayload {
        let location = GeoLocation {
            longitude: device.longitude,
            latitude: device.latitude,
        };
        ThingPayload {
            title: device.nickname.clone(),
            description: Some(DESCRIPTION),
            webpage: Some(WEBPAGE),
            indexed_at: Some(device.indexed_at),
            visibility: Some("shared"),
            category: Some("Environment"),
            endpoint: Some(Endpoint {
                url: FlowerPower::data_url(&self.config.data_base_url, &device.location_id),
                content_type: "application/json",
            }),
            metadata: vec![
                Metadata {
                    prop: "schema:serialNumber".to_owned(),
                    val: device.serial_num.clone(),
                },
                Metadata {
                    prop: "sem:hasEndTimeStamp".to_owned(),
                    val: device.last_sample.to_rfc3339_opts(SecondsFormat::Secs, true),
                },
            ],
            thing_type: Some(expand("thingful:ConnectedDevice")),
            location: Some(location),
            data_license: Some(DataLicense {
                name: "CC0 1.0 Universal",
                url: "https://creativecommons.org/publicdomain/zero/1.0/",
            }),
            provider: Some(Provider {
                id: "flowerpower",
                name: "Parrot - Flower Power",
                description: "Parrot SA is a french wireless products manufacturer company specialized in technologies involving voice recognition, signal processing for embedded products and drones.",
                url: "https://www.parrot.com/",
            }),
            channels: build_channels(readings, location),
        }
    }
}

#[async_trait]
impl Sink for Thingful {
    async fn create_thing(&self, device: &Device, readings: &[Reading]) -> Result<String, SinkError> {
        debug!(
            location_id = device.location_id.as_str(),
            serial_num = device.serial_num.as_str(),
            readings = readings.len(),
            "Creating thing on thingful"
        );

        let request = Request {
            data: RequestData {
                kind: "thing",
                id: None,
                attributes: self.create_payload(device, readings),
            },
        };
        let body = serde_json::to_vec(&request)?;
        let url = format!("{}/things", self.config.base_url);
        let resp = self.client.post(&url, &self.config.api_key, body).await?;

        let created: CreateResponse = serde_json::from_slice(&resp)?;
        parse_identifier(&created.data.id).ok_or(SinkError::MissingIdentifier)
    }

    async fn update_thing(&self, device: &Device, readings: &[Reading]) -> Result<(), SinkError> {
        let uid = device
            .uid
            .as_deref()
            .ok_or_else(|| SinkError::NotCreated(device.location_id.clone()))?;
        debug!(
            location_id = device.location_id.as_str(),
            uid = uid,
            readings = readings.len(),
            "Updating thing on thingful"
        );

        let location = GeoLocation {
            longitude: device.longitude,
            latitude: device.latitude,
        };
        let url = self.thing_url(uid);
        let request = Request {
            data: RequestData {
                kind: "thing",
                id: Some(url.clone()),
                attributes: ThingPayload {
                    title: device.nickname.clone(),
                    location: Some(location),
                    channels: build_channels(readings, location),
                    ..Default::default()
                },
            },
        };
        let body = serde_json::to_vec(&request)?;
        self.client.patch(&url, &self.config.api_key, body).await?;
        Ok(())
    }
}

/// The sink answers with a resource path, its last segment is the identifier
fn parse_identifier(resource: &str) -> Option<String> {
    resource
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_owned())
}

fn build_channels(readings: &[Reading], location: GeoLocation) -> Vec<ChannelPayload> {
    CHANNELS
        .iter()
        .map(|def| build_channel(def, readings, location))
        .collect()
}

fn build_channel(def: &ChannelDef, readings: &[Reading], location: GeoLocation) -> ChannelPayload {
    ChannelPayload {
        id: def.id,
        record_time_series: true,
        measured_by: def.measured_by.map(expand),
        quantity_kind: expand(def.quantity_kind),
        domain_of_interest: def.domain_of_interest.iter().map(|d| expand(d)).collect(),
        unit: def.unit.map(expand),
        data_type: expand(def.data_type),
        // unreported values are left out rather than sent as zero
        observations: readings
            .iter()
            .filter_map(|reading| {
                def.value(reading).map(|value| ObservationPayload {
                    recorded_at: reading.timestamp,
                    location,
                    value: format_value(value),
                })
            })
            .collect(),
    }
}

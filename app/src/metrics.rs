use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use tracing::error;

const NAMESPACE: &str = "grow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    IndexedIdentities,
    RetrievedLocations,
    RetrievedReadings,
    RetrievedChannels,
    RetrievedObservations,
}

/// Sink for the counters the components bump while working. Injected into
/// every component instead of living in process wide statics.
pub trait Metrics: Send + Sync {
    fn increment(&self, counter: Counter, by: u64);

    fn observe_request(&self, method: &str, host: &str, status: u16, seconds: f64);
}

#[cfg(test)]
pub struct NoopMetrics;

#[cfg(test)]
impl Metrics for NoopMetrics {
    fn increment(&self, _counter: Counter, _by: u64) {}

    fn observe_request(&self, _method: &str, _host: &str, _status: u16, _seconds: f64) {}
}

/// Keeps counter totals in memory so tests can assert on them
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMetrics {
    counts: parking_lot::Mutex<std::collections::HashMap<Counter, u64>>,
}

#[cfg(test)]
impl RecordingMetrics {
    pub fn count(&self, counter: Counter) -> u64 {
        self.counts.lock().get(&counter).copied().unwrap_or(0)
    }
}

#[cfg(test)]
impl Metrics for RecordingMetrics {
    fn increment(&self, counter: Counter, by: u64) {
        *self.counts.lock().entry(counter).or_insert(0) += by;
    }

    fn observe_request(&self, _method: &str, _host: &str, _status: u16, _seconds: f64) {}
}

pub struct PrometheusMetrics {
    registry: Registry,
    indexed_identities: IntCounter,
    retrieved_locations: IntCounter,
    retrieved_readings: IntCounter,
    retrieved_channels: IntCounter,
    retrieved_observations: IntCounter,
    request_duration: HistogramVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        let indexed_identities = counter(
            "indexed_identity",
            "A counter that increments every time we index an identity",
        )?;
        let retrieved_locations = counter(
            "parrot_retrieved_locations_count",
            "A counter of received locations from Parrot",
        )?;
        let retrieved_readings = counter(
            "parrot_retrieved_readings_count",
            "A counter of received readings from Parrot",
        )?;
        let retrieved_channels = counter(
            "thingful_retrieved_channel_count",
            "A counter of channels read back from Thingful",
        )?;
        let retrieved_observations = counter(
            "thingful_retrieved_observations_count",
            "A counter of observations read back from Thingful",
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "client_request_duration_seconds",
                "A histogram of the latency in seconds for requests made by the client",
            )
            .namespace(NAMESPACE),
            &["code", "method", "host"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(PrometheusMetrics {
            registry,
            indexed_identities,
            retrieved_locations,
            retrieved_readings,
            retrieved_channels,
            retrieved_observations,
            request_duration,
        })
    }

    /// Text exposition of everything registered
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            error!("Failed encoding metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Metrics for PrometheusMetrics {
    fn increment(&self, counter: Counter, by: u64) {
        let c = match counter {
            Counter::IndexedIdentities => &self.indexed_identities,
            Counter::RetrievedLocations => &self.retrieved_locations,
            Counter::RetrievedReadings => &self.retrieved_readings,
            Counter::RetrievedChannels => &self.retrieved_channels,
            Counter::RetrievedObservations => &self.retrieved_observations,
        };
        c.inc_by(by);
    }

    fn observe_request(&self, method: &str, host: &str, status: u16, seconds: f64) {
        let code = status.to_string();
        self.request_duration
            .with_label_values(&[code.as_str(), method, host])
            .observe(seconds);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_render_counters() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.increment(Counter::RetrievedReadings, 3);
        metrics.observe_request("GET", "example.com", 200, 0.25);

        let text = metrics.render();
        assert!(text.contains("grow_parrot_retrieved_readings_count 3"));
        assert!(text.contains("grow_client_request_duration_seconds_count"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = PrometheusMetrics::new().unwrap();
        let b = PrometheusMetrics::new().unwrap();
        a.increment(Counter::IndexedIdentities, 1);
        assert!(b.render().contains("grow_indexed_identity 0"));
    }
}

use crate::error::IndexError;
use crate::flowerpower::Source;
use crate::metrics::{Counter, Metrics};
use crate::store::Store;
use crate::thingful::Sink;
use chrono::Utc;
use kudzu_core::{Device, Identity, Location, Reading, Window};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;


#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Pause between two ticks
    pub delay: Duration,
    /// Pause between two windows of the same device
    pub throttle: Duration,
    /// Span of a single window
    pub window: chrono::Duration,
}

/// Result of a single scheduler tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Indexed {
        owner_id: i64,
        devices: usize,
        failed: usize,
    },
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub devices: usize,
    pub failed: usize,
}

pub struct Indexer {
    store: Arc<dyn Store>,
    source: Arc<dyn Source>,
    sink: Arc<dyn Sink>,
    metrics: Arc<dyn Metrics>,
    config: IndexerConfig,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn Store>,
        source: Arc<dyn Source>,
        sink: Arc<dyn Sink>,
        metrics: Arc<dyn Metrics>,
        config: IndexerConfig,
    ) -> Self {
        Indexer {
            store,
            source,
            sink,
            metrics,
            config,
        }
    }

    /// Ticks every `delay` until `shutdown` fires. Shutdown is only observed
    /// between ticks, a running tick always finishes. A slow tick delays the
    /// next one.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(delay = ?self.config.delay, "Starting indexer");
        let mut ticker = tokio::time::interval(self.config.delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let span = info_span!("index", run = %Uuid::new_v4());
                    self.index().instrument(span).await;
                }
            }
        }
        info!("Indexer stopped");
    }

    /// Indexes the next due identity, if any
    pub async fn index(&self) -> TickOutcome {
        let identity = match self.store.claim_next_due_identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                debug!("No identity due for indexing");
                return TickOutcome::Idle;
            }
            Err(e) => {
                error!(error = %e, "Failed claiming next identity");
                return TickOutcome::Failed;
            }
        };

        match self.index_identity(&identity).await {
            Ok(summary) => {
                info!(
                    owner_id = identity.owner_id,
                    devices = summary.devices,
                    failed = summary.failed,
                    "Indexed identity"
                );
                TickOutcome::Indexed {
                    owner_id: identity.owner_id,
                    devices: summary.devices,
                    failed: summary.failed,
                }
            }
            Err(e) => {
                if e.is_recoverable() {
                    warn!(owner_id = identity.owner_id, error = %e, "Failed indexing identity");
                } else {
                    error!(owner_id = identity.owner_id, error = %e, "Failed indexing identity");
                }
                TickOutcome::Failed
            }
        }
    }

    /// Indexes all devices of `identity` right away, regardless of when it
    /// was indexed last.
    pub async fn index_identity(&self, identity: &Identity) -> Result<IndexSummary, IndexError> {
        debug!(owner_id = identity.owner_id, "Indexing identity");
        self.metrics.increment(Counter::IndexedIdentities, 1);

        let locations = self.source.locations(&identity.access_token).await?;
        let mut summary = IndexSummary::default();

        for location in locations.iter() {
            summary.devices += 1;
            match self.index_location(identity, location).await {
                Ok(()) => {}
                // without durable state nothing else can be indexed safely
                Err(IndexError::Store(e)) => {
                    error!(
                        owner_id = identity.owner_id,
                        location_id = location.location_id.as_str(),
                        error = %e,
                        "Failed persisting device"
                    );
                    return Err(IndexError::Store(e));
                }
                Err(_) => summary.failed += 1,
            }
        }
        Ok(summary)
    }

    async fn index_location(
        &self,
        identity: &Identity,
        location: &Location,
    ) -> Result<(), IndexError> {
        match self.store.get_device(&location.location_id).await? {
            None => self.index_new_location(identity, location).await,
            Some(mut device) => {
                device.refresh(location);
                self.advance(identity, device).await
            }
        }
    }

    /// Creates the sink entity together with the first window, then catches
    /// up like any known device.
    async fn index_new_location(
        &self,
        identity: &Identity,
        location: &Location,
    ) -> Result<(), IndexError> {
        let now = Utc::now();
        let mut device = Device::from_location(identity.owner_id, location, now);
        let window = device.first_window(self.config.window);

        let readings = self.fetch_readings(identity, &device, &window).await?;
        let uid = match self.sink.create_thing(&device, &readings).await {
            Ok(uid) => uid,
            Err(e) => return Err(window_failed(&device, &window, e.into())),
        };

        device.uid = Some(uid);
        device.mark_uploaded(&window, now);
        self.store.create_device(&device).await?;
        info!(
            owner_id = identity.owner_id,
            location_id = device.location_id.as_str(),
            uid = device.uid.as_deref().unwrap_or_default(),
            readings = readings.len(),
            "Created thing"
        );

        self.advance(identity, device).await
    }

    /// Pushes window after window until the device is caught up. The
    /// watermark is persisted after every window, so a failure only loses
    /// the window that failed.
    async fn advance(&self, identity: &Identity, mut device: Device) -> Result<(), IndexError> {
        if !device.has_more_readings() {
            debug!(location_id = device.location_id.as_str(), "Device is up to date");
            return Ok(());
        }

        while device.has_more_readings() {
            tokio::time::sleep(self.config.throttle).await;
            let window = device.next_window(self.config.window);
            let readings = self.fetch_readings(identity, &device, &window).await?;
            if let Err(e) = self.sink.update_thing(&device, &readings).await {
                return Err(window_failed(&device, &window, e.into()));
            }

            device.mark_uploaded(&window, Utc::now());
            self.store.update_device(&device).await?;
            debug!(
                location_id = device.location_id.as_str(),
                from = %window.from,
                to = %window.to,
                readings = readings.len(),
                "Pushed window"
            );
        }
        Ok(())
    }

    /// Readings of `window` in chronological order
    async fn fetch_readings(
        &self,
        identity: &Identity,
        device: &Device,
        window: &Window,
    ) -> Result<Vec<Reading>, IndexError> {
        match self
            .source
            .readings(&identity.access_token, &device.location_id, window)
            .await
        {
            Ok(mut readings) => {
                readings.reverse();
                Ok(readings)
            }
            Err(e) => Err(window_failed(device, window, e.into())),
        }
    }
}

fn window_failed(device: &Device, window: &Window, err: IndexError) -> IndexError {
    if err.is_recoverable() {
        warn!(
            location_id = device.location_id.as_str(),
            from = %window.from,
            to = %window.to,
            error = %err,
            "Failed indexing window"
        );
    } else {
        error!(
            location_id = device.location_id.as_str(),
            from = %window.from,
            to = %window.to,
            error = %err,
            "Failed indexing window"
        );
    }
    err
}

use crate::{Location, Window, PROVIDER};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Per-location sync state as persisted by the store.
///
/// `last_uploaded` is the watermark on the sink side: everything sampled
/// before it has been pushed. It never moves backwards and never passes
/// `last_sample`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub uid: Option<String>,
    pub owner_id: i64,
    pub provider: String,
    pub location_id: String,
    pub serial_num: String,
    pub nickname: String,
    pub longitude: f64,
    pub latitude: f64,
    pub first_sample: DateTime<Utc>,
    pub last_sample: DateTime<Utc>,
    pub last_uploaded: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
}

impl Device {
    /// A device seen for the first time. Nothing is uploaded yet, so the
    /// watermark sits on the first sample.
    pub fn from_location(owner_id: i64, location: &Location, now: DateTime<Utc>) -> Self {
        Device {
            uid: None,
            owner_id,
            provider: PROVIDER.to_owned(),
            location_id: location.location_id.clone(),
            serial_num: location.serial_num.clone(),
            nickname: location.nickname.clone(),
            longitude: location.longitude,
            latitude: location.latitude,
            first_sample: location.first_sample,
            last_sample: location.last_sample,
            last_uploaded: location.first_sample,
            created_at: now,
            updated_at: now,
            indexed_at: now,
        }
    }

    /// Takes over the descriptive fields and sample bounds the source reports
    /// on a later sighting.
    pub fn refresh(&mut self, location: &Location) {
        self.nickname = location.nickname.clone();
        self.longitude = location.longitude;
        self.latitude = location.latitude;
        self.first_sample = location.first_sample;
        self.last_sample = std::cmp::max(location.last_sample, self.last_uploaded);
    }

    pub fn has_more_readings(&self) -> bool {
        self.last_uploaded < self.last_sample
    }

    /// Window pushed together with the creation of the sink entity
    pub fn first_window(&self, span: Duration) -> Window {
        Window::bounded(self.first_sample, span, self.last_sample)
    }

    /// Window following the current watermark
    pub fn next_window(&self, span: Duration) -> Window {
        Window::bounded(self.last_uploaded, span, self.last_sample)
    }

    pub fn mark_uploaded(&mut self, window: &Window, now: DateTime<Utc>) {
        let upper = std::cmp::min(window.to, self.last_sample);
        self.last_uploaded = std::cmp::max(self.last_uploaded, upper);
        self.updated_at = now;
        self.indexed_at = now;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 11, d, 0, 0, 0).unwrap()
    }

    fn location(first: u32, last: u32) -> Location {
        Location {
            location_id: "loc".to_owned(),
            serial_num: "PA1234".to_owned(),
            nickname: "Basil".to_owned(),
            first_sample: day(first),
            last_sample: day(last),
            longitude: 2.35,
            latitude: 48.85,
        }
    }

    #[test]
    fn test_new_device_walks_windows() {
        let span = Duration::days(10);
        let mut device = Device::from_location(1, &location(1, 25), day(26));
        assert!(device.uid.is_none());

        let first = device.first_window(span);
        assert_eq!((day(1), day(11)), (first.from, first.to));
        device.mark_uploaded(&first, day(26));

        let mut windows = Vec::new();
        while device.has_more_readings() {
            let window = device.next_window(span);
            device.mark_uploaded(&window, day(26));
            windows.push((window.from, window.to));
        }

        assert_eq!(vec![(day(11), day(21)), (day(21), day(25))], windows);
        assert_eq!(device.last_sample, device.last_uploaded);
    }

    #[test]
    fn test_refresh_never_rolls_back_watermark() {
        let mut device = Device::from_location(1, &location(1, 25), day(26));
        device.last_uploaded = day(20);

        device.refresh(&location(1, 15));

        assert_eq!(day(20), device.last_uploaded);
        assert!(device.last_uploaded <= device.last_sample);
        assert!(!device.has_more_readings());
    }

    #[test]
    fn test_mark_uploaded_is_monotonic() {
        let mut device = Device::from_location(1, &location(1, 25), day(26));
        device.last_uploaded = day(21);

        device.mark_uploaded(&Window::bounded(day(1), Duration::days(10), day(25)), day(26));

        assert_eq!(day(21), device.last_uploaded);
    }
}

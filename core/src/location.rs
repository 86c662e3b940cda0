use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single sensor as reported by the source cloud, joined from its status and
/// configuration records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub location_id: String,
    pub serial_num: String,
    pub nickname: String,
    pub first_sample: DateTime<Utc>,
    pub last_sample: DateTime<Utc>,
    pub longitude: f64,
    pub latitude: f64,
}

/// A location is only worth indexing if it reported real samples: both
/// timestamps set and distinct.
pub fn is_eligible(first_sample: Option<DateTime<Utc>>, last_sample: Option<DateTime<Utc>>) -> bool {
    match (first_sample, last_sample) {
        (Some(first), Some(last)) => is_set(first) && is_set(last) && first != last,
        _ => false,
    }
}

fn is_set(ts: DateTime<Utc>) -> bool {
    ts.timestamp() > 0
}

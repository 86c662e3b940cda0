use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default span of a single fetch/push window
pub const DEFAULT_WINDOW_DAYS: i64 = 10;

/// A `[from, to)` range of sample time used to page readings from the source
/// and push them to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Window {
    /// Builds the window starting at `from`, spanning at most `span` and never
    /// reaching past `limit`.
    pub fn bounded(from: DateTime<Utc>, span: Duration, limit: DateTime<Utc>) -> Self {
        let to = from
            .checked_add_signed(span)
            .map_or(limit, |end| std::cmp::min(end, limit));
        Window {
            from,
            to: std::cmp::max(from, to),
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.from.to_rfc3339(), self.to.to_rfc3339())
    }
}

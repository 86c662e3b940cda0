use chrono::{DateTime, Duration, Utc};

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct DateQuery {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl DateQuery {
    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn is_valid(&self) -> bool {
        self.from < self.to
    }

    pub fn is_larger_than(&self, duration: Duration) -> bool {
        self.to - self.from > duration
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A user's link to the source cloud
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub owner_id: i64,
    pub access_token: String,
    pub indexed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("owner_id", &self.owner_id)
            .field("indexed_at", &self.indexed_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Identity {
    pub fn is_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.indexed_at {
            None => true,
            Some(indexed_at) => indexed_at < now - interval,
        }
    }
}

/// Picks the identity to index next: never indexed ones first, then the least
/// recently indexed one. Ties go to the most recently created identity.
pub fn select_next_due<'a, I>(identities: I, now: DateTime<Utc>, interval: Duration) -> Option<&'a Identity>
where
    I: IntoIterator<Item = &'a Identity>,
{
    identities
        .into_iter()
        .filter(|identity| identity.is_due(now, interval))
        .min_by(|a, b| {
            // None sorts before Some, so unindexed identities win
            a.indexed_at
                .cmp(&b.indexed_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        })
}

use super::{IdentityStats, Store};
use crate::error::DBError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use kudzu_core::{select_next_due, Device, Identity};
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory store following the same claim and watermark rules as postgres
pub struct MemoryStore {
    reindex_interval: Duration,
    identities: Mutex<Vec<Identity>>,
    devices: Mutex<HashMap<String, Device>>,
    fail_claim: Mutex<bool>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new(reindex_interval: Duration) -> Self {
        MemoryStore {
            reindex_interval,
            identities: Mutex::new(Vec::new()),
            devices: Mutex::new(HashMap::new()),
            fail_claim: Mutex::new(false),
            fail_writes: Mutex::new(false),
        }
    }

    pub fn add_identity(&self, identity: Identity) {
        self.identities.lock().push(identity);
    }

    pub fn add_device(&self, device: Device) {
        self.devices.lock().insert(device.location_id.clone(), device);
    }

    pub fn device(&self, location_id: &str) -> Option<Device> {
        self.devices.lock().get(location_id).cloned()
    }

    pub fn identity(&self, owner_id: i64) -> Option<Identity> {
        self.identities
            .lock()
            .iter()
            .find(|i| i.owner_id == owner_id)
            .cloned()
    }

    pub fn fail_claim(&self, fail: bool) {
        *self.fail_claim.lock() = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    fn check_writes(&self) -> Result<(), DBError> {
        if *self.fail_writes.lock() {
            return Err(DBError::SQLError(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn claim_next_due_identity(&self) -> Result<Option<Identity>, DBError> {
        if *self.fail_claim.lock() {
            return Err(DBError::SQLError(sqlx::Error::PoolTimedOut));
        }

        let now = Utc::now();
        let mut identities = self.identities.lock();
        let owner_id = match select_next_due(identities.iter(), now, self.reindex_interval) {
            Some(identity) => identity.owner_id,
            None => return Ok(None),
        };
        let claimed = identities.iter_mut().find(|i| i.owner_id == owner_id);
        Ok(claimed.map(|identity| {
            identity.indexed_at = Some(now);
            identity.clone()
        }))
    }

    async fn get_device(&self, location_id: &str) -> Result<Option<Device>, DBError> {
        Ok(self.device(location_id))
    }

    async fn create_device(&self, device: &Device) -> Result<(), DBError> {
        self.check_writes()?;
        self.add_device(device.clone());
        Ok(())
    }

    async fn update_device(&self, device: &Device) -> Result<(), DBError> {
        self.check_writes()?;
        let mut devices = self.devices.lock();
        let stored = devices
            .get_mut(&device.location_id)
            .ok_or(DBError::SQLError(sqlx::Error::RowNotFound))?;
        let last_uploaded = std::cmp::max(stored.last_uploaded, device.last_uploaded);
        let uid = device.uid.clone().or_else(|| stored.uid.clone());
        *stored = device.clone();
        stored.last_uploaded = last_uploaded;
        stored.uid = uid;
        Ok(())
    }

    async fn register_identity(
        &self,
        owner_id: i64,
        access_token: &str,
        claimed: bool,
    ) -> Result<Identity, DBError> {
        self.check_writes()?;
        let indexed_at = claimed.then(Utc::now);
        let mut identities = self.identities.lock();
        if let Some(known) = identities.iter_mut().find(|i| i.owner_id == owner_id) {
            known.access_token = access_token.to_owned();
            known.indexed_at = indexed_at;
            return Ok(known.clone());
        }
        let identity = Identity {
            owner_id,
            access_token: access_token.to_owned(),
            indexed_at,
            created_at: Utc::now(),
        };
        identities.push(identity.clone());
        Ok(identity)
    }

    async fn delete_identity(&self, owner_id: i64) -> Result<bool, DBError> {
        self.check_writes()?;
        self.devices.lock().retain(|_, d| d.owner_id != owner_id);
        let mut identities = self.identities.lock();
        let before = identities.len();
        identities.retain(|i| i.owner_id != owner_id);
        Ok(identities.len() < before)
    }

    async fn identity_stats(&self) -> Result<IdentityStats, DBError> {
        let stale_before = Utc::now() - Duration::days(2);
        let identities = self.identities.lock();
        Ok(IdentityStats {
            all: identities.len() as i64,
            pending: identities.iter().filter(|i| i.indexed_at.is_none()).count() as i64,
            stale: identities
                .iter()
                .filter(|i| i.indexed_at.map_or(false, |at| at < stale_before))
                .count() as i64,
        })
    }

    async fn check_db(&self) -> String {
        "healthy".to_owned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn identity(owner_id: i64, indexed_hours_ago: Option<i64>) -> Identity {
        let now = Utc::now();
        Identity {
            owner_id,
            access_token: format!("token-{}", owner_id),
            indexed_at: indexed_hours_ago.map(|h| now - Duration::hours(h)),
            created_at: now - Duration::days(30),
        }
    }

    #[tokio::test]
    async fn test_claim_fairness() {
        let store = MemoryStore::new(Duration::hours(24));
        store.add_identity(identity(1, None));
        store.add_identity(identity(2, Some(23)));
        store.add_identity(identity(3, Some(25)));

        let first = store.claim_next_due_identity().await.unwrap().unwrap();
        assert_eq!(1, first.owner_id);
        assert!(first.indexed_at.is_some());

        let second = store.claim_next_due_identity().await.unwrap().unwrap();
        assert_eq!(3, second.owner_id);

        assert!(store.claim_next_due_identity().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_claimed_identity() {
        let store = MemoryStore::new(Duration::hours(24));

        let claimed = store.register_identity(1, "token-1", true).await.unwrap();
        assert!(claimed.indexed_at.is_some());
        assert!(store.claim_next_due_identity().await.unwrap().is_none());

        let unclaimed = store.register_identity(1, "token-2", false).await.unwrap();
        assert!(unclaimed.indexed_at.is_none());
        let due = store.claim_next_due_identity().await.unwrap().unwrap();
        assert_eq!("token-2", due.access_token);
    }
}

use crate::error::DBError;
use crate::models::{self, identity, thing};
use async_trait::async_trait;
use chrono::Duration;
use kudzu_core::{Device, Identity};

pub use crate::models::identity::IdentityStats;

#[cfg(test)]
pub mod mock;

/// Durable sync state shared by the indexer and the api
#[async_trait]
pub trait Store: Send + Sync {
    /// Claims the identity due next and stamps it as indexed. `None` when
    /// nothing is due.
    async fn claim_next_due_identity(&self) -> Result<Option<Identity>, DBError>;

    async fn get_device(&self, location_id: &str) -> Result<Option<Device>, DBError>;

    async fn create_device(&self, device: &Device) -> Result<(), DBError>;

    async fn update_device(&self, device: &Device) -> Result<(), DBError>;

    /// Stores a new identity or replaces the token of a known one. A `claimed`
    /// identity counts as indexed now, its caller indexes it right away.
    async fn register_identity(
        &self,
        owner_id: i64,
        access_token: &str,
        claimed: bool,
    ) -> Result<Identity, DBError>;

    /// Removes the identity and the state of all its devices. Returns false
    /// if the identity was unknown.
    async fn delete_identity(&self, owner_id: i64) -> Result<bool, DBError>;

    async fn identity_stats(&self) -> Result<IdentityStats, DBError>;

    /// "healthy", or the reason the store is unusable
    async fn check_db(&self) -> String;
}

pub struct PgStore {
    conn: sqlx::PgPool,
    reindex_interval: Duration,
}

impl PgStore {
    pub fn new(conn: sqlx::PgPool, reindex_interval: Duration) -> Self {
        PgStore {
            conn,
            reindex_interval,
        }
    }

}

#[async_trait]
impl Store for PgStore {
    async fn claim_next_due_identity(&self) -> Result<Option<Identity>, DBError> {
        let claimed = identity::claim_next_due(&self.conn, self.reindex_interval).await?;
        Ok(claimed.map(Identity::from))
    }

    async fn get_device(&self, location_id: &str) -> Result<Option<Device>, DBError> {
        let dao = thing::get(&self.conn, location_id).await?;
        Ok(dao.map(Device::from))
    }

    async fn create_device(&self, device: &Device) -> Result<(), DBError> {
        thing::insert(&self.conn, device).await?;
        Ok(())
    }

    async fn update_device(&self, device: &Device) -> Result<(), DBError> {
        thing::update(&self.conn, device).await
    }

    async fn register_identity(
        &self,
        owner_id: i64,
        access_token: &str,
        claimed: bool,
    ) -> Result<Identity, DBError> {
        let dao = identity::insert(&self.conn, owner_id, access_token, claimed).await?;
        Ok(dao.into())
    }

    async fn delete_identity(&self, owner_id: i64) -> Result<bool, DBError> {
        identity::delete(&self.conn, owner_id).await
    }

    async fn identity_stats(&self) -> Result<IdentityStats, DBError> {
        identity::stats(&self.conn).await
    }

    async fn check_db(&self) -> String {
        match models::check_schema(&self.conn).await {
            Ok(_) => "healthy".to_owned(),
            Err(err) => format!("{}", err),
        }
    }
}

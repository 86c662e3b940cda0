use crate::error::DBError;
use chrono::{DateTime, Utc};
use kudzu_core::Device;

#[derive(sqlx::FromRow, Debug)]
pub struct ThingDao {
    pub(crate) uid: Option<String>,
    pub(crate) owner_id: i64,
    pub(crate) provider: String,
    pub(crate) serial_num: String,
    pub(crate) nickname: String,
    pub(crate) location_identifier: String,
    pub(crate) long: f64,
    pub(crate) lat: f64,
    pub(crate) first_sample: DateTime<Utc>,
    pub(crate) last_sample: DateTime<Utc>,
    pub(crate) last_uploaded_sample: DateTime<Utc>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) indexed_at: DateTime<Utc>,
}

impl From<ThingDao> for Device {
    fn from(dao: ThingDao) -> Self {
        Device {
            uid: dao.uid,
            owner_id: dao.owner_id,
            provider: dao.provider,
            location_id: dao.location_identifier,
            serial_num: dao.serial_num,
            nickname: dao.nickname,
            longitude: dao.long,
            latitude: dao.lat,
            first_sample: dao.first_sample,
            last_sample: dao.last_sample,
            last_uploaded: dao.last_uploaded_sample,
            created_at: dao.created_at,
            updated_at: dao.updated_at,
            indexed_at: dao.indexed_at,
        }
    }
}

pub async fn get(conn: &sqlx::PgPool, location_id: &str) -> Result<Option<ThingDao>, DBError> {
    Ok(sql_stmnt!(
        ThingDao,
        "SELECT * FROM things WHERE location_identifier = $1",
        location_id
    )
    .fetch_optional(conn)
    .await?)
}

pub async fn insert(conn: &sqlx::PgPool, device: &Device) -> Result<ThingDao, DBError> {
    Ok(sql_stmnt!(
        ThingDao,
        "INSERT INTO things (uid, owner_id, provider, serial_num, nickname, location_identifier,
            long, lat, first_sample, last_sample, last_uploaded_sample, created_at, updated_at, indexed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
         RETURNING *",
        device.uid.as_deref(),
        device.owner_id,
        device.provider.as_str(),
        device.serial_num.as_str(),
        device.nickname.as_str(),
        device.location_id.as_str(),
        device.longitude,
        device.latitude,
        device.first_sample,
        device.last_sample,
        device.last_uploaded,
        device.created_at,
        device.updated_at,
        device.indexed_at
    )
    .fetch_one(conn)
    .await?)
}

/// Writes the refreshed sync state. The upload watermark only ever moves
/// forward, whatever the caller passes.
pub async fn update(conn: &sqlx::PgPool, device: &Device) -> Result<(), DBError> {
    sql_stmnt!(
        "UPDATE things SET
            uid = COALESCE($2, uid),
            nickname = $3,
            long = $4,
            lat = $5,
            first_sample = $6,
            last_sample = $7,
            last_uploaded_sample = GREATEST(last_uploaded_sample, $8),
            updated_at = $9,
            indexed_at = $10
         WHERE location_identifier = $1",
        device.location_id.as_str(),
        device.uid.as_deref(),
        device.nickname.as_str(),
        device.longitude,
        device.latitude,
        device.first_sample,
        device.last_sample,
        device.last_uploaded,
        device.updated_at,
        device.indexed_at
    )
    .execute(conn)
    .await?;
    Ok(())
}

use super::CountRecord;
use crate::error::DBError;
use chrono::{DateTime, Duration, Utc};
use kudzu_core::Identity;
use serde::Serialize;

#[derive(sqlx::FromRow, Debug)]
pub struct IdentityDao {
    pub(crate) owner_id: i64,
    pub(crate) access_token: String,
    pub(crate) indexed_at: Option<DateTime<Utc>>,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<IdentityDao> for Identity {
    fn from(dao: IdentityDao) -> Self {
        Identity {
            owner_id: dao.owner_id,
            access_token: dao.access_token,
            indexed_at: dao.indexed_at,
            created_at: dao.created_at,
        }
    }
}

/// Counts reported by the health route
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IdentityStats {
    pub all: i64,
    pub pending: i64,
    pub stale: i64,
}

/// Upserts the identity. A `claimed` identity is stamped as indexed right
/// away, the scheduler leaves it alone until the re-index interval passed.
pub async fn insert(
    conn: &sqlx::PgPool,
    owner_id: i64,
    access_token: &str,
    claimed: bool,
) -> Result<IdentityDao, DBError> {
    Ok(sql_stmnt!(
        IdentityDao,
        "INSERT INTO identities (owner_id, access_token, indexed_at)
         VALUES ($1, $2, CASE WHEN $3 THEN NOW() END)
         ON CONFLICT (owner_id) DO UPDATE
         SET access_token = EXCLUDED.access_token, indexed_at = EXCLUDED.indexed_at
         RETURNING *",
        owner_id,
        access_token,
        claimed
    )
    .fetch_one(conn)
    .await?)
}

/// Selects the identity most overdue for indexing and stamps it in the same
/// transaction, so no other caller can claim it until `interval` passed again.
pub async fn claim_next_due(
    conn: &sqlx::PgPool,
    interval: Duration,
) -> Result<Option<IdentityDao>, DBError> {
    let mut tx = conn.begin().await?;
    let claimed = sql_stmnt!(
        IdentityDao,
        "WITH due AS (
            SELECT id FROM identities
            WHERE indexed_at IS NULL OR indexed_at < NOW() - make_interval(secs => $1)
            ORDER BY indexed_at ASC NULLS FIRST, created_at DESC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE identities SET indexed_at = NOW()
        FROM due WHERE identities.id = due.id
        RETURNING identities.*",
        interval.num_seconds() as f64
    )
    .fetch_optional(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(claimed)
}

pub async fn stats(conn: &sqlx::PgPool) -> Result<IdentityStats, DBError> {
    let all = sql_stmnt!(CountRecord, "SELECT count(*) AS count FROM identities")
        .fetch_one(conn)
        .await?;
    let pending = sql_stmnt!(
        CountRecord,
        "SELECT count(*) AS count FROM identities WHERE indexed_at IS NULL"
    )
    .fetch_one(conn)
    .await?;
    let stale = sql_stmnt!(
        CountRecord,
        "SELECT count(*) AS count FROM identities WHERE indexed_at < NOW() - INTERVAL '2 days'"
    )
    .fetch_one(conn)
    .await?;

    Ok(IdentityStats {
        all: all.count(),
        pending: pending.count(),
        stale: stale.count(),
    })
}

pub async fn delete(conn: &sqlx::PgPool, owner_id: i64) -> Result<bool, DBError> {
    let mut tx = conn.begin().await?;
    sql_stmnt!("DELETE FROM things WHERE owner_id = $1", owner_id)
        .execute(&mut *tx)
        .await?;
    let res = sql_stmnt!("DELETE FROM identities WHERE owner_id = $1", owner_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(res.rows_affected() > 0)
}

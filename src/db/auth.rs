use chrono::{SubsecRound, Utc};
use tracing::warn;

use crate::db::relational::{RelationalTx, on_pool};
use crate::db::{CredentialRecord, NewCredential, Relational};
use crate::error::StoreError;

const FIND_LIVE_BY_EMAIL: &str = r#"
    SELECT auth_id, created_at, updated_at, deleted_at, email, secret
    FROM auths WHERE email = ? AND deleted_at IS NULL
    ORDER BY auth_id LIMIT 1"#;

const COUNT_LIVE_BY_EMAIL: &str =
    "SELECT COUNT(*) FROM auths WHERE email = ? AND deleted_at IS NULL";

const INSERT: &str =
    "INSERT INTO auths (created_at, updated_at, deleted_at, email, secret) VALUES (?, ?, NULL, ?, ?)";

/// Credential rows on the relational handle.
#[derive(Debug, Clone)]
pub struct AuthStorage {
    db: Relational,
}

impl AuthStorage {
    pub fn new(db: Relational) -> Self {
        Self { db }
    }

    pub async fn find_live_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let sql = self.db.sql(FIND_LIVE_BY_EMAIL);
        let row = on_pool!(self.db.pool(), |p| sqlx::query_as::<_, CredentialRecord>(&*sql)
            .bind(email)
            .fetch_optional(p)
            .await)?;
        Ok(row)
    }

    pub async fn count_live_by_email(&self, email: &str) -> Result<i64, StoreError> {
        let sql = self.db.sql(COUNT_LIVE_BY_EMAIL);
        let n = on_pool!(self.db.pool(), |p| sqlx::query_scalar::<_, i64>(&*sql)
            .bind(email)
            .fetch_one(p)
            .await)?;
        Ok(n)
    }

    /// Insert one credential inside its own transaction.
    ///
    /// Rolls back on any failure. A violated live-email constraint comes back
    /// as [`StoreError::EmailTaken`]; everything else as the backend error.
    pub async fn insert(&self, new: NewCredential) -> Result<CredentialRecord, StoreError> {
        // Postgres keeps microseconds; store what the response echoes.
        let now = Utc::now().trunc_subsecs(6);
        let mut tx = self.db.begin().await?;

        match insert_in(&mut tx, &self.db, &new, now).await {
            Ok(auth_id) => {
                tx.commit().await?;
                Ok(new.into_record(auth_id, now))
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "credential insert rollback failed");
                }
                Err(match e {
                    sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                        StoreError::EmailTaken
                    }
                    other => StoreError::Database(other),
                })
            }
        }
    }
}

async fn insert_in(
    tx: &mut RelationalTx,
    db: &Relational,
    new: &NewCredential,
    now: chrono::DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    match tx {
        RelationalTx::MySql(tx) => {
            let res = sqlx::query(INSERT)
                .bind(now)
                .bind(now)
                .bind(&new.email)
                .bind(&new.secret)
                .execute(&mut **tx)
                .await?;
            Ok(res.last_insert_id() as i64)
        }
        RelationalTx::Postgres(tx) => {
            let sql = format!("{} RETURNING auth_id", db.sql(INSERT));
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(now)
                .bind(now)
                .bind(&new.email)
                .bind(&new.secret)
                .fetch_one(&mut **tx)
                .await
        }
        RelationalTx::Sqlite(tx) => {
            let sql = format!("{INSERT} RETURNING auth_id");
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(now)
                .bind(now)
                .bind(&new.email)
                .bind(&new.secret)
                .fetch_one(&mut **tx)
                .await
        }
    }
}

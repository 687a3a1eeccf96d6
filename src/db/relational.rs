//! Relational connection provider.
//!
//! Dispatches on the configured driver, builds typed connect options for it,
//! opens a tuned pool and hands back one [`Relational`] handle regardless of
//! the engine underneath. The whole attempt (pool open plus `SELECT 1`) runs
//! under the configured connect deadline.

use std::borrow::Cow;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool};
use sqlx::pool::PoolOptions;
use sqlx::postgres::{PgConnectOptions, PgPool, PgSslMode};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, MySql, Postgres, Sqlite, Transaction};
use tracing::{error, info};

use crate::config::{RelationalConfig, RelationalDriver, SslMode};
use crate::db::BackendKind;
use crate::error::{StoreError, codes};

#[derive(Debug, Clone)]
pub enum RelationalPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// Run the same expression against whichever pool variant is live.
///
/// The body is expanded once per arm, so it may rely on engine-specific
/// executor types as long as every arm evaluates to the same type.
macro_rules! on_pool {
    ($pool:expr, |$p:ident| $body:expr) => {
        match $pool {
            $crate::db::relational::RelationalPool::MySql($p) => $body,
            $crate::db::relational::RelationalPool::Postgres($p) => $body,
            $crate::db::relational::RelationalPool::Sqlite($p) => $body,
        }
    };
}
pub(crate) use on_pool;

/// Uniform query/transaction handle over the configured relational engine.
#[derive(Debug, Clone)]
pub struct Relational {
    driver: RelationalDriver,
    pool: RelationalPool,
}

impl Relational {
    pub fn driver(&self) -> RelationalDriver {
        self.driver
    }

    pub fn pool(&self) -> &RelationalPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        on_pool!(&self.pool, |p| sqlx::query("SELECT 1").execute(p).await.map(|_| ()))?;
        Ok(())
    }

    pub async fn begin(&self) -> Result<RelationalTx, StoreError> {
        let tx = match &self.pool {
            RelationalPool::MySql(p) => RelationalTx::MySql(p.begin().await?),
            RelationalPool::Postgres(p) => RelationalTx::Postgres(p.begin().await?),
            RelationalPool::Sqlite(p) => RelationalTx::Sqlite(p.begin().await?),
        };
        Ok(tx)
    }

    /// Execute one statement without binds. Returns rows affected.
    pub async fn execute(&self, sql: &str) -> Result<u64, StoreError> {
        let affected = on_pool!(&self.pool, |p| sqlx::query(sql)
            .execute(p)
            .await
            .map(|r| r.rows_affected()))?;
        Ok(affected)
    }

    /// Execute a `;`-separated batch of statements in order.
    pub async fn execute_batch(&self, batch: &str) -> Result<(), StoreError> {
        for stmt in batch.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            self.execute(s).await?;
        }
        Ok(())
    }

    /// Rewrite `?` placeholders for the engine: Postgres wants `$1, $2, ...`.
    pub fn sql<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match self.driver {
            RelationalDriver::Postgres => Cow::Owned(numbered_placeholders(sql)),
            RelationalDriver::MySql | RelationalDriver::Sqlite => Cow::Borrowed(sql),
        }
    }

    pub async fn close(&self) {
        on_pool!(&self.pool, |p| p.close().await)
    }
}

/// An open transaction on the handle's engine.
pub enum RelationalTx {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    Sqlite(Transaction<'static, Sqlite>),
}

impl RelationalTx {
    pub async fn commit(self) -> Result<(), StoreError> {
        match self {
            RelationalTx::MySql(tx) => tx.commit().await?,
            RelationalTx::Postgres(tx) => tx.commit().await?,
            RelationalTx::Sqlite(tx) => tx.commit().await?,
        }
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        match self {
            RelationalTx::MySql(tx) => tx.rollback().await?,
            RelationalTx::Postgres(tx) => tx.rollback().await?,
            RelationalTx::Sqlite(tx) => tx.rollback().await?,
        }
        Ok(())
    }
}

fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    for ch in sql.chars() {
        if ch == '?' {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Open the relational backend described by `cfg`.
///
/// Any failure, including the deadline expiring, is returned before a handle
/// exists; callers treat it as fatal.
pub async fn connect(cfg: &RelationalConfig) -> Result<Relational, StoreError> {
    let driver = cfg.engine()?;
    let deadline = cfg.connect_timeout();

    let attempt = async {
        let pool = match driver {
            RelationalDriver::MySql => RelationalPool::MySql(
                tuned::<MySql>(cfg, deadline)
                    .connect_with(mysql_options(cfg))
                    .await?,
            ),
            RelationalDriver::Postgres => RelationalPool::Postgres(
                tuned::<Postgres>(cfg, deadline)
                    .connect_with(postgres_options(cfg))
                    .await?,
            ),
            RelationalDriver::Sqlite => RelationalPool::Sqlite(
                SqlitePoolOptions::new()
                    .acquire_timeout(deadline)
                    .connect_with(sqlite_options(cfg))
                    .await?,
            ),
        };
        let handle = Relational { driver, pool };
        handle.ping().await?;
        Ok::<_, StoreError>(handle)
    };

    // The pool's own acquire timeout can fire in the same tick as the outer one.
    let result = match tokio::time::timeout(deadline, attempt).await {
        Ok(Err(StoreError::Database(sqlx::Error::PoolTimedOut))) | Err(_) => {
            Err(StoreError::ConnectTimeout {
                backend: BackendKind::Relational,
                after: deadline,
            })
        }
        Ok(res) => res,
    };

    let handle = result.inspect_err(|e| {
        error!(
            code = connect_code(driver),
            driver = %driver,
            error = %e,
            "relational connection failed"
        );
    })?;

    info!(driver = %driver, "DB connection successful!");
    Ok(handle)
}

fn connect_code(driver: RelationalDriver) -> u16 {
    match driver {
        RelationalDriver::MySql => codes::MYSQL_CONNECT,
        RelationalDriver::Postgres => codes::POSTGRES_CONNECT,
        RelationalDriver::Sqlite => codes::SQLITE_CONNECT,
    }
}

/// Pool limits for the networked engines, taken verbatim from config.
/// `max_idle_conns` becomes the number of connections kept warm.
fn tuned<DB: sqlx::Database>(cfg: &RelationalConfig, deadline: Duration) -> PoolOptions<DB> {
    PoolOptions::<DB>::new()
        .max_connections(cfg.max_open_conns)
        .min_connections(cfg.max_idle_conns.min(cfg.max_open_conns))
        .max_lifetime(cfg.conn_max_lifetime())
        .acquire_timeout(deadline)
}

fn mysql_options(cfg: &RelationalConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port_for(RelationalDriver::MySql))
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.dbname)
        .charset(&cfg.charset)
        .timezone(Some(mysql_time_zone(&cfg.timezone)))
        .log_statements(cfg.log_level.into())
}

/// MySQL only knows named zones when its tz tables are loaded; UTC is
/// always spelled as an offset.
fn mysql_time_zone(tz: &str) -> String {
    if tz.eq_ignore_ascii_case("utc") || tz.is_empty() {
        "+00:00".to_string()
    } else {
        tz.to_string()
    }
}

fn postgres_options(cfg: &RelationalConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port_for(RelationalDriver::Postgres))
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.dbname)
        .ssl_mode(pg_ssl_mode(cfg.sslmode))
        .options([("TimeZone", cfg.timezone.as_str())])
        .log_statements(cfg.log_level.into())
}

fn pg_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Allow => PgSslMode::Allow,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

fn sqlite_options(cfg: &RelationalConfig) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(&cfg.dbname)
        .create_if_missing(true)
        .foreign_keys(false)
        .log_statements(log::LevelFilter::Off)
}

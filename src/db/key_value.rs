//! Key-value connection provider (Redis protocol).

use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::redis;
use tracing::{error, info};

use crate::config::KeyValueConfig;
use crate::db::BackendKind;
use crate::error::{StoreError, codes};

pub type RedisPool = Pool<RedisConnectionManager>;

/// Size-bounded pool against a single key-value endpoint.
///
/// Callers run arbitrary commands on a checked-out connection and bring
/// their own per-call deadlines.
#[derive(Debug, Clone)]
pub struct KeyValue {
    pool: RedisPool,
}

impl KeyValue {
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    pub async fn get(&self) -> Result<PooledConnection<'_, RedisConnectionManager>, StoreError> {
        Ok(self.pool.get().await?)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.get().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }
}

/// Open a pool of `pool_size` connections to `host:port`.
///
/// All connections are established eagerly; the call either returns a ready
/// pool within `conn_ttl_secs` or fails without exposing a partial pool.
pub async fn connect(cfg: &KeyValueConfig) -> Result<KeyValue, StoreError> {
    let deadline = cfg.connect_timeout();

    let attempt = async {
        let manager = RedisConnectionManager::new((cfg.host.clone(), cfg.port))?;
        let pool = Pool::builder()
            .max_size(cfg.pool_size)
            .min_idle(Some(cfg.pool_size))
            .connection_timeout(deadline)
            .build(manager)
            .await?;
        let handle = KeyValue { pool };
        handle.ping().await?;
        Ok::<_, StoreError>(handle)
    };

    let result = match tokio::time::timeout(deadline, attempt).await {
        Ok(Err(StoreError::PoolTimeout(_))) | Err(_) => Err(StoreError::ConnectTimeout {
            backend: BackendKind::KeyValue,
            after: deadline,
        }),
        Ok(res) => res,
    };

    let handle = result.inspect_err(|e| {
        error!(
            code = codes::KEY_VALUE_CONNECT,
            host = %cfg.host,
            port = cfg.port,
            error = %e,
            "key-value pool connection failed"
        );
    })?;

    info!(
        host = %cfg.host,
        port = cfg.port,
        pool_size = cfg.pool_size,
        "REDIS pool connection successful!"
    );
    Ok(handle)
}

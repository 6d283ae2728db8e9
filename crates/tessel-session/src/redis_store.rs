//! Redis-backed session store.
//!
//! Each session is a Redis hash. Batches go out as a `MULTI`/`EXEC`
//! transaction so other clients never see them half applied.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Cmd, ErrorKind, Pipeline, RedisError};
use tracing::info;

use crate::config::RedisStoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{Batch, BatchOp, Fields, SessionStore};

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
        {
            StoreError::Connection(e.to_string())
        } else if e.kind() == ErrorKind::ExecAbortError {
            StoreError::Aborted(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}

fn exists_cmd(key: &str) -> Cmd {
    let mut cmd = redis::cmd("EXISTS");
    cmd.arg(key);
    cmd
}

fn hgetall_cmd(key: &str) -> Cmd {
    let mut cmd = redis::cmd("HGETALL");
    cmd.arg(key);
    cmd
}

/// `HSET key f1 v1 f2 v2 ...`, fields in name order.
fn hset_cmd(key: &str, fields: &Fields) -> Cmd {
    let mut pairs: Vec<(&String, &String)> = fields.iter().collect();
    pairs.sort();

    let mut cmd = redis::cmd("HSET");
    cmd.arg(key);
    for (name, value) in pairs {
        cmd.arg(name).arg(value);
    }
    cmd
}

fn hdel_cmd(key: &str, fields: &[String]) -> Cmd {
    let mut cmd = redis::cmd("HDEL");
    cmd.arg(key);
    for name in fields {
        cmd.arg(name);
    }
    cmd
}

/// `EXPIRE` for whole seconds, `PEXPIRE` otherwise.
fn expire_cmd(key: &str, ttl: Duration) -> Cmd {
    if ttl.subsec_nanos() == 0 {
        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(key).arg(ttl.as_secs());
        cmd
    } else {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let mut cmd = redis::cmd("PEXPIRE");
        cmd.arg(key).arg(millis);
        cmd
    }
}

/// Wrap the batch's commands in `MULTI`/`EXEC`.
fn batch_pipeline(batch: &Batch) -> Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for op in batch.ops() {
        let cmd = match op {
            BatchOp::HashDelete { key, fields } => hdel_cmd(key, fields),
            BatchOp::HashSet { key, fields } => hset_cmd(key, fields),
        };
        pipe.add_command(cmd).ignore();
    }
    pipe
}

/// [`SessionStore`] backed by a Redis server.
///
/// Uses a [`ConnectionManager`], which reconnects on its own after the
/// connection drops. Clones share the connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the configured server.
    pub async fn connect(config: &RedisStoreConfig) -> StoreResult<Self> {
        let url = config.connection_url()?;
        let client = redis::Client::open(url.as_str())?;
        let conn = client.get_connection_manager().await?;

        info!(addr = %config.addr, db = config.db, "Connected to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let found: bool = exists_cmd(key).query_async(&mut conn).await?;
        Ok(found)
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<Fields> {
        let mut conn = self.conn.clone();
        let fields: Fields = hgetall_cmd(key).query_async(&mut conn).await?;
        Ok(fields)
    }

    async fn hash_set(&self, key: &str, fields: &Fields) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = hset_cmd(key, fields).query_async(&mut conn).await?;
        Ok(())
    }

    async fn hash_delete(&self, key: &str, fields: &[String]) -> StoreResult<usize> {
        let mut conn = self.conn.clone();
        let removed: usize = hdel_cmd(key, fields).query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let applied: bool = expire_cmd(key, ttl).query_async(&mut conn).await?;
        Ok(applied)
    }

    async fn exec_batch(&self, batch: Batch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = batch_pipeline(&batch).query_async(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

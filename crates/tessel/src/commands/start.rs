//! Start command - launches the Tessel server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tessel_server::config::DEFAULT_PORT;
use tessel_server::{Server, ServerConfig};
use tessel_session::config::{DEFAULT_MAX_KEYS, DEFAULT_RETRY_NUMBER};
use tessel_session::{
    EngineConfig, MemoryStore, MemoryStoreConfig, RedisStore, RedisStoreConfig, SessionEngine,
    SharedStore, UpdateMode,
};

use super::Context;

/// Arguments for the start command.
///
/// Every option can also come from the environment (or a `.env` file).
/// Values are read once at startup.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on
    #[arg(short, long, env = "SERVICE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, env = "SERVICE_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Session time-to-live in seconds, reset on every access
    #[arg(long, env = "SESSION_TIMEOUT", default_value_t = 1800)]
    pub session_timeout: u64,

    /// Maximum ids drawn per allocation before giving up
    #[arg(long, env = "RETRY_NUMBER", default_value_t = DEFAULT_RETRY_NUMBER)]
    pub retry_number: u32,

    /// Apply updates as separate delete and set calls (debugging only, not atomic)
    #[arg(
        long,
        env = "DEBUG_SEQUENTIAL_UPDATE",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub sequential_updates: bool,

    /// Maximum keys held in memory (0 for no limit); new sessions are refused when full
    #[arg(long, env = "STORE_MAX_KEYS", default_value_t = DEFAULT_MAX_KEYS)]
    pub max_keys: usize,

    /// Seconds between expired-key sweeps (0 disables the sweeper)
    #[arg(long, env = "STORE_CLEANUP_INTERVAL", default_value_t = 60)]
    pub cleanup_interval: u64,

    /// Redis server as host:port; sessions stay in memory when unset
    #[arg(long, env = "REDIS_SERVER_ADDR")]
    pub redis_addr: Option<String>,

    /// Redis ACL username
    #[arg(long, env = "REDIS_SERVER_USERNAME")]
    pub redis_username: Option<String>,

    /// Redis password
    #[arg(long, env = "REDIS_SERVER_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    /// Redis database number
    #[arg(long, env = "REDIS_SERVER_DB", default_value_t = 0)]
    pub redis_db: i64,
}

impl StartArgs {
    /// Engine configuration from these arguments.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_session_timeout(Duration::from_secs(self.session_timeout))
            .with_retry_number(self.retry_number)
            .with_sequential_updates(self.sequential_updates)
    }

    /// Store configuration from these arguments.
    pub fn store_config(&self) -> MemoryStoreConfig {
        MemoryStoreConfig::new()
            .with_max_keys(self.max_keys)
            .with_cleanup_task(self.cleanup_interval > 0)
            .with_cleanup_interval(Duration::from_secs(self.cleanup_interval))
    }

    /// Redis configuration, if a Redis address was given.
    pub fn redis_config(&self) -> Option<RedisStoreConfig> {
        let addr = self.redis_addr.as_deref().filter(|a| !a.is_empty())?;
        Some(
            RedisStoreConfig::new(addr)
                .with_username(self.redis_username.clone())
                .with_password(self.redis_password.clone())
                .with_db(self.redis_db),
        )
    }

    /// Server configuration from these arguments.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new().with_bind_address(SocketAddr::new(self.bind, self.port))
    }
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let engine_config = args.engine_config();
    let store_config = args.store_config();
    let server_config = args.server_config().with_request_logging(ctx.verbose);

    if engine_config.update_mode == UpdateMode::Sequential {
        warn!("Sequential update mode enabled: updates are NOT atomic, use for debugging only");
    }

    info!(
        session_timeout_secs = engine_config.session_timeout.as_secs(),
        retry_number = engine_config.retry_number,
        update_mode = engine_config.update_mode.as_str(),
        "Session engine configured"
    );

    let (store, sweeper) = open_store(&args, store_config).await?;

    let engine = SessionEngine::new(store, engine_config);
    let server = Server::new(engine, server_config);
    let addr = server.bind_address();

    if !ctx.json_output {
        println!("Tessel listening on http://{}", addr);
    }

    let result = server.run_until(addr, shutdown_signal()).await;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    result?;
    Ok(())
}

/// Connect to Redis when configured, otherwise build the in-memory store and its sweeper.
async fn open_store(
    args: &StartArgs,
    store_config: MemoryStoreConfig,
) -> Result<(SharedStore, Option<JoinHandle<()>>)> {
    if let Some(redis_config) = args.redis_config() {
        info!(addr = %redis_config.addr, db = redis_config.db, "Using Redis session store");
        let store = RedisStore::connect(&redis_config).await.map_err(|e| {
            anyhow::anyhow!("Failed to connect to Redis at {}: {}", redis_config.addr, e)
        })?;
        let store: SharedStore = Arc::new(store);
        return Ok((store, None));
    }

    info!(max_keys = store_config.max_keys, "Using in-memory session store");
    let memory = MemoryStore::new(store_config);
    let sweeper = memory.spawn_cleanup();
    let store: SharedStore = Arc::new(memory);
    Ok((store, sweeper))
}

/// Resolve when Ctrl-C is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

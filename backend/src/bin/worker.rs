//! Task-queue worker tier: consumes the shared PostgreSQL queue and runs
//! the periodic reconciliation jobs on cron streams.
//!
//! Shares no memory with the web tier; everything it touches goes through
//! PostgreSQL, Redis, or the object store.

use std::str::FromStr;
use std::sync::Arc;

use apalis::prelude::{Monitor, TokioExecutor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::{CronStream, Schedule};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use backend::domain::outbox::TaskSubmitter;
use backend::domain::presence::PresenceTracker;
use backend::outbound::cache::{connect_redis, RedisDedupGuard, RedisPresenceStore};
use backend::outbound::persistence::{
    DbPool, DieselContentRepository, DieselNotificationRepository, DieselUserRepository,
    PoolConfig,
};
use backend::outbound::queue::{task_storage, ApalisTaskQueue};
use backend::outbound::realtime::RedisRealtimePublisher;
use backend::outbound::storage::FsObjectStorage;
use backend::server::AppConfig;
use backend::workers::{self, WorkerContext};

/// Background worker for the forum consistency layer.
#[derive(Debug, Parser)]
#[command(name = "worker")]
struct Args {
    /// Number of concurrent task workers.
    #[arg(long, default_value_t = 2)]
    concurrency: usize,
}

/// Presence sync fires every minute.
const PRESENCE_SYNC_SCHEDULE: &str = "0 * * * * *";

/// Counter reconciliation fires at the top of every hour.
const COUNTER_RECONCILE_SCHEDULE: &str = "0 0 * * * *";

/// HTTP timeout for avatar downloads.
const DOWNLOAD_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = Args::parse();
    let config = AppConfig::from_env().wrap_err("worker configuration")?;

    let db_pool = DbPool::new(PoolConfig::new(&config.database_url))
        .await
        .wrap_err("database pool")?;
    let redis_pool = connect_redis(&config.redis_url).await.wrap_err("redis pool")?;
    let sqlx_pool = sqlx::PgPool::connect(&config.database_url)
        .await
        .wrap_err("task queue pool")?;
    let storage = task_storage(sqlx_pool).await.wrap_err("task queue setup")?;

    let submitter = TaskSubmitter::new(
        Arc::new(ApalisTaskQueue::new(storage.clone())),
        Arc::new(RedisDedupGuard::new(redis_pool.clone())),
    );
    let http = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .wrap_err("http client")?;
    let ctx = WorkerContext::new(
        Arc::new(DieselNotificationRepository::new(db_pool.clone())),
        Arc::new(DieselContentRepository::new(db_pool.clone())),
        Arc::new(DieselUserRepository::new(db_pool)),
        PresenceTracker::new(Arc::new(RedisPresenceStore::new(redis_pool.clone()))),
        Arc::new(FsObjectStorage::new(config.storage_root.clone())),
        Arc::new(RedisRealtimePublisher::new(redis_pool)),
        submitter,
        http,
    );

    let presence_schedule =
        Schedule::from_str(PRESENCE_SYNC_SCHEDULE).wrap_err("presence schedule")?;
    let reconcile_schedule =
        Schedule::from_str(COUNTER_RECONCILE_SCHEDULE).wrap_err("reconcile schedule")?;

    info!(concurrency = args.concurrency, "worker starting");
    Monitor::<TokioExecutor>::new()
        .register_with_count(args.concurrency, {
            WorkerBuilder::new("forum-tasks")
                .data(ctx.clone())
                .backend(storage)
                .build_fn(workers::run_task)
        })
        .register({
            WorkerBuilder::new("presence-sync")
                .data(ctx.clone())
                .backend(CronStream::new(presence_schedule))
                .build_fn(workers::run_presence_sync)
        })
        .register({
            WorkerBuilder::new("counter-reconcile")
                .data(ctx)
                .backend(CronStream::new(reconcile_schedule))
                .build_fn(workers::run_counter_reconcile)
        })
        .run()
        .await
        .wrap_err("worker monitor")?;
    Ok(())
}

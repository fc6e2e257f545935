use std::{error::Error, sync::Arc};

use chrono_tz::Tz;
use engine::{Engine, JsonFileStore, MemoryStore, SqliteStore, ZonedClock};
use migration::{Migrator, MigratorTrait};
use settings::Storage;
use tokio::sync::Mutex;

mod scheduler;
mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "mess_fund={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let tz: Tz = settings.scheduler.timezone.parse()?;
    let builder = Engine::builder().clock(Arc::new(ZonedClock::new(tz)));
    let builder = match &settings.storage {
        Storage::Memory => {
            tracing::warn!("using in-memory storage, nothing survives a restart");
            builder.store(MemoryStore::new())
        }
        Storage::Json { path } => builder.store(JsonFileStore::new(path)),
        Storage::Sqlite { path } => builder.store(SqliteStore::new(parse_database(path).await?)),
    };
    let engine = Arc::new(Mutex::new(builder.build().await?));

    if !settings.scheduler.enabled {
        tracing::info!("scheduler disabled, nothing to run");
        return Ok(());
    }

    let scheduler = scheduler::Scheduler::new(engine, tz, &settings.scheduler)?;
    tasks.spawn(scheduler.run());
    tasks.spawn(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {err}");
            return;
        }
        tracing::info!("shutting down");
    });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    path: &str,
) -> Result<sea_orm::DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let database = sea_orm::Database::connect(format!("sqlite:{path}?mode=rwc")).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

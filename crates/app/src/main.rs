use std::{sync::Arc, time::Duration};

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "expense_desk={level},server={level},engine={level},ledger={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.server.database).await?;

    let mut builder = engine::Engine::builder()
        .database(db.clone())
        .card_rules(settings.review.card_rules())
        .duplicate_policy(settings.review.duplicate_policy())
        .categories(settings.review.categories.clone());

    match settings.ledger {
        Some(ledger_settings) => {
            let timeout = Duration::from_secs(ledger_settings.timeout_secs);
            let router = ledger::LedgerRouter::from_configs(ledger_settings.accounts, timeout)?;
            builder = builder
                .ledger(Arc::new(router))
                .ledger_timeout(timeout)
                .directory_ttl(Duration::from_secs(ledger_settings.directory_ttl_secs));
        }
        None => tracing::warn!("no ledger settings, every entity is reported as not configured"),
    }
    let engine = builder.build().await?;

    let bind = settings
        .server
        .bind
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, settings.server.port);
    server::run(engine, db, &addr).await;

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

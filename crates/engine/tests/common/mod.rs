#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc};

use chrono::NaiveDate;
use engine::{CreateExpenseCmd, Engine, EngineBuilder, ExpenseView};
use ledger::MockLedger;
use migration::MigratorTrait;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

pub const USERS: [(&str, &str); 5] = [
    ("alice", "owner_only"),
    ("bob", "owner_only"),
    ("rita", "reviewer"),
    ("carl", "accountant"),
    ("adam", "admin"),
];

async fn seed_users(db: &DatabaseConnection) {
    let backend = db.get_database_backend();
    for (username, role) in USERS {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password, role) VALUES (?, ?, ?)",
            vec![username.into(), "password".into(), role.into()],
        ))
        .await
        .unwrap();
    }
}

pub async fn memory_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    seed_users(&db).await;
    db
}

/// File-backed database so that concurrent tasks use separate connections.
pub async fn file_db() -> (DatabaseConnection, PathBuf) {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    seed_users(&db).await;
    (db, path)
}

pub fn mock_ledger() -> Arc<MockLedger> {
    Arc::new(MockLedger::new(["alpha", "beta"]))
}

pub async fn engine_with(db: DatabaseConnection, ledger: Arc<MockLedger>) -> Engine {
    builder_with(db, ledger).build().await.unwrap()
}

pub fn builder_with(db: DatabaseConnection, ledger: Arc<MockLedger>) -> EngineBuilder {
    Engine::builder().database(db).ledger(ledger)
}

pub async fn engine() -> (Engine, Arc<MockLedger>) {
    let ledger = mock_ledger();
    let engine = engine_with(memory_db().await, ledger.clone()).await;
    (engine, ledger)
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

pub fn delta_flight(user: &str) -> CreateExpenseCmd {
    CreateExpenseCmd::new(user)
        .amount_minor(4250)
        .merchant("Delta Airlines")
        .category("Flights")
        .date(day(8))
}

pub async fn create(engine: &Engine, user: &str) -> ExpenseView {
    engine.create_expense(delta_flight(user)).await.unwrap()
}

pub async fn audit_len(engine: &Engine, id: Uuid) -> usize {
    engine.audit_trail(id, "adam").await.unwrap().len()
}

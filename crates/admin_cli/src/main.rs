use std::{collections::BTreeMap, error::Error, io::Write, time::Duration};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    terminal,
};
use engine::{Engine, Role};
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, QueryOrder, Set};
use uuid::Uuid;

mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub username: String,
        pub password: String,
        pub role: String,
        pub display_name: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "expense_desk_admin")]
#[command(about = "Operator utilities for the expense desk (users, audit trails, ledger)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./expenses.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Audit(Audit),
    Ledger(Ledger),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
    SetRole(SetRoleArgs),
    List,
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    /// owner_only, reviewer, accountant or admin.
    #[arg(long, default_value = "owner_only")]
    role: String,
    #[arg(long)]
    display_name: Option<String>,
}

#[derive(Args, Debug)]
struct SetRoleArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    role: String,
}

#[derive(Args, Debug)]
struct Audit {
    #[command(subcommand)]
    command: AuditCommand,
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Print the audit trail of one expense, oldest entry first.
    Show(AuditShowArgs),
}

#[derive(Args, Debug)]
struct AuditShowArgs {
    #[arg(long)]
    expense: Uuid,
    /// Acting user; must be allowed to read the expense.
    #[arg(long = "as")]
    acting_user: String,
}

#[derive(Args, Debug)]
struct Ledger {
    #[command(subcommand)]
    command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
enum LedgerCommand {
    /// Check every configured ledger account.
    Health(LedgerHealthArgs),
}

#[derive(Args, Debug)]
struct LedgerHealthArgs {
    /// Settings file holding the `[ledger]` table.
    #[arg(long, default_value = "settings")]
    settings: String,
}

#[derive(Debug, serde::Deserialize)]
struct LedgerSettings {
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default)]
    accounts: BTreeMap<String, ledger::AccountConfig>,
}

#[derive(Debug, serde::Deserialize)]
struct SettingsFile {
    ledger: Option<LedgerSettings>,
}

fn default_timeout_secs() -> u64 {
    15
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::try_from(raw).map_err(|err| err.to_string())
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> CliResult<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Read one line from the terminal without echoing it.
fn read_secret(prompt: &str) -> CliResult<String> {
    let mut err = std::io::stderr();
    write!(err, "{prompt}")?;
    err.flush()?;

    let _raw = RawModeGuard::enter()?;
    let mut secret = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };
        match code {
            KeyCode::Enter => break,
            KeyCode::Backspace => {
                secret.pop();
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                write!(err, "\r\n")?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) => secret.push(ch),
            _ => {}
        }
    }
    write!(err, "\r\n")?;
    Ok(secret)
}

fn new_password() -> CliResult<String> {
    for _ in 0..3 {
        let first = read_secret("Password: ")?;
        if first.is_empty() {
            eprintln!("Password must not be empty.");
            continue;
        }
        if read_secret("Confirm password: ")? == first {
            return Ok(first);
        }
        eprintln!("Passwords do not match. Try again.");
    }
    Err("too many attempts".into())
}

async fn connect_db(database_url: &str) -> CliResult<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn find_user(db: &DatabaseConnection, username: &str) -> CliResult<Option<users::Model>> {
    Ok(users::Entity::find_by_id(username.to_string()).one(db).await?)
}

async fn user_command(db: &DatabaseConnection, command: UserCommand) -> CliResult<()> {
    match command {
        UserCommand::Create(args) => {
            let role = parse_role(&args.role)?;
            if find_user(db, &args.username).await?.is_some() {
                eprintln!("user already exists: {}", args.username);
                std::process::exit(1);
            }
            let password = new_password()?;

            let user = users::ActiveModel {
                username: Set(args.username.clone()),
                password: Set(password),
                role: Set(role.as_str().to_string()),
                display_name: Set(args.display_name),
            };
            users::Entity::insert(user).exec(db).await?;
            println!("created user: {} ({})", args.username, role.as_str());
        }
        UserCommand::SetRole(args) => {
            let role = parse_role(&args.role)?;
            let Some(user) = find_user(db, &args.username).await? else {
                eprintln!("user not found: {}", args.username);
                std::process::exit(1);
            };
            let previous = user.role.clone();
            let mut user: users::ActiveModel = user.into();
            user.role = Set(role.as_str().to_string());
            user.update(db).await?;
            println!("{}: {previous} -> {}", args.username, role.as_str());
        }
        UserCommand::List => {
            let all = users::Entity::find()
                .order_by_asc(users::Column::Username)
                .all(db)
                .await?;
            for user in all {
                let name = user.display_name.as_deref().unwrap_or("-");
                println!("{:<20} {:<12} {name}", user.username, user.role);
            }
        }
    }
    Ok(())
}

async fn audit_command(db: &DatabaseConnection, command: AuditCommand) -> CliResult<()> {
    match command {
        AuditCommand::Show(args) => {
            let engine = Engine::builder().database(db.clone()).build().await?;
            let entries = engine.audit_trail(args.expense, &args.acting_user).await?;
            for entry in entries {
                println!(
                    "#{:<3} {} {:<16} by {}",
                    entry.seq,
                    entry.timestamp.to_rfc3339(),
                    entry.action.as_str(),
                    entry.acting_user_id
                );
                for (field, change) in entry.changes.iter() {
                    println!("       {field}: {} -> {}", change.old, change.new);
                }
            }
        }
    }
    Ok(())
}

async fn ledger_command(command: LedgerCommand) -> CliResult<()> {
    match command {
        LedgerCommand::Health(args) => {
            let file: SettingsFile = config::Config::builder()
                .add_source(config::File::with_name(&args.settings))
                .build()?
                .try_deserialize()?;
            let Some(settings) = file.ledger else {
                println!("no [ledger] table in {}", args.settings);
                return Ok(());
            };
            let timeout = Duration::from_secs(settings.timeout_secs);
            let router = ledger::LedgerRouter::from_configs(settings.accounts, timeout)?;
            for account in ledger::LedgerClient::health(&router).await {
                let state = if account.healthy { "ok" } else { "FAILING" };
                let kind = if account.mock { "mock" } else { "zoho" };
                println!(
                    "{:<16} {:<8} {:<5} {}",
                    account.entity, state, kind, account.message
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::User(User { command }) => {
            let db = connect_db(&cli.database_url).await?;
            user_command(&db, command).await?;
        }
        Command::Audit(Audit { command }) => {
            let db = connect_db(&cli.database_url).await?;
            audit_command(&db, command).await?;
        }
        Command::Ledger(Ledger { command }) => ledger_command(command).await?,
    }

    Ok(())
}

use std::{fmt, sync::Arc, time::Duration};

use ledger::{EntityDirectory, LedgerClient};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    CardRules, DuplicateMatch, DuplicatePolicy, Expense, ResultEngine, locks::ExpenseLocks,
};

mod access;
mod assignment;
mod audit;
mod expenses;
mod ledger_sync;
mod mutation;
mod review;
mod store;

pub use expenses::ExpenseListFilter;
pub use ledger_sync::PushOutcome;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_DIRECTORY_TTL: Duration = Duration::from_secs(60);

/// An expense as returned to callers: the record plus advisory warnings
/// computed at read time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExpenseView {
    pub expense: Expense,
    pub duplicate_check: Vec<DuplicateMatch>,
    pub stale_push: bool,
}

/// Per-id result of a bulk operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<ExpenseView>,
    pub failed: Vec<(Uuid, String)>,
}

struct LedgerWiring {
    client: Arc<dyn LedgerClient>,
    directory: EntityDirectory,
}

pub struct Engine {
    database: DatabaseConnection,
    ledger: Option<LedgerWiring>,
    locks: ExpenseLocks,
    card_rules: CardRules,
    duplicates: DuplicatePolicy,
    categories: Vec<String>,
    ledger_timeout: Duration,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field("ledger", &self.ledger.is_some())
            .field("card_rules", &self.card_rules)
            .field("duplicates", &self.duplicates)
            .field("ledger_timeout", &self.ledger_timeout)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn card_rules(&self) -> &CardRules {
        &self.card_rules
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicates
    }
}

/// The builder for `Engine`
pub struct EngineBuilder {
    database: DatabaseConnection,
    ledger: Option<Arc<dyn LedgerClient>>,
    ledger_timeout: Duration,
    directory_ttl: Duration,
    card_rules: CardRules,
    duplicates: DuplicatePolicy,
    categories: Vec<String>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            ledger: None,
            ledger_timeout: DEFAULT_LEDGER_TIMEOUT,
            directory_ttl: DEFAULT_DIRECTORY_TTL,
            card_rules: CardRules::default(),
            duplicates: DuplicatePolicy::default(),
            categories: Vec::new(),
        }
    }
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// External ledger. Without one every push reports `NotConfigured`.
    pub fn ledger(mut self, client: Arc<dyn LedgerClient>) -> EngineBuilder {
        self.ledger = Some(client);
        self
    }

    /// Hard bound on one ledger call.
    pub fn ledger_timeout(mut self, timeout: Duration) -> EngineBuilder {
        self.ledger_timeout = timeout;
        self
    }

    /// How long a positive "entity is ledger-enabled" answer is trusted.
    pub fn directory_ttl(mut self, ttl: Duration) -> EngineBuilder {
        self.directory_ttl = ttl;
        self
    }

    pub fn card_rules(mut self, rules: CardRules) -> EngineBuilder {
        self.card_rules = rules;
        self
    }

    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> EngineBuilder {
        self.duplicates = policy;
        self
    }

    /// Allowed categories. Empty accepts any non-empty category.
    pub fn categories(mut self, categories: Vec<String>) -> EngineBuilder {
        self.categories = categories;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let ledger = self.ledger.map(|client| LedgerWiring {
            directory: EntityDirectory::new(client.clone(), self.directory_ttl),
            client,
        });
        Ok(Engine {
            database: self.database,
            ledger,
            locks: ExpenseLocks::default(),
            card_rules: self.card_rules,
            duplicates: self.duplicates,
            categories: self.categories,
            ledger_timeout: self.ledger_timeout,
        })
    }
}

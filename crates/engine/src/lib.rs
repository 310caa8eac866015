//! Expense review and ledger synchronization engine.
//!
//! [`Engine`] is the only entry point for mutations. Each call resolves the
//! acting user's role once, serializes on the expense id, applies the review,
//! reimbursement and entity rules, commits the record with an optimistic
//! version check and appends exactly one audit entry.

pub use access::{Actor, Capability, Role, authorize};
pub use assignment::Reassignment;
pub use audit::{AuditAction, AuditEntry, ChangeSet, FieldChange};
pub use card_rules::{CardRule, CardRules};
pub use commands::{CreateExpenseCmd, OcrSuggestion, UpdateExpenseCmd};
pub use duplicates::{DuplicateMatch, DuplicatePolicy};
pub use error::{EngineError, ErrorCategory};
pub use expenses::Expense;
pub use money::Amount;
pub use ops::{
    BulkOutcome, Engine, EngineBuilder, ExpenseListFilter, ExpenseView, PushOutcome,
};
pub use review::{ReimbursementStatus, ReviewStatus};

pub mod assignment;
pub mod review;

mod access;
mod audit;
mod card_rules;
mod commands;
mod duplicates;
mod error;
mod expenses;
mod locks;
mod money;
mod ops;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;

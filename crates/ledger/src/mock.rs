//! Ledgers that never leave the process.
//!
//! [`MockAccount`] stands in for a real organization of a configured entity.
//! [`MockLedger`] is a whole scripted ledger used by tests: it counts calls,
//! can fail on demand and can be slowed down to exercise timeouts.

use std::{
    collections::{BTreeSet, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    AccountHealth, LedgerAccount, LedgerClient, LedgerError, LedgerExpense, LedgerReceipt,
    ResultLedger,
};

pub struct MockAccount {
    entity: String,
    organization_name: String,
    counter: AtomicU64,
}

impl MockAccount {
    pub fn new(entity: impl Into<String>, organization_name: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            organization_name: organization_name.into(),
            counter: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl LedgerAccount for MockAccount {
    async fn create_expense(&self, expense: &LedgerExpense) -> ResultLedger<LedgerReceipt> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let external_id = format!("MOCK-{}-{n}", self.entity.to_uppercase());
        tracing::info!(
            entity = %self.entity,
            expense_id = %expense.expense_id,
            external_id = %external_id,
            "mock ledger entry created"
        );
        Ok(LedgerReceipt {
            external_id,
            mock: true,
        })
    }

    async fn health(&self) -> AccountHealth {
        AccountHealth {
            entity: self.entity.clone(),
            healthy: true,
            mock: true,
            message: format!("mock account for {}", self.organization_name),
        }
    }
}

/// Scripted in-memory ledger.
#[derive(Debug)]
pub struct MockLedger {
    enabled: Mutex<BTreeSet<String>>,
    failures: Mutex<VecDeque<LedgerError>>,
    pushed: Mutex<Vec<(String, LedgerExpense)>>,
    prefix: String,
    next_id: AtomicU64,
    delay: Option<Duration>,
    directory_reads: AtomicU64,
}

impl MockLedger {
    /// Ids are handed out as `zb-1001`, `zb-1002`, ...
    pub fn new<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: Mutex::new(entities.into_iter().map(Into::into).collect()),
            failures: Mutex::new(VecDeque::new()),
            pushed: Mutex::new(Vec::new()),
            prefix: "zb-".to_string(),
            next_id: AtomicU64::new(1001),
            delay: None,
            directory_reads: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the next push fail with `err` (queued, first in first out).
    pub fn fail_next(&self, err: LedgerError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(err);
        }
    }

    pub fn enable(&self, entity: &str) {
        if let Ok(mut enabled) = self.enabled.lock() {
            enabled.insert(entity.to_string());
        }
    }

    pub fn disable(&self, entity: &str) {
        if let Ok(mut enabled) = self.enabled.lock() {
            enabled.remove(entity);
        }
    }

    /// Number of push calls that reached the ledger (including failed ones).
    pub fn calls(&self) -> usize {
        self.pushed.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn pushed(&self) -> Vec<(String, LedgerExpense)> {
        self.pushed.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn directory_reads(&self) -> u64 {
        self.directory_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn push(&self, entity: &str, expense: &LedgerExpense) -> ResultLedger<LedgerReceipt> {
        if let Ok(mut pushed) = self.pushed.lock() {
            pushed.push((entity.to_string(), expense.clone()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        if let Some(err) = scripted {
            return Err(err);
        }
        let known = self
            .enabled
            .lock()
            .map(|e| e.contains(entity))
            .unwrap_or_default();
        if !known {
            return Err(LedgerError::NotConfigured(entity.to_string()));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(LedgerReceipt {
            external_id: format!("{}{n}", self.prefix),
            mock: true,
        })
    }

    async fn enabled_entities(&self) -> ResultLedger<Vec<String>> {
        self.directory_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .enabled
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default())
    }
}

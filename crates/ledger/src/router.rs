//! Per-entity dispatch.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    AccountHealth, LedgerAccount, LedgerClient, LedgerError, LedgerExpense, LedgerReceipt,
    MockAccount, ResultLedger, ZohoBooks, ZohoConfig,
};

fn default_true() -> bool {
    true
}

/// One entry of the `ledger.accounts` table in the settings file.
#[derive(Clone, Debug, Deserialize)]
pub struct AccountConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mock: bool,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub accounts_base_url: Option<String>,
    #[serde(default)]
    pub expense_account: Option<String>,
    #[serde(default)]
    pub paid_through_account: Option<String>,
}

impl AccountConfig {
    fn into_zoho(self, entity: &str) -> ZohoConfig {
        ZohoConfig {
            entity: entity.to_string(),
            organization_id: self.organization_id,
            organization_name: self.organization_name,
            client_id: self.client_id,
            client_secret: self.client_secret,
            refresh_token: self.refresh_token,
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| "https://www.zohoapis.com/books/v3".to_string()),
            accounts_base_url: self
                .accounts_base_url
                .unwrap_or_else(|| "https://accounts.zoho.com/oauth/v2".to_string()),
            expense_account: self
                .expense_account
                .unwrap_or_else(|| "Travel Expenses".to_string()),
            paid_through_account: self
                .paid_through_account
                .unwrap_or_else(|| "Petty Cash".to_string()),
        }
    }
}

/// Routes each push to the account of the target entity.
#[derive(Default)]
pub struct LedgerRouter {
    accounts: BTreeMap<String, Arc<dyn LedgerAccount>>,
}

impl LedgerRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `account` for `entity`, replacing any previous one.
    #[must_use]
    pub fn account(mut self, entity: impl Into<String>, account: Arc<dyn LedgerAccount>) -> Self {
        self.accounts.insert(entity.into(), account);
        self
    }

    /// Build the router from the settings table. Disabled entries are skipped.
    pub fn from_configs(
        configs: BTreeMap<String, AccountConfig>,
        timeout: Duration,
    ) -> ResultLedger<Self> {
        let mut router = Self::new();
        for (entity, config) in configs {
            if !config.enabled {
                tracing::info!(%entity, "ledger account disabled");
                continue;
            }
            let account: Arc<dyn LedgerAccount> = if config.mock {
                let name = if config.organization_name.is_empty() {
                    format!("{entity} (mock)")
                } else {
                    config.organization_name.clone()
                };
                Arc::new(MockAccount::new(entity.clone(), name))
            } else {
                Arc::new(ZohoBooks::new(config.into_zoho(&entity), timeout)?)
            };
            tracing::info!(%entity, "ledger account registered");
            router = router.account(entity, account);
        }
        Ok(router)
    }
}

#[async_trait]
impl LedgerClient for LedgerRouter {
    async fn push(&self, entity: &str, expense: &LedgerExpense) -> ResultLedger<LedgerReceipt> {
        let account = self
            .accounts
            .get(entity)
            .ok_or_else(|| LedgerError::NotConfigured(entity.to_string()))?;
        account.create_expense(expense).await
    }

    async fn enabled_entities(&self) -> ResultLedger<Vec<String>> {
        Ok(self.accounts.keys().cloned().collect())
    }

    async fn health(&self) -> Vec<AccountHealth> {
        let mut out = Vec::with_capacity(self.accounts.len());
        for account in self.accounts.values() {
            out.push(account.health().await);
        }
        out
    }
}

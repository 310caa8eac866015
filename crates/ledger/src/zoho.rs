//! Zoho Books organization client.
//!
//! Access tokens are obtained from a long-lived refresh token and cached until
//! shortly before they expire. A 401 from the API drops the cached token so the
//! next call refreshes it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{AccountHealth, LedgerAccount, LedgerError, LedgerExpense, LedgerReceipt, ResultLedger};

const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(300);

#[derive(Clone, Debug, Deserialize)]
pub struct ZohoConfig {
    pub entity: String,
    pub organization_id: String,
    pub organization_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub api_base_url: String,
    pub accounts_base_url: String,
    pub expense_account: String,
    pub paid_through_account: String,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct ZohoBooks {
    config: ZohoConfig,
    api_base: Url,
    accounts_base: Url,
    http: Client,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExpensePayload<'a> {
    expense_date: String,
    amount: serde_json::Value,
    vendor_name: &'a str,
    description: String,
    reference_number: String,
    account_name: &'a str,
    paid_through_account_name: &'a str,
    is_billable: bool,
    is_inclusive_tax: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    message: String,
    expense: Option<CreatedExpense>,
}

#[derive(Debug, Deserialize)]
struct CreatedExpense {
    expense_id: String,
}

/// Join `path` onto a base URL that may or may not end with a slash.
fn endpoint(base: &Url, path: &str) -> ResultLedger<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
        .map_err(|err| LedgerError::Misconfigured(format!("invalid ledger url: {err}")))
}

impl ZohoBooks {
    pub fn new(config: ZohoConfig, timeout: Duration) -> ResultLedger<Self> {
        let api_base = Url::parse(&config.api_base_url)
            .map_err(|err| LedgerError::Misconfigured(format!("invalid api_base_url: {err}")))?;
        let accounts_base = Url::parse(&config.accounts_base_url).map_err(|err| {
            LedgerError::Misconfigured(format!("invalid accounts_base_url: {err}"))
        })?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            config,
            api_base,
            accounts_base,
            http,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> ResultLedger<String> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref()
            && Instant::now() < current.expires_at
        {
            return Ok(current.value.clone());
        }

        tracing::info!(entity = %self.config.entity, "refreshing ledger access token");
        let url = endpoint(&self.accounts_base, "token")?;
        let res = self
            .http
            .post(url)
            .query(&[
                ("refresh_token", self.config.refresh_token.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(match LedgerError::from_status(status, body) {
                LedgerError::Misconfigured(msg) => LedgerError::Auth(msg),
                other => other,
            });
        }
        let body: TokenResponse = res.json().await?;
        // Zoho answers 200 with an `error` field for revoked/invalid grants.
        if let Some(error) = body.error {
            return Err(LedgerError::Auth(error));
        }
        let Some(value) = body.access_token else {
            return Err(LedgerError::Auth(
                "token response without access_token".to_string(),
            ));
        };
        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        let expires_at = Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN);
        *token = Some(AccessToken {
            value: value.clone(),
            expires_at,
        });
        Ok(value)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    fn payload<'a>(&'a self, expense: &'a LedgerExpense) -> ExpensePayload<'a> {
        let amount = expense
            .amount_decimal()
            .parse::<serde_json::Number>()
            .map(serde_json::Value::Number)
            .unwrap_or_else(|_| serde_json::Value::String(expense.amount_decimal()));
        let reference_number = match expense.event_id.as_deref() {
            Some(event) => format!("{event} - {}", expense.merchant),
            None => expense.merchant.clone(),
        };
        ExpensePayload {
            expense_date: expense.date.format("%Y-%m-%d").to_string(),
            amount,
            vendor_name: &expense.merchant,
            description: expense.summary(),
            reference_number,
            account_name: &self.config.expense_account,
            paid_through_account_name: &self.config.paid_through_account,
            is_billable: false,
            is_inclusive_tax: false,
        }
    }
}

#[async_trait]
impl LedgerAccount for ZohoBooks {
    async fn create_expense(&self, expense: &LedgerExpense) -> ResultLedger<LedgerReceipt> {
        let token = self.access_token().await?;
        let url = endpoint(&self.api_base, "expenses")?;
        let res = self
            .http
            .post(url)
            .query(&[("organization_id", self.config.organization_id.as_str())])
            .header("Authorization", format!("Zoho-oauthtoken {token}"))
            .header("X-Idempotency-Key", expense.idempotency_key.as_str())
            .json(&self.payload(expense))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let err = LedgerError::from_status(status, body);
            if matches!(err, LedgerError::Auth(_)) {
                self.forget_token().await;
            }
            return Err(err);
        }

        let body: ApiResponse = res.json().await?;
        if body.code != 0 {
            return Err(LedgerError::Misconfigured(format!(
                "ledger error {}: {}",
                body.code, body.message
            )));
        }
        let created = body.expense.ok_or_else(|| {
            LedgerError::Misconfigured("ledger response without expense".to_string())
        })?;
        tracing::info!(
            entity = %self.config.entity,
            expense_id = %expense.expense_id,
            external_id = %created.expense_id,
            "ledger entry created"
        );
        Ok(LedgerReceipt {
            external_id: created.expense_id,
            mock: false,
        })
    }

    async fn health(&self) -> AccountHealth {
        let probe = async {
            let token = self.access_token().await?;
            let url = endpoint(&self.api_base, "organizations")?;
            let res = self
                .http
                .get(url)
                .header("Authorization", format!("Zoho-oauthtoken {token}"))
                .send()
                .await?;
            let status = res.status();
            if !status.is_success() {
                return Err(LedgerError::from_status(status, res.text().await.unwrap_or_default()));
            }
            Ok::<(), LedgerError>(())
        };
        let (healthy, message) = match probe.await {
            Ok(()) => (
                true,
                format!(
                    "connected to {} ({})",
                    self.config.organization_name, self.config.organization_id
                ),
            ),
            Err(err) => (false, err.to_string()),
        };
        AccountHealth {
            entity: self.config.entity.clone(),
            healthy,
            mock: false,
            message,
        }
    }
}

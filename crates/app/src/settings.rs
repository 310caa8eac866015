//! Settings for the service, read from `settings.toml` (optional) and
//! `APP__`-prefixed environment variables, e.g. `APP__SERVER__PORT=8080`.
use std::collections::BTreeMap;

use config::{Config, ConfigError, Environment, File};
use engine::{CardRule, CardRules, DuplicatePolicy};
use ledger::AccountConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Ledger {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_directory_ttl_secs")]
    pub directory_ttl_secs: u64,
    /// Entity code to account.
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_directory_ttl_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
pub struct Review {
    #[serde(default = "default_window_days")]
    pub duplicate_window_days: i64,
    #[serde(default)]
    pub duplicate_amount_tolerance_minor: u64,
    pub card_rules: Option<Vec<CardRule>>,
    /// Allowed categories; empty accepts any.
    #[serde(default)]
    pub categories: Vec<String>,
}

impl Default for Review {
    fn default() -> Self {
        Self {
            duplicate_window_days: default_window_days(),
            duplicate_amount_tolerance_minor: 0,
            card_rules: None,
            categories: Vec::new(),
        }
    }
}

fn default_window_days() -> i64 {
    1
}

impl Review {
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        DuplicatePolicy {
            window_days: self.duplicate_window_days,
            amount_tolerance_minor: self.duplicate_amount_tolerance_minor,
        }
    }

    pub fn card_rules(&self) -> CardRules {
        match &self.card_rules {
            Some(rules) => CardRules::new(rules.clone()),
            None => CardRules::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Server,
    pub ledger: Option<Ledger>,
    #[serde(default)]
    pub review: Review,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

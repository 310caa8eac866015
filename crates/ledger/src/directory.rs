//! Read-mostly cache of the ledger-enabled entity set.
//!
//! A cached hit ("entity is enabled") is trusted for `ttl`: if it turns out
//! to be stale the ledger itself rejects the push. A miss is never trusted:
//! the set is re-read before an entity is declared not configured.

use std::{
    collections::BTreeSet,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::RwLock;

use crate::{LedgerClient, ResultLedger};

struct Snapshot {
    fetched_at: Instant,
    entities: BTreeSet<String>,
}

pub struct EntityDirectory {
    client: Arc<dyn LedgerClient>,
    ttl: Duration,
    cache: RwLock<Option<Snapshot>>,
}

impl EntityDirectory {
    pub fn new(client: Arc<dyn LedgerClient>, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Returns whether `entity` can be pushed to right now.
    pub async fn is_enabled(&self, entity: &str) -> ResultLedger<bool> {
        {
            let cache = self.cache.read().await;
            if let Some(snapshot) = cache.as_ref()
                && snapshot.fetched_at.elapsed() < self.ttl
                && snapshot.entities.contains(entity)
            {
                return Ok(true);
            }
        }
        let fresh = self.refresh().await?;
        Ok(fresh.contains(entity))
    }

    /// All enabled entities, served from cache while fresh.
    pub async fn entities(&self) -> ResultLedger<BTreeSet<String>> {
        {
            let cache = self.cache.read().await;
            if let Some(snapshot) = cache.as_ref()
                && snapshot.fetched_at.elapsed() < self.ttl
            {
                return Ok(snapshot.entities.clone());
            }
        }
        self.refresh().await
    }

    pub async fn refresh(&self) -> ResultLedger<BTreeSet<String>> {
        let entities: BTreeSet<String> = self.client.enabled_entities().await?.into_iter().collect();
        let mut cache = self.cache.write().await;
        *cache = Some(Snapshot {
            fetched_at: Instant::now(),
            entities: entities.clone(),
        });
        tracing::debug!(count = entities.len(), "ledger entity directory refreshed");
        Ok(entities)
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockLedger;

    #[tokio::test]
    async fn hit_is_served_from_cache() {
        let ledger = Arc::new(MockLedger::new(["alpha"]));
        let directory = EntityDirectory::new(ledger.clone(), Duration::from_secs(60));

        assert!(directory.is_enabled("alpha").await.unwrap());
        assert!(directory.is_enabled("alpha").await.unwrap());
        assert_eq!(ledger.directory_reads(), 1);
    }

    #[tokio::test]
    async fn miss_always_rereads() {
        let ledger = Arc::new(MockLedger::new(["alpha"]));
        let directory = EntityDirectory::new(ledger.clone(), Duration::from_secs(60));

        assert!(directory.is_enabled("alpha").await.unwrap());
        ledger.enable("beta");
        // cached set does not contain beta, so the miss forces a fresh read
        assert!(directory.is_enabled("beta").await.unwrap());
        assert_eq!(ledger.directory_reads(), 2);
        assert!(!directory.is_enabled("gamma").await.unwrap());
        assert_eq!(ledger.directory_reads(), 3);
    }

    #[tokio::test]
    async fn expired_hit_is_rechecked() {
        let ledger = Arc::new(MockLedger::new(["alpha"]));
        let directory = EntityDirectory::new(ledger.clone(), Duration::ZERO);

        assert!(directory.is_enabled("alpha").await.unwrap());
        ledger.disable("alpha");
        assert!(!directory.is_enabled("alpha").await.unwrap());
    }
}

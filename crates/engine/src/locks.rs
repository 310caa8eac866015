//! Per-expense serialization point.
//!
//! Mutations of one expense queue behind each other; different expenses
//! never share a lock. Entries are dropped once nobody holds or waits on
//! them.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
pub(crate) struct ExpenseLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl ExpenseLocks {
    pub(crate) async fn acquire(&self, expense_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.retain(|id, slot| *id == expense_id || Arc::strong_count(slot) > 1);
            slots.entry(expense_id).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_expense_waits() {
        let locks = Arc::new(ExpenseLocks::default());
        let id = Uuid::new_v4();

        let guard = locks.acquire(id).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_expenses_do_not_block() {
        let locks = ExpenseLocks::default();
        let _a = locks.acquire(Uuid::new_v4()).await;
        tokio::time::timeout(Duration::from_millis(100), locks.acquire(Uuid::new_v4()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn released_slots_are_dropped() {
        let locks = ExpenseLocks::default();
        for _ in 0..10 {
            let _guard = locks.acquire(Uuid::new_v4()).await;
        }
        let _guard = locks.acquire(Uuid::new_v4()).await;
        assert_eq!(locks.len(), 1);
    }
}

mod common;

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use engine::{AuditAction, EngineError, ErrorCategory, ReviewStatus, UpdateExpenseCmd};
use ledger::{LedgerError, MockLedger};
use sea_orm::{ConnectionTrait, Statement};
use serde_json::{Value, json};

use common::{audit_len, builder_with, create, engine, engine_with, file_db, memory_db};

async fn approved_and_assigned(engine: &engine::Engine, entity: &str) -> uuid::Uuid {
    let id = create(engine, "alice").await.expense.id;
    engine
        .set_status(id, ReviewStatus::Approved, "rita")
        .await
        .unwrap();
    engine.assign_entity(id, entity, "rita").await.unwrap();
    id
}

fn assert_entity_invariant(expense: &engine::Expense) {
    assert!(
        expense.zoho_expense_id.is_none() || expense.zoho_entity.is_some(),
        "external id without entity: {expense:?}"
    );
}

#[tokio::test]
async fn push_is_idempotent() {
    let (engine, ledger) = engine().await;
    let id = approved_and_assigned(&engine, "alpha").await;

    let first = engine.push_to_ledger(id, "rita").await.unwrap();
    let second = engine.push_to_ledger(id, "carl").await.unwrap();

    assert!(!first.already_pushed);
    assert!(second.already_pushed);
    assert_eq!(first.external_id, second.external_id);
    assert_eq!(ledger.calls(), 1);

    let trail = engine.audit_trail(id, "rita").await.unwrap();
    let pushes = trail
        .iter()
        .filter(|e| e.action == AuditAction::PushedToZoho)
        .count();
    assert_eq!(pushes, 1);
    assert_eq!(trail.len(), 4);
}

#[tokio::test]
async fn push_without_entity_is_a_precondition_failure() {
    let (engine, ledger) = engine().await;
    let id = create(&engine, "alice").await.expense.id;

    let err = engine.push_to_ledger(id, "rita").await.unwrap_err();
    assert_eq!(
        err,
        EngineError::PreconditionFailed("no entity assigned".to_string())
    );
    assert_eq!(ledger.calls(), 0);
}

#[tokio::test]
async fn push_to_unconfigured_entity_is_a_notice() {
    let (engine, ledger) = engine().await;
    let id = approved_and_assigned(&engine, "unknown-entity").await;
    let before = audit_len(&engine, id).await;

    let err = engine.push_to_ledger(id, "rita").await.unwrap_err();
    assert_eq!(err, EngineError::NotConfigured("unknown-entity".to_string()));
    assert_eq!(err.category(), ErrorCategory::Notice);
    assert_eq!(ledger.calls(), 0);

    let view = engine.expense(id, "rita").await.unwrap();
    assert_eq!(view.expense.zoho_expense_id, None);
    assert_eq!(view.expense.zoho_entity.as_deref(), Some("unknown-entity"));
    assert_eq!(view.expense.status, ReviewStatus::Approved);
    assert_eq!(audit_len(&engine, id).await, before);
}

#[tokio::test]
async fn engine_without_ledger_reports_not_configured() {
    let engine = engine::Engine::builder()
        .database(memory_db().await)
        .build()
        .await
        .unwrap();
    let id = approved_and_assigned(&engine, "alpha").await;

    let err = engine.push_to_ledger(id, "rita").await.unwrap_err();
    assert!(matches!(err, EngineError::NotConfigured(_)));
    assert!(engine.ledger_entities().await.unwrap().is_empty());
}

#[tokio::test]
async fn reassignment_invalidates_push_and_allows_a_new_one() {
    let (engine, ledger) = engine().await;
    let id = approved_and_assigned(&engine, "alpha").await;
    let first = engine.push_to_ledger(id, "rita").await.unwrap();
    assert_eq!(first.external_id, "zb-1001");

    let view = engine.assign_entity(id, "beta", "carl").await.unwrap();
    assert_eq!(view.expense.zoho_entity.as_deref(), Some("beta"));
    assert_eq!(view.expense.zoho_expense_id, None);
    assert!(!view.stale_push);
    assert_entity_invariant(&view.expense);

    let trail = engine.audit_trail(id, "rita").await.unwrap();
    let entry = trail.last().unwrap();
    assert_eq!(entry.action, AuditAction::EntityAssigned);
    assert_eq!(entry.changes.get("zohoEntity").unwrap().old, json!("alpha"));
    assert_eq!(entry.changes.get("zohoEntity").unwrap().new, json!("beta"));
    assert_eq!(
        entry.changes.get("zohoExpenseId").unwrap().old,
        json!("zb-1001")
    );
    assert_eq!(entry.changes.get("zohoExpenseId").unwrap().new, Value::Null);

    let second = engine.push_to_ledger(id, "rita").await.unwrap();
    assert_eq!(second.external_id, "zb-1002");
    assert!(!second.already_pushed);
    assert_eq!(ledger.calls(), 2);

    let pushed = ledger.pushed();
    assert_eq!(pushed[0].0, "alpha");
    assert_eq!(pushed[1].0, "beta");
    assert_ne!(pushed[0].1.idempotency_key, pushed[1].1.idempotency_key);
}

#[tokio::test]
async fn unassigning_a_pushed_expense_clears_the_external_id() {
    let (engine, _ledger) = engine().await;
    let id = approved_and_assigned(&engine, "alpha").await;
    engine.push_to_ledger(id, "rita").await.unwrap();

    let view = engine.assign_entity(id, "", "rita").await.unwrap();
    assert_eq!(view.expense.zoho_entity, None);
    assert_eq!(view.expense.zoho_expense_id, None);
    assert_entity_invariant(&view.expense);

    let err = engine.push_to_ledger(id, "rita").await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
}

#[tokio::test]
async fn same_entity_keeps_the_push() {
    let (engine, ledger) = engine().await;
    let id = approved_and_assigned(&engine, "alpha").await;
    engine.push_to_ledger(id, "rita").await.unwrap();
    let entries = audit_len(&engine, id).await;

    let view = engine.assign_entity(id, "alpha", "carl").await.unwrap();
    assert_eq!(view.expense.zoho_expense_id.as_deref(), Some("zb-1001"));
    assert!(!view.stale_push);

    let trail = engine.audit_trail(id, "rita").await.unwrap();
    assert_eq!(trail.len(), entries + 1);
    let last = trail.last().unwrap();
    assert_eq!(last.action, AuditAction::EntityAssigned);
    assert_eq!(last.acting_user_id, "carl");
    assert!(last.changes.is_empty());

    let outcome = engine.push_to_ledger(id, "rita").await.unwrap();
    assert!(outcome.already_pushed);
    assert_eq!(ledger.calls(), 1);
}

#[tokio::test]
async fn transient_failure_leaves_no_trace() {
    let (engine, ledger) = engine().await;
    let id = approved_and_assigned(&engine, "alpha").await;
    let before = engine.expense(id, "rita").await.unwrap().expense;
    let entries = audit_len(&engine, id).await;

    ledger.fail_next(LedgerError::Transient("connection reset".to_string()));
    let err = engine.push_to_ledger(id, "rita").await.unwrap_err();
    assert!(matches!(err, EngineError::Transient(_)));
    assert!(err.is_retryable());

    let after = engine.expense(id, "rita").await.unwrap().expense;
    assert_eq!(after, before);
    assert_eq!(audit_len(&engine, id).await, entries);

    let retried = engine.push_to_ledger(id, "rita").await.unwrap();
    assert_eq!(retried.external_id, "zb-1001");
    assert_eq!(ledger.calls(), 2);
}

#[tokio::test]
async fn ledger_auth_failure_is_a_system_error() {
    let (engine, ledger) = engine().await;
    let id = approved_and_assigned(&engine, "alpha").await;

    ledger.fail_next(LedgerError::Auth("invalid_code".to_string()));
    let err = engine.push_to_ledger(id, "rita").await.unwrap_err();
    assert_eq!(err, EngineError::LedgerAuth("invalid_code".to_string()));
    assert_eq!(err.category(), ErrorCategory::SystemError);

    ledger.fail_next(LedgerError::Misconfigured("account missing".to_string()));
    let err = engine.push_to_ledger(id, "rita").await.unwrap_err();
    assert!(matches!(err, EngineError::LedgerMisconfigured(_)));

    let view = engine.expense(id, "rita").await.unwrap();
    assert_eq!(view.expense.zoho_expense_id, None);
}

#[tokio::test]
async fn slow_ledger_times_out_as_transient() {
    let ledger = Arc::new(MockLedger::new(["alpha"]).with_delay(Duration::from_millis(500)));
    let engine = builder_with(memory_db().await, ledger.clone())
        .ledger_timeout(Duration::from_millis(50))
        .build()
        .await
        .unwrap();
    let id = approved_and_assigned(&engine, "alpha").await;

    let err = engine.push_to_ledger(id, "rita").await.unwrap_err();
    assert!(matches!(err, EngineError::Transient(_)));
    let view = engine.expense(id, "rita").await.unwrap();
    assert_eq!(view.expense.zoho_expense_id, None);
}

#[tokio::test]
async fn stale_directory_never_fakes_success() {
    let ledger = Arc::new(MockLedger::new(["alpha"]));
    let engine = builder_with(memory_db().await, ledger.clone())
        .directory_ttl(Duration::from_secs(3600))
        .build()
        .await
        .unwrap();
    let a = approved_and_assigned(&engine, "alpha").await;
    let b = approved_and_assigned(&engine, "alpha").await;
    engine.push_to_ledger(a, "rita").await.unwrap();

    // directory still says alpha is enabled; the ledger disagrees
    ledger.disable("alpha");
    let err = engine.push_to_ledger(b, "rita").await.unwrap_err();
    assert!(matches!(err, EngineError::NotConfigured(_)));
    let view = engine.expense(b, "rita").await.unwrap();
    assert_eq!(view.expense.zoho_expense_id, None);

    // a miss is re-read, so a newly enabled entity is usable at once
    ledger.enable("gamma");
    engine.assign_entity(b, "gamma", "rita").await.unwrap();
    let pushed = engine.push_to_ledger(b, "rita").await.unwrap();
    assert!(!pushed.already_pushed);
}

#[tokio::test]
async fn change_after_push_marks_stale() {
    let (engine, _ledger) = engine().await;
    let id = approved_and_assigned(&engine, "alpha").await;
    let pushed = engine.push_to_ledger(id, "rita").await.unwrap();
    assert!(!pushed.view.stale_push);

    let view = engine
        .set_status(id, ReviewStatus::Rejected, "adam")
        .await
        .unwrap();
    assert!(view.stale_push);
    assert_eq!(view.expense.zoho_expense_id.as_deref(), Some("zb-1001"));

    let view = engine
        .update_expense(UpdateExpenseCmd::new(id, "rita").amount_minor(4300))
        .await
        .unwrap();
    assert!(view.stale_push);
}

#[tokio::test]
async fn bulk_assignment_reports_each_id() {
    let (engine, _ledger) = engine().await;
    let a = create(&engine, "alice").await.expense.id;
    let b = create(&engine, "bob").await.expense.id;

    let outcome = engine.bulk_assign_entity(&[a, b], "beta", "rita").await;
    assert_eq!(outcome.succeeded.len(), 2);
    assert!(outcome.failed.is_empty());

    let outcome = engine.bulk_assign_entity(&[a, b], "alpha", "alice").await;
    assert!(outcome.succeeded.is_empty());
    assert_eq!(outcome.failed.len(), 2);
}

#[tokio::test]
async fn ledger_health_is_for_reviewers() {
    let (engine, _ledger) = engine().await;
    assert!(matches!(
        engine.ledger_health("alice").await.unwrap_err(),
        EngineError::Forbidden(_)
    ));
    // MockLedger has no per-account report
    assert!(engine.ledger_health("adam").await.unwrap().is_empty());
    let entities = engine.ledger_entities().await.unwrap();
    assert!(entities.contains("alpha"));
}

#[tokio::test]
async fn concurrent_pushes_create_one_ledger_entry() {
    let (db, path) = file_db().await;
    let ledger = Arc::new(MockLedger::new(["alpha"]).with_delay(Duration::from_millis(100)));
    let engine = Arc::new(engine_with(db, ledger.clone()).await);
    let id = approved_and_assigned(&engine, "alpha").await;

    let mut handles = Vec::new();
    for user in ["rita", "carl", "adam", "rita"] {
        let engine = engine.clone();
        handles.push(tokio::spawn(
            async move { engine.push_to_ledger(id, user).await },
        ));
    }
    let mut external_ids = Vec::new();
    let mut fresh = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if !outcome.already_pushed {
            fresh += 1;
        }
        external_ids.push(outcome.external_id);
    }

    assert_eq!(fresh, 1);
    assert_eq!(ledger.calls(), 1);
    assert!(external_ids.iter().all(|e| e == "zb-1001"));

    let trail = engine.audit_trail(id, "rita").await.unwrap();
    let pushes = trail
        .iter()
        .filter(|e| e.action == AuditAction::PushedToZoho)
        .count();
    assert_eq!(pushes, 1);

    drop(engine);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn engines_sharing_a_database_push_once() {
    let (db, path) = file_db().await;
    let ledger = Arc::new(MockLedger::new(["alpha"]).with_delay(Duration::from_millis(200)));
    let first = Arc::new(engine_with(db.clone(), ledger.clone()).await);
    let second = Arc::new(engine_with(db, ledger.clone()).await);
    let id = approved_and_assigned(&first, "alpha").await;

    let handles = [(first.clone(), "rita"), (second.clone(), "carl")].map(|(engine, user)| {
        tokio::spawn(async move { engine.push_to_ledger(id, user).await })
    });
    let mut fresh = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert_eq!(outcome.external_id, "zb-1001");
                if !outcome.already_pushed {
                    fresh += 1;
                }
            }
            // the other engine held the claim
            Err(err) => assert!(matches!(err, EngineError::Transient(_)), "{err}"),
        }
    }
    assert_eq!(fresh, 1);
    assert_eq!(ledger.calls(), 1);

    let retried = second.push_to_ledger(id, "carl").await.unwrap();
    assert!(retried.already_pushed);
    assert_eq!(retried.external_id, "zb-1001");
    let pushes = first
        .audit_trail(id, "rita")
        .await
        .unwrap()
        .iter()
        .filter(|e| e.action == AuditAction::PushedToZoho)
        .count();
    assert_eq!(pushes, 1);

    drop((first, second));
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn live_push_claim_blocks_until_it_lapses() {
    let db = memory_db().await;
    let ledger = Arc::new(MockLedger::new(["alpha"]));
    let engine = builder_with(db.clone(), ledger.clone())
        .ledger_timeout(Duration::from_millis(50))
        .build()
        .await
        .unwrap();
    let id = approved_and_assigned(&engine, "alpha").await;
    let entries = audit_len(&engine, id).await;

    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "UPDATE expenses SET push_claim = ?, push_claimed_at = ? WHERE id = ?",
        vec!["other-worker".into(), Utc::now().into(), id.to_string().into()],
    ))
    .await
    .unwrap();

    let err = engine.push_to_ledger(id, "rita").await.unwrap_err();
    assert!(matches!(err, EngineError::Transient(_)));
    assert!(err.is_retryable());
    assert_eq!(ledger.calls(), 0);
    assert_eq!(audit_len(&engine, id).await, entries);

    // lease is twice the ledger timeout
    tokio::time::sleep(Duration::from_millis(150)).await;
    let outcome = engine.push_to_ledger(id, "rita").await.unwrap();
    assert!(!outcome.already_pushed);
    assert_eq!(ledger.calls(), 1);
    assert_eq!(audit_len(&engine, id).await, entries + 1);
}

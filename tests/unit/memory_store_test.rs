//! Tests for in-memory transactions: staging, row locks, and conditional ledger writes

use std::time::Duration;

use counsellor_capacity::core::{CapacityError, CounsellorRow, NewCounsellor, NewLead, Storage};
use counsellor_capacity::infra::InMemoryStorage;

fn row(name: &str, max_capacity: u32) -> CounsellorRow {
    CounsellorRow {
        fields: NewCounsellor {
            name: name.into(),
            email: format!("{name}@example.com"),
            ..NewCounsellor::default()
        },
        max_capacity,
        now_ms: 1,
    }
}

async fn seeded(storage: &InMemoryStorage, max_capacity: u32) -> u64 {
    let mut tx = storage.begin().await.unwrap();
    let id = tx.insert_counsellor(row("seed", max_capacity)).await.unwrap();
    tx.commit().await.unwrap();
    id
}

#[tokio::test]
async fn test_staged_writes_invisible_until_commit() {
    let storage = InMemoryStorage::new();
    let mut tx = storage.begin().await.unwrap();
    let id = tx.insert_counsellor(row("asha", 3)).await.unwrap();

    assert!(tx.lock_counsellor(id).await.unwrap().is_some());
    assert!(storage.get_counsellor(id).await.unwrap().is_none());

    tx.commit().await.unwrap();
    assert_eq!(storage.get_counsellor(id).await.unwrap().unwrap().max_capacity, 3);
}

#[tokio::test]
async fn test_rollback_and_drop_discard_writes() {
    let storage = InMemoryStorage::new();

    let mut tx = storage.begin().await.unwrap();
    tx.insert_counsellor(row("asha", 3)).await.unwrap();
    tx.rollback().await.unwrap();

    let mut tx = storage.begin().await.unwrap();
    tx.insert_lead(
        NewLead {
            name: "dropped".into(),
            ..NewLead::default()
        },
        1,
    )
    .await
    .unwrap();
    drop(tx);

    assert!(storage.list_counsellors().await.unwrap().is_empty());
    assert!(storage.live_lead_counts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_write_without_row_lock_is_refused() {
    let storage = InMemoryStorage::new();
    let id = seeded(&storage, 2).await;

    let mut tx = storage.begin().await.unwrap();
    let err = tx.adjust_assigned(id, 1, 2).await.unwrap_err();
    assert!(matches!(err, CapacityError::Storage(_)));
    let err = tx.delete_counsellor(id).await.unwrap_err();
    assert!(matches!(err, CapacityError::Storage(_)));
}

#[tokio::test]
async fn test_adjust_assigned_stays_within_bounds() {
    let storage = InMemoryStorage::new();
    let id = seeded(&storage, 1).await;

    let mut tx = storage.begin().await.unwrap();
    tx.lock_counsellor(id).await.unwrap();
    assert_eq!(tx.adjust_assigned(id, -1, 2).await.unwrap(), 0);
    assert_eq!(tx.adjust_assigned(id, 1, 2).await.unwrap(), 1);
    assert_eq!(tx.adjust_assigned(id, 1, 2).await.unwrap(), 0);
    assert!(matches!(
        tx.adjust_assigned(999, 1, 2).await,
        Err(CapacityError::Storage(_))
    ));
    tx.commit().await.unwrap();

    assert_eq!(storage.get_counsellor(id).await.unwrap().unwrap().assigned_count, 1);
}

#[tokio::test]
async fn test_row_lock_excludes_other_transactions() {
    let storage = InMemoryStorage::new();
    let id = seeded(&storage, 1).await;

    let mut first = storage.begin().await.unwrap();
    first.lock_counsellor(id).await.unwrap();

    let mut second = storage.begin().await.unwrap();
    let blocked = tokio::time::timeout(Duration::from_millis(50), second.lock_counsellor(id)).await;
    assert!(blocked.is_err(), "second lock should wait for the first transaction");

    first.adjust_assigned(id, 1, 2).await.unwrap();
    first.commit().await.unwrap();

    let seen = second.lock_counsellor(id).await.unwrap().unwrap();
    assert_eq!(seen.assigned_count, 1);
}

#[tokio::test]
async fn test_transaction_count_includes_staged_leads() {
    let storage = InMemoryStorage::new();
    let id = seeded(&storage, 5).await;

    let mut tx = storage.begin().await.unwrap();
    let lead = tx
        .insert_lead(
            NewLead {
                name: "pending".into(),
                ..NewLead::default()
            },
            1,
        )
        .await
        .unwrap();
    tx.set_lead_counsellor(lead, Some(id), 2).await.unwrap();

    assert_eq!(tx.count_leads(id).await.unwrap(), 1);
    assert_eq!(storage.count_leads(id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_listing_order() {
    let storage = InMemoryStorage::new();
    let mut tx = storage.begin().await.unwrap();
    tx.insert_counsellor(row("zoe", 1)).await.unwrap();
    tx.insert_counsellor(row("amir", 1)).await.unwrap();
    tx.commit().await.unwrap();

    let names: Vec<String> = storage
        .list_counsellors()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["amir", "zoe"]);
}

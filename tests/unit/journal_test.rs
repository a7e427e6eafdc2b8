//! Tests for the JSON-lines journal and journal-backed storage

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use counsellor_capacity::core::{
    AssignmentCoordinator, AssignmentOutcome, Counsellor, CounsellorStore, Lead, LeadStore,
    NewCounsellor, NewLead, RequestContext, Storage,
};
use counsellor_capacity::infra::{InMemoryStorage, Journal, JournalEntry};

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("counsellor-journal-{}", uuid::Uuid::new_v4()))
}

fn counsellor_row(id: u64, max_capacity: u32, assigned_count: u32) -> Counsellor {
    Counsellor {
        id,
        name: format!("Counsellor {id}"),
        email: format!("c{id}@example.com"),
        phone: String::new(),
        max_capacity,
        assigned_count,
        created_at_ms: 1,
        updated_at_ms: 1,
    }
}

fn lead_row(id: u64, counselor_id: Option<u64>) -> Lead {
    Lead {
        id,
        name: format!("Lead {id}"),
        email: String::new(),
        phone: String::new(),
        education: String::new(),
        lead_source: "referral".into(),
        counselor_id,
        registration_fee_status: Default::default(),
        course_fee_status: Default::default(),
        application_status: Default::default(),
        interview_scheduled_at_ms: None,
        created_at_ms: 1,
        updated_at_ms: 1,
    }
}

#[test]
fn test_replay_of_missing_file_is_empty() {
    let dir = scratch_dir();
    let journal = Journal::open(&dir, "ledger").unwrap();
    let tables = journal.replay().unwrap();
    assert!(tables.counsellors.is_empty());
    assert!(tables.leads.is_empty());
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_replay_applies_records_in_order() {
    let dir = scratch_dir();
    let journal = Journal::open(&dir, "ledger").unwrap();
    journal
        .append(vec![
            JournalEntry::PutCounsellor {
                row: counsellor_row(1, 2, 1),
            },
            JournalEntry::PutLead {
                row: lead_row(1, Some(1)),
            },
        ])
        .unwrap();
    journal
        .append(vec![
            JournalEntry::PutCounsellor {
                row: counsellor_row(1, 2, 0),
            },
            JournalEntry::DeleteLead { id: 1 },
        ])
        .unwrap();

    let tables = journal.replay().unwrap();
    assert_eq!(tables.counsellors[&1].assigned_count, 0);
    assert!(tables.leads.is_empty());
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_truncated_tail_is_ignored() {
    let dir = scratch_dir();
    let journal = Journal::open(&dir, "ledger").unwrap();
    journal
        .append(vec![JournalEntry::PutCounsellor {
            row: counsellor_row(1, 3, 0),
        }])
        .unwrap();
    let mut file = OpenOptions::new()
        .append(true)
        .open(journal.file_path())
        .unwrap();
    write!(file, r#"{{"committed_at_ms":5,"entries":[{{"put_coun"#).unwrap();
    drop(file);

    let tables = journal.replay().unwrap();
    assert_eq!(tables.counsellors.len(), 1);
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_corruption_before_the_tail_is_an_error() {
    let dir = scratch_dir();
    let journal = Journal::open(&dir, "ledger").unwrap();
    fs::write(journal.file_path(), "garbage\n").unwrap();
    journal
        .append(vec![JournalEntry::PutCounsellor {
            row: counsellor_row(1, 3, 0),
        }])
        .unwrap();

    let err = journal.replay().unwrap_err();
    assert!(err.to_string().contains("line 1"));
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_compact_rewrites_a_single_snapshot() {
    let dir = scratch_dir();
    let journal = Journal::open(&dir, "ledger").unwrap();
    for assigned in 0..4 {
        journal
            .append(vec![JournalEntry::PutCounsellor {
                row: counsellor_row(1, 5, assigned),
            }])
            .unwrap();
    }
    let before = journal.replay().unwrap();
    journal.compact(&before).unwrap();

    let text = fs::read_to_string(journal.file_path()).unwrap();
    assert_eq!(text.lines().count(), 1);
    let after = journal.replay().unwrap();
    assert_eq!(after.counsellors, before.counsellors);
    fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_storage_survives_reopen() {
    let dir = scratch_dir();
    let (counsellor_id, lead_id) = {
        let storage: Arc<dyn Storage> =
            Arc::new(InMemoryStorage::open_journal(&dir, "ledger").unwrap());
        let counsellors = CounsellorStore::new(storage.clone(), 10);
        let leads = LeadStore::new(storage.clone());
        let coordinator = AssignmentCoordinator::new(storage);

        let counsellor_id = counsellors
            .create(NewCounsellor {
                name: "Ravi".into(),
                email: "ravi@example.com".into(),
                phone: String::new(),
                max_capacity: Some(2),
            })
            .await
            .unwrap();
        let lead_id = leads
            .create(NewLead {
                name: "Student".into(),
                ..NewLead::default()
            })
            .await
            .unwrap();
        let outcome = coordinator
            .assign(&RequestContext::background(), lead_id, counsellor_id)
            .await
            .unwrap();
        assert!(matches!(outcome, AssignmentOutcome::Assigned { .. }));
        (counsellor_id, lead_id)
    };

    let reopened = InMemoryStorage::open_journal(&dir, "ledger").unwrap();
    let counsellor = reopened.get_counsellor(counsellor_id).await.unwrap().unwrap();
    assert_eq!(counsellor.assigned_count, 1);
    assert_eq!(counsellor.max_capacity, 2);
    let lead = reopened.get_lead(lead_id).await.unwrap().unwrap();
    assert_eq!(lead.counselor_id, Some(counsellor_id));

    reopened.compact_journal().unwrap();
    let again = InMemoryStorage::open_journal(&dir, "ledger").unwrap();
    assert_eq!(again.count_leads(counsellor_id).await.unwrap(), 1);

    // ids keep increasing after replay
    let next = LeadStore::new(Arc::new(again))
        .create(NewLead {
            name: "Another".into(),
            ..NewLead::default()
        })
        .await
        .unwrap();
    assert!(next > lead_id);
    fs::remove_dir_all(dir).ok();
}

async fn create_named(storage: &InMemoryStorage, name: &str) -> u64 {
    CounsellorStore::new(Arc::new(storage.clone()), 10)
        .create(NewCounsellor {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: String::new(),
            max_capacity: Some(3),
        })
        .await
        .unwrap()
}

fn append_raw(journal: &Journal, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(journal.file_path())
        .unwrap();
    file.write_all(bytes).unwrap();
}

#[tokio::test]
async fn test_commit_after_torn_tail_survives_reopen() {
    let dir = scratch_dir();
    let first = {
        let storage = InMemoryStorage::open_journal(&dir, "ledger").unwrap();
        create_named(&storage, "Asha").await
    };
    let journal = Journal::open(&dir, "ledger").unwrap();
    append_raw(&journal, br#"{"committed_at_ms":9,"entries":[{"put_counsel"#);

    let second = {
        let storage = InMemoryStorage::open_journal(&dir, "ledger").unwrap();
        create_named(&storage, "Bilal").await
    };

    let reopened = InMemoryStorage::open_journal(&dir, "ledger").unwrap();
    let names: Vec<String> = reopened
        .list_counsellors()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Asha", "Bilal"]);
    assert!(second > first);

    let text = fs::read_to_string(journal.file_path()).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.ends_with('\n'));
    fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_tail_cut_inside_a_multibyte_character() {
    let dir = scratch_dir();
    {
        let storage = InMemoryStorage::open_journal(&dir, "ledger").unwrap();
        create_named(&storage, "Asha").await;
    }
    let journal = Journal::open(&dir, "ledger").unwrap();
    append_raw(
        &journal,
        b"{\"committed_at_ms\":9,\"entries\":[{\"put_counsellor\":{\"row\":{\"name\":\"M\xC3",
    );

    let storage = InMemoryStorage::open_journal(&dir, "ledger").unwrap();
    assert_eq!(storage.list_counsellors().await.unwrap().len(), 1);
    create_named(&storage, "Mélanie").await;
    drop(storage);

    let reopened = InMemoryStorage::open_journal(&dir, "ledger").unwrap();
    let rows = reopened.list_counsellors().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|c| c.name == "Mélanie"));
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_unterminated_final_record_is_kept() {
    let dir = scratch_dir();
    let journal = Journal::open(&dir, "ledger").unwrap();
    journal
        .append(vec![JournalEntry::PutCounsellor {
            row: counsellor_row(1, 3, 0),
        }])
        .unwrap();
    let text = fs::read_to_string(journal.file_path()).unwrap();
    fs::write(journal.file_path(), text.trim_end()).unwrap();

    assert_eq!(journal.replay().unwrap().counsellors.len(), 1);
    journal
        .append(vec![JournalEntry::PutCounsellor {
            row: counsellor_row(2, 3, 0),
        }])
        .unwrap();
    assert_eq!(journal.replay().unwrap().counsellors.len(), 2);
    fs::remove_dir_all(dir).ok();
}

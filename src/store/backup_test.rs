use std::fs;

use chrono::Utc;
use tempfile::TempDir;

use super::backup::BackupManager;
use crate::test_utils::seed_book;
use crate::test_utils::seed_member;
use crate::test_utils::temp_store;
use crate::utils::time::unix_secs;

#[test]
fn backup_writes_archive_and_reports_size() {
    let (_dir, store) = temp_store();
    let backup_dir = TempDir::new().unwrap();
    seed_member(&store, 1, "standard", Some("@one"));
    seed_book(&store, "Dune", 2);

    let manager = BackupManager::new(store, backup_dir.path().to_path_buf(), 30);
    let summary = manager.run().unwrap();

    assert!(summary.path.exists());
    assert!(summary.size_bytes > 0);
    assert_eq!(summary.pruned, 0);
}

#[test]
fn backup_prunes_dumps_older_than_retention() {
    let (_dir, store) = temp_store();
    let backup_dir = TempDir::new().unwrap();

    // A dump from 40 days ago and an unrelated file that must survive.
    let stale_secs = unix_secs() - 40 * 86_400;
    let stale = backup_dir.path().join(format!("backup-{stale_secs}.bin.gz"));
    fs::write(&stale, b"old dump").unwrap();
    let unrelated = backup_dir.path().join("notes.txt");
    fs::write(&unrelated, b"keep me").unwrap();

    let manager = BackupManager::new(store, backup_dir.path().to_path_buf(), 30);
    let summary = manager.run().unwrap();

    assert_eq!(summary.pruned, 1);
    assert!(!stale.exists());
    assert!(unrelated.exists());
    assert!(summary.path.exists());
}

#[test]
fn restore_round_trips_every_record_tree() {
    let (_dir, store) = temp_store();
    let backup_dir = TempDir::new().unwrap();
    let member = seed_member(&store, 1, "premium", Some("@one"));
    let book = seed_book(&store, "Dune", 2);
    let now = Utc::now();
    let loan = store
        .create_loan(member.id, book.id, now, now + chrono::Duration::days(14), 10)
        .unwrap();
    store.upsert_rating(member.id, book.id, 5, now).unwrap();

    let manager = BackupManager::new(store, backup_dir.path().to_path_buf(), 30);
    let summary = manager.run().unwrap();

    // Fresh, empty store; load the archive back in.
    let (_dir2, restored_store) = temp_store();
    let restorer = BackupManager::new(restored_store.clone(), backup_dir.path().to_path_buf(), 30);
    restorer.restore(&summary.path).unwrap();

    assert_eq!(restored_store.member(member.id).unwrap().unwrap(), member);
    let restored_book = restored_store.book(book.id).unwrap().unwrap();
    assert_eq!(restored_book.available_copies, 1);
    assert_eq!(restored_store.loan(loan.id).unwrap().unwrap(), loan);
    assert_eq!(restored_store.active_loan_count(member.id).unwrap(), 1);
    assert_eq!(
        restored_store.rating(member.id, book.id).unwrap().unwrap().value,
        5
    );
}

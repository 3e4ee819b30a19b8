use chrono::Duration;
use chrono::Utc;

use super::scans::LoanScanner;
use crate::test_utils::drain_jobs;
use crate::test_utils::seed_book;
use crate::test_utils::seed_member;
use crate::test_utils::temp_store;
use crate::test_utils::test_dispatcher;
use crate::NotificationCategory;
use crate::NotificationTarget;

#[test]
fn overdue_scan_reminds_member_and_audits_to_admin_per_loan() {
    let (_dir, store) = temp_store();
    let (dispatcher, mut job_rx) = test_dispatcher(store.clone());
    seed_member(&store, 1, "standard", Some("@one"));
    seed_member(&store, 2, "standard", Some("@two"));
    let book = seed_book(&store, "Dune", 5);

    let now = Utc::now();
    // Two loans overdue, one on time, one already returned.
    store
        .create_loan(1, book.id, now - Duration::days(20), now - Duration::days(6), 5)
        .unwrap();
    store
        .create_loan(2, book.id, now - Duration::days(16), now - Duration::days(2), 5)
        .unwrap();
    store
        .create_loan(1, book.id, now, now + Duration::days(14), 5)
        .unwrap();
    let returned = store
        .create_loan(2, book.id, now - Duration::days(30), now - Duration::days(16), 5)
        .unwrap();
    store.complete_return(returned.id, book.id, now).unwrap();

    let scanner = LoanScanner::new(store.clone(), dispatcher, 2);
    let summary = scanner.run_overdue_scan().unwrap();

    assert_eq!(summary.scanned, 3);
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.notified, 2);

    let jobs = drain_jobs(&mut job_rx);
    let reminders: Vec<_> = jobs
        .iter()
        .filter(|j| j.category == NotificationCategory::Overdue)
        .collect();
    assert_eq!(reminders.len(), 2);
    assert!(reminders
        .iter()
        .any(|j| j.target == NotificationTarget::Member(1)));
    assert!(reminders
        .iter()
        .any(|j| j.target == NotificationTarget::Member(2)));

    // One audit line to admin per overdue loan.
    let audits = jobs
        .iter()
        .filter(|j| j.target == NotificationTarget::Admin)
        .count();
    assert_eq!(audits, 2);
}

#[test]
fn due_soon_scan_targets_the_lookahead_window_with_an_extend_button() {
    let (_dir, store) = temp_store();
    let (dispatcher, mut job_rx) = test_dispatcher(store.clone());
    seed_member(&store, 1, "standard", Some("@one"));
    let book = seed_book(&store, "Dune", 5);

    let now = Utc::now();
    // Due tomorrow: inside the 2-day window.
    let due_soon = store
        .create_loan(1, book.id, now - Duration::days(13), now + Duration::days(1), 5)
        .unwrap();
    // Due next week: outside the window.
    store
        .create_loan(1, book.id, now, now + Duration::days(7), 5)
        .unwrap();
    // Already overdue: the overdue scan owns this one.
    store
        .create_loan(1, book.id, now - Duration::days(20), now - Duration::days(1), 5)
        .unwrap();

    let scanner = LoanScanner::new(store.clone(), dispatcher, 2);
    let summary = scanner.run_due_soon_scan().unwrap();

    assert_eq!(summary.scanned, 3);
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.notified, 1);

    let jobs = drain_jobs(&mut job_rx);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].category, NotificationCategory::DueSoon);
    let button = jobs[0].button.as_ref().expect("extend button attached");
    assert_eq!(button.action, format!("extend:{}", due_soon.id));
}

#[test]
fn scans_are_idempotent_over_an_unchanged_store() {
    let (_dir, store) = temp_store();
    let (dispatcher, mut job_rx) = test_dispatcher(store.clone());
    seed_member(&store, 1, "standard", Some("@one"));
    let book = seed_book(&store, "Dune", 1);

    let now = Utc::now();
    store
        .create_loan(1, book.id, now - Duration::days(20), now - Duration::days(6), 5)
        .unwrap();

    let scanner = LoanScanner::new(store.clone(), dispatcher, 2);
    let first = scanner.run_overdue_scan().unwrap();
    let second = scanner.run_overdue_scan().unwrap();
    assert_eq!(first, second);
    // Two runs, two reminder+audit pairs; safe to repeat, bounded by cadence.
    assert_eq!(drain_jobs(&mut job_rx).len(), 4);
}

//! Contract Test: Change Detection & the No-Clear Invariant
//!
//! Constraints verified:
//! - The same port is applied exactly once
//! - Empty, missing or invalid sources never unset a working port
//! - Only the value present at poll time is applied
//!
//! If this test fails, the loop is spamming the API or dropping a working port.

mod common;

use common::*;
use portsync_core::{CycleOutcome, SkipReason};

#[tokio::test]
async fn applied_time_changes_only_with_the_port() {
    let file = FakePortFile::with_contents("51413");
    let client = MockTorrentClient::new();
    let (mut sync, _rx) = build(&file, &client, &no_auth_config());

    let before = chrono::Utc::now();
    sync.run_cycle().await;
    let first = sync.last_applied().expect("port applied");
    assert_eq!(first.port, 51413);
    assert!(first.applied_at >= before);

    sync.run_cycle().await;
    assert_eq!(sync.last_applied(), Some(first), "Unchanged port keeps its timestamp");

    file.write("55000");
    sync.run_cycle().await;
    let second = sync.last_applied().expect("port applied");
    assert_eq!(second.port, 55000);
    assert!(second.applied_at >= first.applied_at);
}

#[tokio::test]
async fn same_port_twice_applies_once() {
    let file = FakePortFile::with_contents("51413\n");
    let client = MockTorrentClient::new();
    let (mut sync, _rx) = build(&file, &client, &no_auth_config());

    let first = sync.run_cycle().await;
    let second = sync.run_cycle().await;

    assert_eq!(
        first,
        CycleOutcome::Applied {
            port: 51413,
            previous: None
        }
    );
    assert_eq!(second, CycleOutcome::Unchanged(51413));
    assert_eq!(client.apply_count(), 1, "Second cycle must be a no-op");
    assert_eq!(sync.last_port(), Some(51413));
}

#[tokio::test]
async fn empty_file_keeps_last_port() {
    let file = FakePortFile::with_contents("51413");
    let client = MockTorrentClient::new();
    let (mut sync, _rx) = build(&file, &client, &auth_config());

    sync.run_cycle().await;
    let calls_before = client.apply_count() + client.login_count();

    file.write("");
    for _ in 0..5 {
        assert_eq!(
            sync.run_cycle().await,
            CycleOutcome::Skipped(SkipReason::Empty)
        );
    }

    assert_eq!(sync.last_port(), Some(51413));
    assert_eq!(
        client.apply_count() + client.login_count(),
        calls_before,
        "Empty file must not cause any API call"
    );
    assert_eq!(client.applied_ports(), vec![51413]);
}

#[tokio::test]
async fn missing_file_keeps_last_port() {
    let file = FakePortFile::with_contents("51413");
    let client = MockTorrentClient::new();
    let (mut sync, _rx) = build(&file, &client, &no_auth_config());

    sync.run_cycle().await;
    file.remove();

    for _ in 0..3 {
        let outcome = sync.run_cycle().await;
        assert!(
            matches!(outcome, CycleOutcome::Skipped(SkipReason::SourceUnavailable(_))),
            "Unexpected outcome: {:?}",
            outcome
        );
    }

    assert_eq!(sync.last_port(), Some(51413));
    assert_eq!(client.applied_ports(), vec![51413]);
}

#[tokio::test]
async fn missing_file_at_startup_is_tolerated() {
    let file = FakePortFile::new();
    let client = MockTorrentClient::new();
    let (mut sync, _rx) = build(&file, &client, &no_auth_config());

    let outcome = sync.run_cycle().await;
    assert!(matches!(
        outcome,
        CycleOutcome::Skipped(SkipReason::SourceUnavailable(_))
    ));
    assert_eq!(sync.last_port(), None);

    // The VPN client publishes the port later
    file.write("40000\n");
    assert_eq!(
        sync.run_cycle().await,
        CycleOutcome::Applied {
            port: 40000,
            previous: None
        }
    );
}

#[tokio::test]
async fn invalid_contents_are_ignored() {
    let file = FakePortFile::with_contents("51413");
    let client = MockTorrentClient::new();
    let (mut sync, _rx) = build(&file, &client, &no_auth_config());

    sync.run_cycle().await;

    for bad in ["0", "-1", "65536", "not-a-port", "123abc"] {
        file.write(bad);
        assert_eq!(
            sync.run_cycle().await,
            CycleOutcome::Skipped(SkipReason::Invalid(bad.to_string())),
            "Contents {:?} should be rejected",
            bad
        );
    }

    assert_eq!(sync.last_port(), Some(51413));
    assert_eq!(client.apply_count(), 1);
}

#[tokio::test]
async fn changed_port_is_applied() {
    let file = FakePortFile::with_contents("51413");
    let client = MockTorrentClient::new();
    let (mut sync, _rx) = build(&file, &client, &no_auth_config());

    sync.run_cycle().await;
    file.write("55000");

    assert_eq!(
        sync.run_cycle().await,
        CycleOutcome::Applied {
            port: 55000,
            previous: Some(51413)
        }
    );
    assert_eq!(client.applied_ports(), vec![51413, 55000]);
    assert_eq!(sync.last_port(), Some(55000));
}

#[tokio::test]
async fn only_latest_value_between_polls_is_applied() {
    let file = FakePortFile::with_contents("51413");
    let client = MockTorrentClient::new();
    let (mut sync, _rx) = build(&file, &client, &no_auth_config());

    sync.run_cycle().await;

    // Two writes land between polls
    file.write("52000");
    file.write("53000");
    sync.run_cycle().await;

    assert_eq!(client.applied_ports(), vec![51413, 53000]);
}

#[tokio::test]
async fn port_returning_after_empty_gap_is_not_reapplied() {
    let file = FakePortFile::with_contents("51413");
    let client = MockTorrentClient::new();
    let (mut sync, _rx) = build(&file, &client, &no_auth_config());

    sync.run_cycle().await;
    file.write("");
    sync.run_cycle().await;
    file.write("51413\n");

    assert_eq!(sync.run_cycle().await, CycleOutcome::Unchanged(51413));
    assert_eq!(client.apply_count(), 1);
}

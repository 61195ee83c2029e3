//! Live tests against the Compute Engine API.
//!
//! The suite snapshots an existing disk, polls until the snapshot is ready,
//! labels it, finds it through the author filter, and deletes it. It only
//! runs when `GCE_SNAPSHOTS_RUN_LIVE_TESTS=1`, and additionally needs
//! `GCE_SNAPSHOTS_TEST_DISK` and `GCE_SNAPSHOTS_TEST_ZONE` naming a disk the
//! credentials may snapshot.

use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use gce_snapshots::validation::build_snapshot_name;
use gce_snapshots::{
    DiskIdentifier, GoogleBackend, GoogleBackendError, SnapshotBackend, SnapshotConfig,
    SnapshotStatus,
};
use rstest::{fixture, rstest};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const WAIT_TIMEOUT: Duration = Duration::from_secs(600);

fn live_tests_enabled() -> bool {
    let enabled = std::env::var("GCE_SNAPSHOTS_RUN_LIVE_TESTS").unwrap_or_default();
    matches!(
        enabled.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

#[fixture]
fn live_context() -> Result<(GoogleBackend, DiskIdentifier), String> {
    if !live_tests_enabled() {
        return Err(String::from(
            "live tests disabled (set GCE_SNAPSHOTS_RUN_LIVE_TESTS=1 to enable)",
        ));
    }

    let disk = std::env::var("GCE_SNAPSHOTS_TEST_DISK")
        .map_err(|err| format!("missing GCE_SNAPSHOTS_TEST_DISK: {err}"))?;
    let zone = std::env::var("GCE_SNAPSHOTS_TEST_ZONE")
        .map_err(|err| format!("missing GCE_SNAPSHOTS_TEST_ZONE: {err}"))?;
    let config = SnapshotConfig::load_without_cli_args()
        .map_err(|err| format!("failed to load config: {err}"))?;
    let backend =
        GoogleBackend::connect(config).map_err(|err| format!("failed to build backend: {err}"))?;
    Ok((backend, DiskIdentifier::new(disk, zone)))
}

fn wait_for_completion(
    backend: &GoogleBackend,
    handle: &mut gce_snapshots::NewSnapshotIdentifier,
) -> Result<SnapshotStatus, GoogleBackendError> {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        let status = backend.snapshot_status(handle)?;
        if status.is_terminal() || Instant::now() >= deadline {
            return Ok(status);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[rstest]
fn snapshot_lifecycle_round_trip(live_context: Result<(GoogleBackend, DiskIdentifier), String>) {
    let (backend, disk) = match live_context {
        Ok(context) => context,
        Err(reason) => {
            assert!(!live_tests_enabled(), "live test setup failed: {reason}");
            return;
        }
    };

    let name = build_snapshot_name(
        &disk.name,
        &backend.config().snapshot_datetime_format,
        Utc::now(),
    )
    .unwrap_or_else(|err| panic!("snapshot name should render: {err}"));
    let mut handle = backend
        .create_snapshot(&disk, &name, "gce-snapshots live test")
        .unwrap_or_else(|err| panic!("create failed: {err}"));

    let status = wait_for_completion(&backend, &mut handle)
        .unwrap_or_else(|err| panic!("snapshot did not complete: {err}"));
    assert_eq!(status, SnapshotStatus::Complete);

    backend
        .set_snapshot_labels(&handle, &backend.config().author_labels())
        .unwrap_or_else(|err| panic!("labelling failed: {err}"));

    let listed = backend
        .list_snapshots(&backend.config().author_filter())
        .unwrap_or_else(|err| panic!("listing failed: {err}"));
    let snapshot = listed
        .into_iter()
        .find(|snapshot| snapshot.name == name)
        .unwrap_or_else(|| panic!("snapshot {name} should be listed"));
    assert_eq!(snapshot.disk, disk);

    backend
        .delete_snapshot(&snapshot)
        .unwrap_or_else(|err| panic!("delete failed: {err}"));
}

//! Unit tests for backend error reporting.

use gce_snapshots::validation::{ConfigValidationError, ConfigViolation, ViolationReason};
use gce_snapshots::{ConfigError, CredentialError, GoogleBackendError};
use rstest::rstest;

#[rstest]
#[case(
    GoogleBackendError::UnsupportedVolume {
        volume: String::from("pv-1"),
        reason: String::from("missing zone label"),
    },
    "unsupported volume pv-1: missing zone label"
)]
#[case(
    GoogleBackendError::SnapshotCreate {
        snapshot: String::from("snap-1"),
        status: String::from("FAILED"),
    },
    "snapshot snap-1 failed with status FAILED"
)]
#[case(
    GoogleBackendError::NotFound { resource: String::from("snapshot snap-1") },
    "snapshot snap-1 not found"
)]
#[case(
    GoogleBackendError::Api {
        resource: String::from("disk pvc-1"),
        status: 403,
        message: String::from("Required 'compute.disks.createSnapshot' permission"),
    },
    "provider returned HTTP 403 for disk pvc-1: Required 'compute.disks.createSnapshot' permission"
)]
#[case(
    GoogleBackendError::InvalidSnapshotName {
        name: String::from("Snap"),
        regex: String::from("^[a-z]$"),
    },
    "invalid snapshot name 'Snap': must match ^[a-z]$"
)]
fn errors_render_context(#[case] error: GoogleBackendError, #[case] expected: &str) {
    assert_eq!(error.to_string(), expected);
}

#[test]
fn only_not_found_is_not_found() {
    assert!(
        GoogleBackendError::NotFound {
            resource: String::from("snapshot snap-1")
        }
        .is_not_found()
    );
    assert!(
        !GoogleBackendError::Transport {
            message: String::from("timed out")
        }
        .is_not_found()
    );
}

#[test]
fn credential_errors_convert() {
    let err = GoogleBackendError::from(CredentialError::BothProvided);
    let GoogleBackendError::Credentials(ref message) = err else {
        panic!("expected Credentials error, got {err:?}");
    };
    assert!(message.contains("both"), "unexpected message: {message}");
}

#[test]
fn config_errors_convert() {
    let err = GoogleBackendError::from(ConfigError::Parse(String::from("bad toml")));
    assert_eq!(
        err,
        GoogleBackendError::Config(String::from("configuration parsing failed: bad toml"))
    );
}

#[test]
fn validation_errors_pass_through_transparently() {
    let validation = ConfigValidationError {
        violations: vec![ConfigViolation {
            key: String::from("snapshot_author_label"),
            reason: ViolationReason::InvalidLabelKey,
            regex: Some(String::from(gce_snapshots::validation::LABEL_REGEX)),
            value: String::from("Author"),
            hint: None,
        }],
    };
    let err = GoogleBackendError::from(validation.clone());
    assert_eq!(err.to_string(), validation.to_string());
}

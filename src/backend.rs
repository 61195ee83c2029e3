//! Backend abstraction for provider specific block-storage snapshots.
//!
//! The scheduler drives snapshots through [`SnapshotBackend`]: resolve the
//! disk behind a volume, request a snapshot, poll the returned handle until it
//! reaches a terminal [`SnapshotStatus`], then label or delete the result.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::volume::PersistentVolume;

/// Label set applied to a snapshot, keyed by label key.
pub type Labels = BTreeMap<String, String>;

/// Identifies a disk within a project and zone.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DiskIdentifier {
    /// Provider disk name.
    pub name: String,
    /// Zone the disk lives in (for example `europe-west1-b`).
    pub zone: String,
}

impl DiskIdentifier {
    /// Creates a disk identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zone: zone.into(),
        }
    }
}

/// Existing remote snapshot as returned by a listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Snapshot {
    /// Snapshot name, unique within the project.
    pub name: String,
    /// Creation time normalised to UTC.
    pub created_at: DateTime<Utc>,
    /// Disk the snapshot was taken from.
    pub disk: DiskIdentifier,
}

/// Progress of a snapshot creation as tracked by the caller's handle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CreationPhase {
    /// The provider operation has not reported completion yet.
    AwaitingOperation {
        /// Provider operation name returned by the create call.
        operation_name: String,
    },
    /// The operation finished; only the snapshot resource is consulted now.
    AwaitingSnapshot,
}

/// Handle for a snapshot whose creation was requested but not confirmed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewSnapshotIdentifier {
    /// Name requested for the snapshot.
    pub snapshot_name: String,
    /// Zone of the disk (and of the creation operation).
    pub zone: String,
    phase: CreationPhase,
}

impl NewSnapshotIdentifier {
    /// Creates a handle for a freshly issued creation operation.
    #[must_use]
    pub fn new(
        snapshot_name: impl Into<String>,
        zone: impl Into<String>,
        operation_name: impl Into<String>,
    ) -> Self {
        Self {
            snapshot_name: snapshot_name.into(),
            zone: zone.into(),
            phase: CreationPhase::AwaitingOperation {
                operation_name: operation_name.into(),
            },
        }
    }

    /// Current creation phase.
    #[must_use]
    pub const fn phase(&self) -> &CreationPhase {
        &self.phase
    }

    /// Operation name while the operation is still outstanding, `None` once it
    /// has reported completion.
    #[must_use]
    pub fn operation_name(&self) -> Option<&str> {
        match &self.phase {
            CreationPhase::AwaitingOperation { operation_name } => Some(operation_name),
            CreationPhase::AwaitingSnapshot => None,
        }
    }

    /// Records that the creation operation completed. The transition is one
    /// way: later polls never consult the operation again.
    pub fn mark_operation_done(&mut self) {
        self.phase = CreationPhase::AwaitingSnapshot;
    }
}

/// Outcome of polling a [`NewSnapshotIdentifier`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SnapshotStatus {
    /// Not finished yet; the caller decides when to poll again.
    Pending,
    /// The snapshot is ready.
    Complete,
    /// The snapshot failed. Backends that surface failures as errors never
    /// return this value from a poll.
    Failed,
}

impl SnapshotStatus {
    /// Returns `true` for [`SnapshotStatus::Complete`] and
    /// [`SnapshotStatus::Failed`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Single label key/value pair used to filter snapshot listings.
///
/// The provider filter dialect used here supports exactly one pair per
/// request, so the type holds exactly one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LabelFilter {
    /// Label key.
    pub key: String,
    /// Expected label value.
    pub value: String,
}

impl LabelFilter {
    /// Creates a filter matching snapshots whose `key` label equals `value`.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Renders the provider filter expression (`labels.<key> eq <value>`).
    #[must_use]
    pub fn expression(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "labels.{} eq {}", self.key, self.value)
    }
}

/// Interface implemented by snapshot providers.
///
/// All calls block on the remote service. Implementations may hold
/// single-threaded state, so callers either serialise access to one backend or
/// build one backend per worker.
pub trait SnapshotBackend {
    /// Provider specific error type returned by the backend.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns `true` when the volume was provisioned by this provider's
    /// storage driver.
    fn supports_volume(&self, volume: &PersistentVolume) -> bool;

    /// Resolves the provider disk behind a volume.
    ///
    /// # Errors
    ///
    /// Returns the provider error when the volume does not carry enough
    /// information to locate its disk.
    fn resolve_disk_identifier(
        &self,
        volume: &PersistentVolume,
    ) -> Result<DiskIdentifier, Self::Error>;

    /// Lists snapshots matching the label filter, in provider order.
    ///
    /// # Errors
    ///
    /// Returns the provider error when the listing fails.
    fn list_snapshots(&self, filter: &LabelFilter) -> Result<Vec<Snapshot>, Self::Error>;

    /// Requests an asynchronous snapshot of `disk`. The returned handle is
    /// pending; poll it with [`SnapshotBackend::snapshot_status`].
    ///
    /// # Errors
    ///
    /// Returns the provider error when the request is rejected.
    fn create_snapshot(
        &self,
        disk: &DiskIdentifier,
        name: &str,
        description: &str,
    ) -> Result<NewSnapshotIdentifier, Self::Error>;

    /// Performs one status check for a pending snapshot.
    ///
    /// # Errors
    ///
    /// Returns the provider error when a remote read fails or the snapshot
    /// reached a failed terminal state.
    fn snapshot_status(
        &self,
        identifier: &mut NewSnapshotIdentifier,
    ) -> Result<SnapshotStatus, Self::Error>;

    /// Replaces the labels of a created snapshot.
    ///
    /// # Errors
    ///
    /// Returns the provider error when the snapshot cannot be read or the
    /// label write is rejected.
    fn set_snapshot_labels(
        &self,
        identifier: &NewSnapshotIdentifier,
        labels: &Labels,
    ) -> Result<(), Self::Error>;

    /// Deletes a snapshot by name.
    ///
    /// # Errors
    ///
    /// Returns the provider error when the delete fails, including when the
    /// snapshot no longer exists.
    fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_filter_renders_single_pair_expression() {
        let filter = LabelFilter::new("env", "prod");
        assert_eq!(filter.expression(), "labels.env eq prod");
    }

    #[test]
    fn identifier_starts_awaiting_operation() {
        let identifier = NewSnapshotIdentifier::new("snap-1", "europe-west1-b", "op-1");
        assert_eq!(identifier.operation_name(), Some("op-1"));
        assert_eq!(
            identifier.phase(),
            &CreationPhase::AwaitingOperation {
                operation_name: String::from("op-1")
            }
        );
    }

    #[test]
    fn marking_operation_done_drops_operation_name() {
        let mut identifier = NewSnapshotIdentifier::new("snap-1", "europe-west1-b", "op-1");
        identifier.mark_operation_done();
        assert_eq!(identifier.operation_name(), None);
        assert_eq!(identifier.phase(), &CreationPhase::AwaitingSnapshot);
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!SnapshotStatus::Pending.is_terminal());
        assert!(SnapshotStatus::Complete.is_terminal());
        assert!(SnapshotStatus::Failed.is_terminal());
    }
}

//! Remote surface of the Compute Engine snapshot service.
//!
//! [`ComputeApi`] is the seam between the backend logic and the transport:
//! [`super::HttpComputeApi`] talks to the real service, while tests script
//! responses through [`crate::test_support::ScriptedComputeApi`].

use serde::{Deserialize, Serialize};

use crate::backend::Labels;

use super::GoogleBackendError;

/// Operation status reported once the operation has finished.
pub const OPERATION_DONE: &str = "DONE";

/// Snapshot resource status of a usable snapshot.
pub const SNAPSHOT_READY: &str = "READY";

/// Snapshot resource status of a failed snapshot.
pub const SNAPSHOT_FAILED: &str = "FAILED";

/// Zone operation resource (`compute#operation`).
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Operation name.
    pub name: String,
    /// `PENDING`, `RUNNING`, or `DONE`.
    pub status: String,
    /// Errors attached to a finished operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationErrors>,
}

impl Operation {
    /// Returns `true` once the operation reports `DONE`.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == OPERATION_DONE
    }
}

/// Error payload of an operation.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct OperationErrors {
    /// Individual errors.
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

/// One operation error.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct OperationErrorItem {
    /// Error code.
    #[serde(default)]
    pub code: String,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
}

/// Snapshot resource (`compute#snapshot`).
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResource {
    /// Snapshot name.
    pub name: String,
    /// `CREATING`, `DELETING`, `FAILED`, `READY`, or `UPLOADING`.
    #[serde(default)]
    pub status: String,
    /// RFC 3339 creation time.
    #[serde(default)]
    pub creation_timestamp: String,
    /// URL of the source disk, ending in `/zones/{zone}/disks/{disk}`.
    #[serde(default)]
    pub source_disk: String,
    /// Labels currently applied.
    #[serde(default)]
    pub labels: Labels,
    /// Optimistic-concurrency token required to change labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_fingerprint: Option<String>,
}

/// One page of a snapshot listing.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPage {
    /// Snapshots on this page, in provider order.
    #[serde(default)]
    pub items: Vec<SnapshotResource>,
    /// Token for the next page, absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Request body for `disks.createSnapshot`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CreateSnapshotRequest {
    /// Snapshot name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// Request body for `snapshots.setLabels`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLabelsRequest {
    /// Complete label set to apply.
    pub labels: Labels,
    /// Fingerprint read just before the write.
    pub label_fingerprint: String,
}

/// Operations consumed from the Compute Engine API.
///
/// Every call blocks until the provider answers; none retries.
pub trait ComputeApi {
    /// Lists one page of snapshots matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError`] on transport or provider failure.
    fn list_snapshots(
        &self,
        project: &str,
        filter: &str,
        page_token: Option<&str>,
    ) -> Result<SnapshotPage, GoogleBackendError>;

    /// Reads a zone operation.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError`] on transport or provider failure.
    fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, GoogleBackendError>;

    /// Starts a snapshot of `disk`.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError`] on transport or provider failure.
    fn create_disk_snapshot(
        &self,
        project: &str,
        zone: &str,
        disk: &str,
        request: &CreateSnapshotRequest,
    ) -> Result<Operation, GoogleBackendError>;

    /// Reads a snapshot resource.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError`] on transport or provider failure.
    fn get_snapshot(&self, project: &str, name: &str)
    -> Result<SnapshotResource, GoogleBackendError>;

    /// Replaces the labels of a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError`] on transport or provider failure,
    /// including a stale fingerprint.
    fn set_snapshot_labels(
        &self,
        project: &str,
        name: &str,
        request: &SetLabelsRequest,
    ) -> Result<Operation, GoogleBackendError>;

    /// Deletes a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError`] on transport or provider failure,
    /// including [`GoogleBackendError::NotFound`] for a missing snapshot.
    fn delete_snapshot(&self, project: &str, name: &str) -> Result<Operation, GoogleBackendError>;
}

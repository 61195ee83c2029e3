//! Snapshot listing, creation, labelling and deletion.

use chrono::{DateTime, Utc};

use crate::backend::{DiskIdentifier, LabelFilter, Labels, NewSnapshotIdentifier, Snapshot};
use crate::validation::{SNAPSHOT_NAME_REGEX, is_valid_snapshot_name};

use super::api::{ComputeApi, CreateSnapshotRequest, SetLabelsRequest, SnapshotResource};
use super::disk::parse_source_disk;
use super::{GoogleBackend, GoogleBackendError};

impl<A: ComputeApi> GoogleBackend<A> {
    /// Lists every snapshot matching `filter`, following pagination, in the
    /// order the provider returns them.
    pub(super) fn list_matching(
        &self,
        filter: &LabelFilter,
    ) -> Result<Vec<Snapshot>, GoogleBackendError> {
        let expression = filter.expression();
        let mut snapshots = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .api
                .list_snapshots(self.project(), &expression, page_token.as_deref())?;
            for resource in &page.items {
                snapshots.push(snapshot_from_resource(resource)?);
            }
            match page.next_page_token {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    tracing::warn!(
                        parent: &self.span,
                        page_token = %token,
                        "google.snapshots.repeated_page_token"
                    );
                    break;
                }
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(
            parent: &self.span,
            filter = %expression,
            count = snapshots.len(),
            "google.snapshots.listed"
        );
        Ok(snapshots)
    }

    pub(super) fn request_snapshot(
        &self,
        disk: &DiskIdentifier,
        name: &str,
        description: &str,
    ) -> Result<NewSnapshotIdentifier, GoogleBackendError> {
        if !is_valid_snapshot_name(name) {
            return Err(GoogleBackendError::InvalidSnapshotName {
                name: name.to_owned(),
                regex: SNAPSHOT_NAME_REGEX.to_owned(),
            });
        }

        let request = CreateSnapshotRequest {
            name: name.to_owned(),
            description: description.to_owned(),
        };
        let operation =
            self.api
                .create_disk_snapshot(self.project(), &disk.zone, &disk.name, &request)?;

        tracing::info!(
            parent: &self.span,
            snapshot = name,
            disk = %disk.name,
            zone = %disk.zone,
            operation = %operation.name,
            "google.snapshot.requested"
        );
        Ok(NewSnapshotIdentifier::new(name, &disk.zone, operation.name))
    }

    /// Re-reads the snapshot for its current label fingerprint, then writes
    /// the complete label set.
    pub(super) fn replace_labels(
        &self,
        identifier: &NewSnapshotIdentifier,
        labels: &Labels,
    ) -> Result<(), GoogleBackendError> {
        let current = self
            .api
            .get_snapshot(self.project(), &identifier.snapshot_name)?;
        let label_fingerprint =
            current
                .label_fingerprint
                .ok_or_else(|| GoogleBackendError::InvalidResponse {
                    field: String::from("labelFingerprint"),
                    message: format!("snapshot {} has no label fingerprint", current.name),
                })?;

        let request = SetLabelsRequest {
            labels: labels.clone(),
            label_fingerprint,
        };
        self.api
            .set_snapshot_labels(self.project(), &identifier.snapshot_name, &request)?;

        tracing::info!(
            parent: &self.span,
            snapshot = %identifier.snapshot_name,
            labels = ?labels,
            "google.snapshot.labelled"
        );
        Ok(())
    }

    pub(super) fn remove_snapshot(&self, snapshot: &Snapshot) -> Result<(), GoogleBackendError> {
        self.api.delete_snapshot(self.project(), &snapshot.name)?;
        tracing::info!(
            parent: &self.span,
            snapshot = %snapshot.name,
            "google.snapshot.deleted"
        );
        Ok(())
    }
}

/// Converts a listed snapshot resource into a [`Snapshot`].
///
/// # Errors
///
/// Returns [`GoogleBackendError::InvalidResponse`] when the creation time or
/// the source disk cannot be parsed.
pub fn snapshot_from_resource(resource: &SnapshotResource) -> Result<Snapshot, GoogleBackendError> {
    let created_at = DateTime::parse_from_rfc3339(&resource.creation_timestamp)
        .map_err(|err| GoogleBackendError::InvalidResponse {
            field: String::from("creationTimestamp"),
            message: format!("{}: {err}", resource.creation_timestamp),
        })?
        .with_timezone(&Utc);
    Ok(Snapshot {
        name: resource.name.clone(),
        created_at,
        disk: parse_source_disk(&resource.source_disk)?,
    })
}

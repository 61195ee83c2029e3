//! Completion tracking for snapshot creation.
//!
//! A creation is tracked through two provider resources. The zone operation
//! is polled first; only once it reports `DONE` does the tracker read the
//! snapshot resource, and from then on the operation is never read again for
//! that identifier. Every poll performs one or two remote reads and never
//! waits or retries.

use crate::backend::{NewSnapshotIdentifier, SnapshotStatus};

use super::api::{ComputeApi, Operation, SNAPSHOT_FAILED, SNAPSHOT_READY};
use super::{GoogleBackend, GoogleBackendError};

impl<A: ComputeApi> GoogleBackend<A> {
    /// Performs one status check for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError::SnapshotCreate`] carrying the provider
    /// status when the snapshot failed, or the transport error of a failed
    /// read.
    pub fn poll_status(
        &self,
        identifier: &mut NewSnapshotIdentifier,
    ) -> Result<SnapshotStatus, GoogleBackendError> {
        if let Some(operation_name) = identifier.operation_name() {
            let operation =
                self.api
                    .get_zone_operation(self.project(), &identifier.zone, operation_name)?;
            if !operation.is_done() {
                tracing::debug!(
                    parent: &self.span,
                    snapshot = %identifier.snapshot_name,
                    operation = %operation.name,
                    status = %operation.status,
                    "google.status.operation_not_complete"
                );
                return Ok(SnapshotStatus::Pending);
            }
            self.log_operation_errors(&identifier.snapshot_name, &operation);
            identifier.mark_operation_done();
        }

        let snapshot = self
            .api
            .get_snapshot(self.project(), &identifier.snapshot_name)?;
        match snapshot.status.as_str() {
            SNAPSHOT_READY => Ok(SnapshotStatus::Complete),
            SNAPSHOT_FAILED => {
                tracing::warn!(
                    parent: &self.span,
                    snapshot = %identifier.snapshot_name,
                    status = %snapshot.status,
                    "google.status.failed"
                );
                Err(GoogleBackendError::SnapshotCreate {
                    snapshot: identifier.snapshot_name.clone(),
                    status: snapshot.status.clone(),
                })
            }
            other => {
                tracing::debug!(
                    parent: &self.span,
                    snapshot = %identifier.snapshot_name,
                    status = other,
                    "google.status.not_ready"
                );
                Ok(SnapshotStatus::Pending)
            }
        }
    }

    fn log_operation_errors(&self, snapshot: &str, operation: &Operation) {
        let Some(errors) = &operation.error else {
            return;
        };
        for item in &errors.errors {
            tracing::warn!(
                parent: &self.span,
                snapshot,
                operation = %operation.name,
                code = %item.code,
                message = %item.message,
                "google.status.operation_error"
            );
        }
    }
}

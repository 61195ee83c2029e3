//! Google Compute Engine backend for persistent disk snapshots.

pub mod api;
pub mod disk;
mod error;
mod http;
mod snapshots;
mod status;

use tracing::Span;

use crate::backend::{
    DiskIdentifier, LabelFilter, Labels, NewSnapshotIdentifier, Snapshot, SnapshotBackend,
    SnapshotStatus,
};
use crate::config::SnapshotConfig;
use crate::volume::PersistentVolume;

pub use api::ComputeApi;
pub use error::GoogleBackendError;
pub use http::{COMPUTE_API_BASE, HttpComputeApi};
pub use snapshots::snapshot_from_resource;

/// Backend managing snapshots of GCE persistent disks.
///
/// The backend validates its configuration once on construction and refuses
/// to exist with an invalid one. Remote calls go through `A`, which is the
/// HTTP transport in production and a scripted double in tests.
#[derive(Debug)]
pub struct GoogleBackend<A = HttpComputeApi> {
    api: A,
    config: SnapshotConfig,
    span: Span,
}

impl GoogleBackend<HttpComputeApi> {
    /// Builds a backend that talks to the Compute Engine API with the
    /// credentials named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError::ConfigValidation`] when the configuration
    /// is invalid, or [`GoogleBackendError::Credentials`] when credentials
    /// cannot be resolved.
    pub fn connect(config: SnapshotConfig) -> Result<Self, GoogleBackendError> {
        config.validate()?;
        let api = HttpComputeApi::from_credentials(config.credential_source()?)?;
        Self::new(config, api)
    }
}

impl<A: ComputeApi> GoogleBackend<A> {
    /// Builds a backend over an explicit API implementation.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError::ConfigValidation`] listing every
    /// configuration violation.
    pub fn new(config: SnapshotConfig, api: A) -> Result<Self, GoogleBackendError> {
        config.validate()?;
        Ok(Self {
            api,
            config,
            span: tracing::debug_span!("gce_snapshots.google"),
        })
    }

    /// Replaces the span that parents every event this backend emits.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Project owning the disks and snapshots.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.config.gcloud_project
    }

    /// Validated configuration.
    #[must_use]
    pub const fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Underlying API implementation.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }
}

impl<A: ComputeApi> SnapshotBackend for GoogleBackend<A> {
    type Error = GoogleBackendError;

    fn supports_volume(&self, volume: &PersistentVolume) -> bool {
        disk::supports_volume(volume)
    }

    fn resolve_disk_identifier(
        &self,
        volume: &PersistentVolume,
    ) -> Result<DiskIdentifier, Self::Error> {
        disk::resolve_disk_identifier(volume)
    }

    fn list_snapshots(&self, filter: &LabelFilter) -> Result<Vec<Snapshot>, Self::Error> {
        self.list_matching(filter)
    }

    fn create_snapshot(
        &self,
        disk: &DiskIdentifier,
        name: &str,
        description: &str,
    ) -> Result<NewSnapshotIdentifier, Self::Error> {
        self.request_snapshot(disk, name, description)
    }

    fn snapshot_status(
        &self,
        identifier: &mut NewSnapshotIdentifier,
    ) -> Result<SnapshotStatus, Self::Error> {
        self.poll_status(identifier)
    }

    fn set_snapshot_labels(
        &self,
        identifier: &NewSnapshotIdentifier,
        labels: &Labels,
    ) -> Result<(), Self::Error> {
        self.replace_labels(identifier, labels)
    }

    fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<(), Self::Error> {
        self.remove_snapshot(snapshot)
    }
}

//! Google Compute Engine backend for Kubernetes volume snapshot scheduling.
//!
//! The crate exposes a provider-neutral [`SnapshotBackend`] abstraction and a
//! Compute Engine implementation that resolves persistent volumes to disks,
//! requests snapshots, tracks their completion, and labels or deletes the
//! results. Configuration is validated once, up front, against the provider's
//! naming and labelling rules so that invalid names never reach the API.

pub mod backend;
pub mod config;
pub mod credentials;
pub mod google;
pub mod test_support;
pub mod validation;
pub mod volume;

pub use backend::{
    CreationPhase, DiskIdentifier, LabelFilter, Labels, NewSnapshotIdentifier, Snapshot,
    SnapshotBackend, SnapshotStatus,
};
pub use config::{ConfigError, SnapshotConfig};
pub use credentials::{CredentialError, CredentialSource, TokenSource};
pub use google::{ComputeApi, GoogleBackend, GoogleBackendError, HttpComputeApi};
pub use validation::{ConfigValidationError, ConfigViolation, ValidationGate, ViolationReason};
pub use volume::PersistentVolume;

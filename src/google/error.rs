//! Error types for the Compute Engine backend.

use thiserror::Error;

use crate::config::ConfigError;
use crate::credentials::CredentialError;
use crate::validation::ConfigValidationError;

/// Errors raised by the Compute Engine backend.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum GoogleBackendError {
    /// Raised when the configuration fails the validation gate.
    #[error(transparent)]
    ConfigValidation(#[from] ConfigValidationError),
    /// Raised when configuration cannot be loaded.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when credentials cannot be resolved or exchanged for a token.
    #[error("credentials error: {0}")]
    Credentials(String),
    /// Raised when a volume cannot be mapped to a disk; callers skip it.
    #[error("unsupported volume {volume}: {reason}")]
    UnsupportedVolume {
        /// Volume name.
        volume: String,
        /// Why the volume is unsupported.
        reason: String,
    },
    /// Raised when a volume has a zone but no GCE disk name.
    #[error("volume {volume} has no gcePersistentDisk.pdName")]
    MissingDiskName {
        /// Volume name.
        volume: String,
    },
    /// Raised before any remote call when a snapshot name breaks the provider
    /// naming rule.
    #[error("invalid snapshot name '{name}': must match {regex}")]
    InvalidSnapshotName {
        /// Rejected name.
        name: String,
        /// Pattern the name must match.
        regex: String,
    },
    /// Raised when the snapshot reached a failed terminal state. The creation
    /// attempt is void and must be restarted from scratch.
    #[error("snapshot {snapshot} failed with status {status}")]
    SnapshotCreate {
        /// Snapshot name.
        snapshot: String,
        /// Literal status reported by the provider.
        status: String,
    },
    /// Raised when the provider reports that a resource does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Resource that was requested.
        resource: String,
    },
    /// Raised when the provider rejects a request.
    #[error("provider returned HTTP {status} for {resource}: {message}")]
    Api {
        /// Resource that was requested.
        resource: String,
        /// HTTP status code.
        status: u16,
        /// Error message returned by the provider.
        message: String,
    },
    /// Raised when the request could not be sent or the response not read.
    #[error("transport error: {message}")]
    Transport {
        /// Message returned by the HTTP client.
        message: String,
    },
    /// Raised when a provider response lacks a field or holds a malformed one.
    #[error("invalid provider response field {field}: {message}")]
    InvalidResponse {
        /// Field that could not be interpreted.
        field: String,
        /// What was wrong with it.
        message: String,
    },
}

impl GoogleBackendError {
    /// Returns `true` when the provider reported the resource as missing.
    /// Callers needing idempotent deletes treat this as success.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` when the error means "skip this volume" rather than an
    /// operational failure.
    #[must_use]
    pub const fn is_unsupported_volume(&self) -> bool {
        matches!(self, Self::UnsupportedVolume { .. })
    }
}

impl From<CredentialError> for GoogleBackendError {
    fn from(value: CredentialError) -> Self {
        Self::Credentials(value.to_string())
    }
}

impl From<ConfigError> for GoogleBackendError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

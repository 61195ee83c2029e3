//! Configuration loading via `ortho-config`.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::backend::{LabelFilter, Labels};
use crate::credentials::{CredentialError, CredentialSource};
use crate::validation::{ConfigValidationError, ValidationGate};

/// Default strftime pattern appended to snapshot names.
pub const DEFAULT_DATETIME_FORMAT: &str = "%d%m%y-%H%M%S";

/// Default label key marking snapshots created by this system.
pub const DEFAULT_AUTHOR_LABEL: &str = "created-by";

/// Default value stored under [`DEFAULT_AUTHOR_LABEL`].
pub const DEFAULT_AUTHOR_LABEL_VALUE: &str = "k8s-snapshots";

/// Snapshot backend configuration derived from environment variables and
/// configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "GCE_SNAPSHOTS")]
pub struct SnapshotConfig {
    /// strftime pattern rendered into snapshot names. The rendered text must
    /// keep names lowercase.
    #[ortho_config(default = DEFAULT_DATETIME_FORMAT.to_owned())]
    pub snapshot_datetime_format: String,
    /// Label key used to mark snapshots created by this system.
    #[ortho_config(default = DEFAULT_AUTHOR_LABEL.to_owned())]
    pub snapshot_author_label: String,
    /// Label value stored under [`Self::snapshot_author_label`]. The field
    /// name is historical; it holds a label value, not a key.
    #[ortho_config(default = DEFAULT_AUTHOR_LABEL_VALUE.to_owned())]
    pub snapshot_author_label_key: String,
    /// Google Cloud project owning the disks and snapshots.
    pub gcloud_project: String,
    /// Path to a JSON key file.
    pub gcloud_json_keyfile_name: Option<String>,
    /// Inline JSON key file contents.
    pub gcloud_json_keyfile_string: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
pub(crate) struct FieldMetadata {
    pub(crate) description: &'static str,
    pub(crate) env_var: &'static str,
    pub(crate) toml_key: &'static str,
}

impl FieldMetadata {
    pub(crate) const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    /// Renders the guidance appended to violations of this field.
    pub(crate) fn guidance(&self) -> String {
        format!(
            "set {} or add {} to gce-snapshots.toml",
            self.env_var, self.toml_key
        )
    }
}

pub(crate) const GCLOUD_PROJECT: FieldMetadata = FieldMetadata::new(
    "Google Cloud project id",
    "GCE_SNAPSHOTS_GCLOUD_PROJECT",
    "gcloud_project",
);

pub(crate) const KEYFILE_NAME: FieldMetadata = FieldMetadata::new(
    "JSON key file path",
    "GCE_SNAPSHOTS_GCLOUD_JSON_KEYFILE_NAME",
    "gcloud_json_keyfile_name",
);

pub(crate) const KEYFILE_STRING: FieldMetadata = FieldMetadata::new(
    "inline JSON key",
    "GCE_SNAPSHOTS_GCLOUD_JSON_KEYFILE_STRING",
    "gcloud_json_keyfile_string",
);

impl SnapshotConfig {
    /// Creates a configuration for `gcloud_project` with default naming and
    /// labelling settings and ambient credentials.
    #[must_use]
    pub fn new(gcloud_project: impl Into<String>) -> Self {
        Self {
            snapshot_datetime_format: DEFAULT_DATETIME_FORMAT.to_owned(),
            snapshot_author_label: DEFAULT_AUTHOR_LABEL.to_owned(),
            snapshot_author_label_key: DEFAULT_AUTHOR_LABEL_VALUE.to_owned(),
            gcloud_project: gcloud_project.into(),
            gcloud_json_keyfile_name: None,
            gcloud_json_keyfile_string: None,
        }
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("gce-snapshots")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Runs the validation gate against the current time, reporting every
    /// violation at once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValidationError`] listing all violations found.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        ValidationGate::default().check(self, chrono::Utc::now())
    }

    /// Selects the credential source described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when both key file fields are set or one is
    /// blank.
    pub fn credential_source(&self) -> Result<CredentialSource, CredentialError> {
        CredentialSource::from_config(
            self.gcloud_json_keyfile_name.as_deref(),
            self.gcloud_json_keyfile_string.as_deref(),
        )
    }

    /// Labels marking a snapshot as created by this system.
    #[must_use]
    pub fn author_labels(&self) -> Labels {
        Labels::from([(
            self.snapshot_author_label.clone(),
            self.snapshot_author_label_key.clone(),
        )])
    }

    /// Listing filter selecting snapshots created by this system.
    #[must_use]
    pub fn author_filter(&self) -> LabelFilter {
        LabelFilter::new(&self.snapshot_author_label, &self.snapshot_author_label_key)
    }
}

/// Errors raised during configuration loading.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

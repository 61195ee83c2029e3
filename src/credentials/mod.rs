//! Credential resolution for the Compute Engine API.
//!
//! Credentials come from exactly one of three places: a JSON service account
//! key file path, an inline JSON key, or the ambient default credentials of
//! the environment (`GOOGLE_APPLICATION_CREDENTIALS`, the GCE metadata
//! server, or the gcloud CLI). Each source becomes a [`TokenSource`] handing
//! out bearer tokens for the compute scope.

use std::sync::Arc;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

/// OAuth scope required for disk snapshot management.
pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";

/// Errors raised while resolving credentials or fetching tokens.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CredentialError {
    /// Raised when both the key file path and the inline key are provided.
    #[error("credentials cannot be provided both as a key file path and inline")]
    BothProvided,
    /// Raised when a configured credential value is empty or only whitespace.
    #[error("{field} must not be empty")]
    Empty {
        /// Configuration field holding the blank value.
        field: String,
    },
    /// Raised when reading the key file fails.
    #[error("failed to read key file `{path}`: {message}")]
    FileRead {
        /// Path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the key is not a usable service account key.
    #[error("failed to load service account key: {0}")]
    Parse(String),
    /// Raised when no ambient credentials can be found.
    #[error("auth for Google Cloud was not configured: {0}")]
    Unavailable(String),
    /// Raised when a token cannot be obtained.
    #[error("token request failed: {0}")]
    Token(String),
}

/// Supplies bearer tokens for API requests.
///
/// Sources are `Send` so a transport built on one can be handed to a worker
/// thread.
pub trait TokenSource: Send {
    /// Returns a currently valid access token.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when no token can be obtained.
    fn access_token(&self) -> Result<String, CredentialError>;
}

/// Where credentials come from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CredentialSource {
    /// JSON service account key file on disk.
    KeyFile(String),
    /// JSON service account key supplied inline.
    InlineKey(String),
    /// Ambient default credentials of the environment.
    Ambient,
}

impl CredentialSource {
    /// Chooses a source from the optional key file path and inline key.
    /// Neither set selects [`CredentialSource::Ambient`].
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::BothProvided`] when both are set, or
    /// [`CredentialError::Empty`] when the provided value is blank.
    pub fn from_config(
        keyfile_name: Option<&str>,
        keyfile_string: Option<&str>,
    ) -> Result<Self, CredentialError> {
        match (keyfile_name, keyfile_string) {
            (Some(_), Some(_)) => Err(CredentialError::BothProvided),
            (Some(path), None) => {
                require_value(path, "gcloud_json_keyfile_name")?;
                Ok(Self::KeyFile(path.trim().to_owned()))
            }
            (None, Some(contents)) => {
                require_value(contents, "gcloud_json_keyfile_string")?;
                Ok(Self::InlineKey(contents.to_owned()))
            }
            (None, None) => Ok(Self::Ambient),
        }
    }

    /// Builds the token source for this credential source. Ambient
    /// credentials are looked up immediately, so a missing source fails here
    /// rather than on the first API call.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the key cannot be read or parsed, or
    /// when no ambient credentials exist.
    pub fn into_token_source(self) -> Result<Box<dyn TokenSource>, CredentialError> {
        let runtime = token_runtime()?;
        let provider: Arc<dyn TokenProvider> = match self {
            Self::KeyFile(path) => Arc::new(service_account(&read_key_file(&path)?)?),
            Self::InlineKey(contents) => Arc::new(service_account(&contents)?),
            Self::Ambient => runtime
                .block_on(gcp_auth::provider())
                .map_err(|err| CredentialError::Unavailable(err.to_string()))?,
        };
        Ok(Box::new(ProviderTokenSource { runtime, provider }))
    }
}

fn require_value(value: &str, field: &str) -> Result<(), CredentialError> {
    if value.trim().is_empty() {
        return Err(CredentialError::Empty {
            field: field.to_owned(),
        });
    }
    Ok(())
}

fn service_account(contents: &str) -> Result<CustomServiceAccount, CredentialError> {
    CustomServiceAccount::from_json(contents).map_err(|err| CredentialError::Parse(err.to_string()))
}

fn token_runtime() -> Result<Runtime, CredentialError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| CredentialError::Unavailable(err.to_string()))
}

fn read_key_file(path: &str) -> Result<String, CredentialError> {
    read_beside_parent(Utf8Path::new(path)).map_err(|message| CredentialError::FileRead {
        path: path.to_owned(),
        message,
    })
}

/// Reads a file through a capability on its parent directory. Bare file names
/// resolve against the working directory; any other parent, including one
/// that climbs with `..`, is opened as given.
fn read_beside_parent(path: &Utf8Path) -> Result<String, String> {
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("path has no file name: {path}"))?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_name).map_err(|err| err.to_string())
}

/// Blocking adapter over an async `gcp_auth` provider. The provider caches
/// tokens until they expire.
struct ProviderTokenSource {
    runtime: Runtime,
    provider: Arc<dyn TokenProvider>,
}

impl TokenSource for ProviderTokenSource {
    fn access_token(&self) -> Result<String, CredentialError> {
        let token = self
            .runtime
            .block_on(self.provider.token(&[COMPUTE_SCOPE]))
            .map_err(|err| CredentialError::Token(err.to_string()))?;
        Ok(token.as_str().to_owned())
    }
}

/// Fixed token, for pre-minted tokens and tests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    /// Wraps an access token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenSource for StaticTokenSource {
    fn access_token(&self) -> Result<String, CredentialError> {
        Ok(self.token.clone())
    }
}

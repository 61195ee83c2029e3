//! Blocking HTTP transport for the Compute Engine API.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::credentials::{CredentialSource, TokenSource};

use super::GoogleBackendError;
use super::api::{
    ComputeApi, CreateSnapshotRequest, Operation, SetLabelsRequest, SnapshotPage,
    SnapshotResource,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URL of the Compute Engine v1 REST API.
pub const COMPUTE_API_BASE: &str = "https://compute.googleapis.com/compute/v1";

/// [`ComputeApi`] implementation backed by `reqwest`.
///
/// The transport is `Send` but not `Sync`: build one, then move it to the
/// worker that uses it.
pub struct HttpComputeApi {
    client: Client,
    base_url: String,
    tokens: Box<dyn TokenSource>,
}

impl std::fmt::Debug for HttpComputeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpComputeApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpComputeApi {
    /// Creates a transport authenticating with `tokens`.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError::Transport`] when the HTTP client cannot
    /// be built.
    pub fn new(tokens: Box<dyn TokenSource>) -> Result<Self, GoogleBackendError> {
        Ok(Self::with_client(http_client()?, tokens))
    }

    /// Creates a transport from a resolved credential source.
    ///
    /// # Errors
    ///
    /// Returns [`GoogleBackendError::Credentials`] when the key cannot be
    /// loaded, or [`GoogleBackendError::Transport`] when the HTTP client
    /// cannot be built.
    pub fn from_credentials(source: CredentialSource) -> Result<Self, GoogleBackendError> {
        let tokens = source.into_token_source()?;
        Ok(Self::with_client(http_client()?, tokens))
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub fn with_client(client: Client, tokens: Box<dyn TokenSource>) -> Self {
        Self {
            client,
            base_url: COMPUTE_API_BASE.to_owned(),
            tokens,
        }
    }

    /// Points the transport at another API root, such as a local emulator.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn project_url(&self, project: &str, path: &str) -> String {
        project_url(&self.base_url, project, path)
    }

    fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<T, GoogleBackendError> {
        let token = self.tokens.access_token()?;
        let response = request
            .bearer_auth(token)
            .send()
            .map_err(|err| transport_error(&err))?;
        let status = response.status();
        let body = response.text().map_err(|err| transport_error(&err))?;

        if status == StatusCode::NOT_FOUND {
            return Err(GoogleBackendError::NotFound {
                resource: resource.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(GoogleBackendError::Api {
                resource: resource.to_owned(),
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|err| GoogleBackendError::InvalidResponse {
            field: resource.to_owned(),
            message: err.to_string(),
        })
    }
}

impl ComputeApi for HttpComputeApi {
    fn list_snapshots(
        &self,
        project: &str,
        filter: &str,
        page_token: Option<&str>,
    ) -> Result<SnapshotPage, GoogleBackendError> {
        let mut request = self
            .client
            .get(self.project_url(project, "global/snapshots"))
            .query(&[("filter", filter)]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        self.send(request, "snapshot list")
    }

    fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, GoogleBackendError> {
        let url = self.project_url(project, &format!("zones/{zone}/operations/{operation}"));
        self.send(self.client.get(url), &format!("operation {operation}"))
    }

    fn create_disk_snapshot(
        &self,
        project: &str,
        zone: &str,
        disk: &str,
        request: &CreateSnapshotRequest,
    ) -> Result<Operation, GoogleBackendError> {
        let url = self.project_url(project, &format!("zones/{zone}/disks/{disk}/createSnapshot"));
        self.send(self.client.post(url).json(request), &format!("disk {disk}"))
    }

    fn get_snapshot(
        &self,
        project: &str,
        name: &str,
    ) -> Result<SnapshotResource, GoogleBackendError> {
        let url = self.project_url(project, &format!("global/snapshots/{name}"));
        self.send(self.client.get(url), &format!("snapshot {name}"))
    }

    fn set_snapshot_labels(
        &self,
        project: &str,
        name: &str,
        request: &SetLabelsRequest,
    ) -> Result<Operation, GoogleBackendError> {
        let url = self.project_url(project, &format!("global/snapshots/{name}/setLabels"));
        self.send(self.client.post(url).json(request), &format!("snapshot {name}"))
    }

    fn delete_snapshot(&self, project: &str, name: &str) -> Result<Operation, GoogleBackendError> {
        let url = self.project_url(project, &format!("global/snapshots/{name}"));
        self.send(self.client.delete(url), &format!("snapshot {name}"))
    }
}

fn http_client() -> Result<Client, GoogleBackendError> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|err| transport_error(&err))
}

fn transport_error(err: &reqwest::Error) -> GoogleBackendError {
    GoogleBackendError::Transport {
        message: err.to_string(),
    }
}

fn project_url(base_url: &str, project: &str, path: &str) -> String {
    format!("{}/projects/{project}/{path}", base_url.trim_end_matches('/'))
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Extracts `error.message` from a Google API error body, falling back to the
/// raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_urls_join_without_double_slashes() {
        assert_eq!(
            project_url("http://localhost:8080/compute/v1/", "p", "global/snapshots"),
            "http://localhost:8080/compute/v1/projects/p/global/snapshots"
        );
        assert_eq!(
            project_url(COMPUTE_API_BASE, "my-project", "zones/europe-west1-b/operations/op-1"),
            "https://compute.googleapis.com/compute/v1/projects/my-project/zones/europe-west1-b/operations/op-1"
        );
    }

    #[test]
    fn api_error_message_reads_google_error_envelope() {
        let body = r#"{"error":{"code":412,"message":"Labels fingerprint either invalid or resource labels have changed","errors":[]}}"#;
        assert_eq!(
            api_error_message(body),
            "Labels fingerprint either invalid or resource labels have changed"
        );
    }

    #[test]
    fn backend_over_http_moves_to_worker_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<HttpComputeApi>();
        assert_send::<crate::GoogleBackend<HttpComputeApi>>();
    }

    #[test]
    fn api_error_message_falls_back_to_body() {
        assert_eq!(api_error_message("  upstream timeout \n"), "upstream timeout");
        assert_eq!(api_error_message(r#"{"error":{}}"#), r#"{"error":{}}"#);
    }
}

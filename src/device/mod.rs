//! Reading-device HTTP API: connectivity, folder creation and upload.
//!
//! The pipeline only sees [`UploadGateway`]; [`DeviceClient`] is the HTTP
//! implementation used by the binary and the integration tests.

mod error;

pub use error::DeviceError;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::scope::CallScope;

const DEVICE_PATH: &str = "/api/device";
const LIBRARY_PATH: &str = "/api/library";
const UPLOAD_PATH: &str = "/api/library/upload";

/// Destination for finished archives.
///
/// # Object Safety
///
/// Uses `async_trait` so the pipeline can hold an `Arc<dyn UploadGateway>`.
#[async_trait]
pub trait UploadGateway: Send + Sync {
    /// Creates a folder and returns its identifier.
    async fn create_folder(
        &self,
        parent: Option<&str>,
        name: &str,
        scope: &CallScope,
    ) -> Result<String, DeviceError>;

    /// Uploads one file. An empty `folder_id` targets the library root.
    async fn upload_file(
        &self,
        folder_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        scope: &CallScope,
    ) -> Result<(), DeviceError>;
}

/// Identity and storage report from `GET /api/device`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceDetails {
    /// Device host name.
    pub host: String,
    /// Device identifier.
    pub id: String,
    /// Hardware address.
    pub mac: String,
    /// Model name.
    pub model: String,
    /// Total storage, as reported.
    pub storage_total: String,
    /// Used storage, as reported.
    pub storage_used: String,
    /// Device type.
    #[serde(rename = "type")]
    pub device_type: String,
}

#[derive(Debug, Serialize)]
struct FolderRequest<'a> {
    parent: Option<&'a str>,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct FolderResponse {
    #[serde(default)]
    id: String,
}

/// HTTP client for the device's library API.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    client: Client,
    base_url: String,
}

impl DeviceClient {
    /// Creates a client for the device at `base_url` (e.g. `http://10.0.0.5:8085`).
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Confirms the device is reachable and returns its details.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] on transport failure, a non-200 status, an
    /// undecodable reply, or scope expiry.
    #[instrument(skip(self, scope), fields(device = %self.base_url))]
    pub async fn check_connection(&self, scope: &CallScope) -> Result<DeviceDetails, DeviceError> {
        let body = self
            .execute(self.client.get(self.url(DEVICE_PATH)), DEVICE_PATH, scope)
            .await?;
        let details: DeviceDetails =
            serde_json::from_slice(&body).map_err(|source| DeviceError::decode(DEVICE_PATH, source))?;
        info!(model = %details.model, "device reachable");
        Ok(details)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends `request` within `scope` and returns the body of a 200 reply.
    async fn execute(
        &self,
        request: RequestBuilder,
        endpoint: &str,
        scope: &CallScope,
    ) -> Result<Vec<u8>, DeviceError> {
        let response = scope
            .run(request.send())
            .await
            .map_err(|exit| DeviceError::from_scope(endpoint, exit))?
            .map_err(|source| DeviceError::network(endpoint, source))?;
        let status = response.status();
        let body = scope
            .run(response.bytes())
            .await
            .map_err(|exit| DeviceError::from_scope(endpoint, exit))?
            .map_err(|source| DeviceError::network(endpoint, source))?;
        if status != reqwest::StatusCode::OK {
            return Err(DeviceError::status(
                endpoint,
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl UploadGateway for DeviceClient {
    #[instrument(skip(self, scope), fields(device = %self.base_url))]
    async fn create_folder(
        &self,
        parent: Option<&str>,
        name: &str,
        scope: &CallScope,
    ) -> Result<String, DeviceError> {
        let payload = FolderRequest { parent, name };
        let request = self.client.post(self.url(LIBRARY_PATH)).json(&payload);
        let body = self.execute(request, LIBRARY_PATH, scope).await?;
        let folder: FolderResponse =
            serde_json::from_slice(&body).map_err(|source| DeviceError::decode(LIBRARY_PATH, source))?;
        debug!(folder_id = %folder.id, "folder created");
        Ok(folder.id)
    }

    #[instrument(skip(self, bytes, scope), fields(device = %self.base_url, size = bytes.len()))]
    async fn upload_file(
        &self,
        folder_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        scope: &CallScope,
    ) -> Result<(), DeviceError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let mut form = Form::new().part("file", part);
        if !folder_id.is_empty() {
            form = form.text("parent", folder_id.to_string());
        }
        form = form.text("name", file_name.to_string());

        let request = self.client.post(self.url(UPLOAD_PATH)).multipart(form);
        self.execute(request, UPLOAD_PATH, scope).await?;
        debug!("upload accepted");
        Ok(())
    }
}

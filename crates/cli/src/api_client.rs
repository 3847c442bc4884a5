use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Url;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Header carrying the access key.
pub const KEY_HEADER: &str = "X-Blober-ID";

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    key: Option<String>,
}

/// Response envelope shared by every JSON endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ApiClient {
    pub fn new(base_url: &str, key: Option<&str>) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            key: key.map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.key {
            Some(key) => req.header(KEY_HEADER, key),
            None => req,
        }
    }

    fn require_key(&self) -> Result<()> {
        if self.key.is_none() {
            anyhow::bail!("no access key configured: run `blober login` or pass --key");
        }
        Ok(())
    }

    /// Send a request and unwrap the envelope's `data`.
    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let response = self.with_key(req).send().await?;
        let status = response.status();
        tracing::debug!(url = %response.url(), %status, "API response");
        let body = response.text().await.unwrap_or_default();

        let envelope: Envelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => anyhow::bail!("API error ({}): {}", status, body),
            Err(e) => return Err(e).context("unexpected response from server"),
        };
        if envelope.error || !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, envelope.message);
        }
        Ok(serde_json::from_value(envelope.data)?)
    }

    pub async fn signup(&self, req: &SignupRequest) -> Result<AccountInfo> {
        let url = self.url("/account/new")?;
        self.send_json(self.http.post(url).json(req)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AccountInfo> {
        let url = self.url("/account/authenticate")?;
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.send_json(self.http.post(url).json(&req)).await
    }

    pub async fn create_app(&self, name: &str) -> Result<AppInfo> {
        self.require_key()?;
        let url = self.url("/app/new")?;
        let req = CreateAppRequest {
            name: name.to_string(),
        };
        self.send_json(self.http.post(url).json(&req)).await
    }

    pub async fn list_apps(&self) -> Result<Vec<AppInfo>> {
        self.require_key()?;
        let url = self.url("/me/apps")?;
        self.send_json(self.http.get(url)).await
    }

    pub async fn list_blobs(&self, app_id: i64, page: i64) -> Result<Vec<BlobInfo>> {
        self.require_key()?;
        let url = self.url(&format!("/apps/{app_id}/blobs/{page}"))?;
        self.send_json(self.http.get(url)).await
    }

    /// Upload one file to `/{app}/upload`.
    pub async fn upload(&self, app: &str, path: &Path, private: bool) -> Result<BlobInfo> {
        self.require_key()?;
        let url = self.url(&format!("/{app}/upload"))?;
        let form = Form::new()
            .part("file_data", file_part(path).await?)
            .text("private", private.to_string());
        self.send_json(self.http.post(url).multipart(form)).await
    }

    /// Upload several files to `/{app}/uploads` in one request.
    pub async fn upload_many(
        &self,
        app: &str,
        paths: &[PathBuf],
        private: bool,
    ) -> Result<BatchUploadResult> {
        self.require_key()?;
        let url = self.url(&format!("/{app}/uploads"))?;
        let mut form = Form::new().text("private", private.to_string());
        for path in paths {
            form = form.part("files[]", file_part(path).await?);
        }
        self.send_json(self.http.post(url).multipart(form)).await
    }

    /// Stream a blob to disk.
    ///
    /// Writes to `output` when given, otherwise to the filename the server
    /// suggests (or the hash) in the current directory. Returns the path
    /// written and the number of bytes.
    pub async fn download(
        &self,
        namespace: &str,
        hash: &str,
        output: Option<&Path>,
    ) -> Result<(PathBuf, u64)> {
        let url = self.url(&format!("/{namespace}/{hash}/download"))?;
        let response = self.with_key(self.http.get(url)).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Envelope>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        let dest = match output {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(
                response
                    .headers()
                    .get(CONTENT_DISPOSITION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(attachment_filename)
                    .unwrap_or_else(|| hash.to_string()),
            ),
        };

        let mut file = tokio::fs::File::create(&dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("download interrupted")?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok((dest, written))
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.url("/health")?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }
        Ok(response.json().await?)
    }
}

async fn file_part(path: &Path) -> Result<Part> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(data).file_name(filename))
}

/// Filename from an `attachment; filename="..."` header, without any
/// directory components.
pub fn attachment_filename(header: &str) -> Option<String> {
    let value = header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?;
    let value = value.trim_matches('"');
    let name = Path::new(value).file_name()?.to_string_lossy().into_owned();
    (!name.is_empty() && name != "..").then_some(name)
}

// =============================================================================
// Request/response types (mirrored from server handlers)
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAppRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CredentialInfo {
    pub private_access_key: String,
    pub public_access_key: String,
    pub expires_at: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub created_at: String,
    pub credential: Option<CredentialInfo>,
}

#[derive(Debug, Deserialize)]
pub struct AppInfo {
    pub id: i64,
    pub name: String,
    pub account_id: i64,
    pub namespace: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct BlobInfo {
    pub id: i64,
    pub app_id: i64,
    pub hash: String,
    pub size: i64,
    pub content_type: String,
    #[serde(default)]
    pub filename: String,
    pub app_name: String,
    pub is_private: bool,
    pub download_url: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchUploadResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub blobs: Vec<BlobInfo>,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

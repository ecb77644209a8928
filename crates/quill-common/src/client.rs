//! HTTP implementation of `BlogApi`.

use reqwest::multipart::{Form, Part};
use url::Url;

use crate::api::{BlogApi, ImageFile, SaveRequest, SaveResponse, UploadResponse};
use crate::bluesky::{self, BlueskyPostRef, DEFAULT_APPVIEW};
use crate::error::ApiError;

/// Where the client sends its requests.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the blog server, e.g. `https://example.com`.
    pub base_url: Url,
    /// AppView used for Bluesky handle resolution.
    pub appview_url: Url,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            appview_url: Url::parse(DEFAULT_APPVIEW)?,
        })
    }

    pub fn with_appview(mut self, appview_url: &str) -> Result<Self, ApiError> {
        self.appview_url = Url::parse(appview_url)?;
        Ok(self)
    }

    fn save_url(&self, post_id: i64) -> Result<Url, ApiError> {
        Ok(self.base_url.join(&format!("/blog/{post_id}/edit"))?)
    }

    fn upload_url(&self) -> Result<Url, ApiError> {
        Ok(self.base_url.join("/api/upload-image")?)
    }
}

/// `BlogApi` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpBlogClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpBlogClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Reuse an existing reqwest client (shared connection pool, cookies for auth).
    pub fn with_client(http: reqwest::Client, config: ClientConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

impl BlogApi for HttpBlogClient {
    async fn save(&self, post_id: i64, request: SaveRequest) -> Result<SaveResponse, ApiError> {
        let url = self.config.save_url(post_id)?;
        tracing::debug!(post_id, intent = %request.intent, "submitting save request");

        let response = self.http.post(url).json(&request).send().await?;
        let response = error_for_status(response).await?;
        Ok(response.json::<SaveResponse>().await?)
    }

    async fn upload_image(&self, image: ImageFile) -> Result<UploadResponse, ApiError> {
        let url = self.config.upload_url()?;
        tracing::debug!(
            file_name = %image.file_name,
            mime_type = %image.mime_type,
            size = image.len(),
            "uploading image"
        );

        let part = Part::bytes(image.data.to_vec())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)?;
        let form = Form::new().part("image", part);

        let response = self.http.post(url).multipart(form).send().await?;
        let response = error_for_status(response).await?;
        let uploaded: UploadResponse = response.json().await?;
        if !uploaded.success {
            return Err(ApiError::Rejected(format!(
                "upload of {} was not accepted",
                image.file_name
            )));
        }
        Ok(uploaded)
    }

    async fn resolve_bluesky_post(&self, url: &str) -> Result<BlueskyPostRef, ApiError> {
        bluesky::convert_post_url(&self.http, &self.config.appview_url, url).await
    }
}

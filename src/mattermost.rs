use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::{error, info};

use crate::types::{Config, PostPayload, ProfileArtifact, UploadResponse};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload response contained no file infos")]
    EmptyFileInfos,
}

impl UploadResponse {
    pub fn first_file_id(&self) -> Result<&str, UploadError> {
        self.file_infos
            .first()
            .map(|f| f.file_id.as_str())
            .ok_or(UploadError::EmptyFileInfos)
    }
}

/// One field of a multipart upload form.
#[derive(Debug, Clone)]
pub enum FormField {
    File(PathBuf),
    Text(String),
}

async fn build_form(fields: Vec<(String, FormField)>) -> Result<Form> {
    let mut form = Form::new();
    for (key, field) in fields {
        form = match field {
            FormField::File(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| key.clone());
                form.part(key, Part::bytes(bytes).file_name(file_name))
            }
            FormField::Text(value) => form.text(key, value),
        };
    }
    Ok(form)
}

/// Uploads a multipart form and returns the id of the first stored file.
pub async fn upload_file(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    fields: Vec<(String, FormField)>,
) -> Result<String> {
    let form = build_form(fields).await?;
    let res = client
        .post(url)
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .context("Failed to send upload request")?;
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        error!("File upload failed: {} - {}", status, body);
        return Err(anyhow!("Upload API returned non-success status {}", status));
    }
    let data: UploadResponse = res.json().await.context("Failed to parse upload response")?;
    Ok(data.first_file_id()?.to_string())
}

pub fn build_post_payload(channel_id: &str, label: &str, file_ids: &[String], now: DateTime<Utc>) -> PostPayload {
    PostPayload {
        channel_id: channel_id.to_string(),
        message: format!(
            "### CPU and Memory profiles for {} ({} UTC)",
            label,
            now.format("%Y-%m-%d %H:%M:%S")
        ),
        file_ids: file_ids.to_vec(),
    }
}

pub async fn post_files(client: &reqwest::Client, url: &str, token: &str, payload: &PostPayload) -> Result<()> {
    let res = client
        .post(url)
        .bearer_auth(token)
        .json(payload)
        .send()
        .await
        .context("Failed to send post request")?;
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        error!("Posting files failed: {} - {}", status, body);
        return Err(anyhow!("Post API returned non-success status {}", status));
    }
    Ok(())
}

/// Publishes collected profiles for one group of targets.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Uploads every artifact in order, posts one message, and returns the file ids.
    async fn publish(&self, label: &str, artifacts: &[ProfileArtifact]) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct MattermostSettings {
    pub upload_api_url: String,
    pub post_api_url: String,
    pub channel_id: String,
    pub token: String,
}

impl MattermostSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            upload_api_url: cfg.upload_api_url.clone(),
            post_api_url: cfg.post_api_url.clone(),
            channel_id: cfg.channel_id.clone(),
            token: cfg.token.clone(),
        }
    }
}

pub struct MattermostPublisher {
    client: reqwest::Client,
    settings: MattermostSettings,
}

impl MattermostPublisher {
    pub fn new(client: reqwest::Client, settings: MattermostSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl ArtifactPublisher for MattermostPublisher {
    async fn publish(&self, label: &str, artifacts: &[ProfileArtifact]) -> Result<Vec<String>> {
        info!("Uploading files in channel - {}", self.settings.channel_id);
        let mut file_ids = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let file_name = artifact.file_name();
            info!("Uploading file {}", file_name);
            let fields = vec![
                ("files".to_string(), FormField::File(artifact.path.clone())),
                ("channel_id".to_string(), FormField::Text(self.settings.channel_id.clone())),
            ];
            let id = upload_file(&self.client, &self.settings.upload_api_url, &self.settings.token, fields)
                .await
                .with_context(|| format!("Failed to upload file {}", file_name))?;
            file_ids.push(id);
        }

        info!("Posting files");
        let payload = build_post_payload(&self.settings.channel_id, label, &file_ids, Utc::now());
        post_files(&self.client, &self.settings.post_api_url, &self.settings.token, &payload)
            .await
            .context("Failed to post files")?;
        Ok(file_ids)
    }
}

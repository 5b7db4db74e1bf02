use anyhow::{bail, Context, Result};
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;

use crate::attachments::{sniff_image_mime, WebhookPayload, TEXT_FIELD, UPLOAD_FIELD, UPLOAD_FILE_NAME};
use crate::config::EngineConfig;

/// Source of the published conversation sheet.
pub trait SheetSource: Send + Sync {
    fn fetch_csv(&self) -> Result<String>;
}

/// Image-generation status API, one call per task id.
pub trait ImageStatusSource: Send + Sync {
    fn lookup(&self, task_id: &str) -> Result<Value>;
}

/// Checks that a gallery URL actually serves an image.
pub trait ImageProbe: Send + Sync {
    fn probe(&self, url: &str) -> Result<()>;
}

/// Ad-generation webhook. Only success or failure of the call matters.
pub trait AdWebhook: Send + Sync {
    fn submit(&self, payload: &WebhookPayload) -> Result<()>;
}

/// The external services a session talks to.
pub struct Collaborators {
    pub sheet: Box<dyn SheetSource>,
    pub status: Box<dyn ImageStatusSource>,
    pub probe: Box<dyn ImageProbe>,
    pub webhook: Box<dyn AdWebhook>,
}

impl Collaborators {
    pub fn http(config: &EngineConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.http_timeout)
            .build()
            .context("failed building HTTP client")?;
        Ok(Self {
            sheet: Box::new(HttpSheetSource {
                url: config.sheet_csv_url.clone(),
                http: http.clone(),
            }),
            status: Box::new(HttpImageStatus {
                api_url: config.status_api_url.clone(),
                token: config.status_token.clone(),
                http: http.clone(),
            }),
            probe: Box::new(HttpImageProbe { http: http.clone() }),
            webhook: Box::new(HttpAdWebhook {
                url: config.webhook_url.clone(),
                http,
            }),
        })
    }
}

pub struct HttpSheetSource {
    url: String,
    http: HttpClient,
}

impl SheetSource for HttpSheetSource {
    fn fetch_csv(&self) -> Result<String> {
        let response = self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/csv")
            .send()
            .with_context(|| format!("sheet request failed ({})", self.url))?;
        response_text_or_error("sheet", response)
    }
}

pub struct HttpImageStatus {
    api_url: String,
    token: Option<String>,
    http: HttpClient,
}

impl ImageStatusSource for HttpImageStatus {
    fn lookup(&self, task_id: &str) -> Result<Value> {
        let mut request = self.http.get(&self.api_url).query(&[("taskId", task_id)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .with_context(|| format!("image status request failed (task {task_id})"))?;
        response_json_or_error("image status", response)
    }
}

pub struct HttpImageProbe {
    http: HttpClient,
}

impl ImageProbe for HttpImageProbe {
    fn probe(&self, url: &str) -> Result<()> {
        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("image request failed ({url})"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("image request failed ({}): {url}", status.as_u16());
        }
        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);
        let bytes = response
            .bytes()
            .with_context(|| format!("failed reading image bytes ({url})"))?;
        if sniff_image_mime(&bytes).is_none() {
            bail!(
                "{url} did not return a recognizable image (content-type {})",
                declared.as_deref().unwrap_or("unknown")
            );
        }
        Ok(())
    }
}

pub struct HttpAdWebhook {
    url: String,
    http: HttpClient,
}

impl AdWebhook for HttpAdWebhook {
    fn submit(&self, payload: &WebhookPayload) -> Result<()> {
        let mut form = MultipartForm::new();
        if let Some(image) = &payload.image {
            let part = MultipartPart::bytes(image.bytes.clone())
                .file_name(UPLOAD_FILE_NAME)
                .mime_str(&image.mime_type)
                .with_context(|| format!("invalid mime '{}' for upload", image.mime_type))?;
            form = form.part(UPLOAD_FIELD, part);
        }
        form = form.text(TEXT_FIELD, payload.text.clone());

        let response = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .context("ad webhook request failed")?;
        response_text_or_error("ad webhook", response).map(|_| ())
    }
}

fn response_text_or_error(service: &str, response: HttpResponse) -> Result<String> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{service} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{service} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    Ok(body)
}

fn response_json_or_error(service: &str, response: HttpResponse) -> Result<Value> {
    let body = response_text_or_error(service, response)?;
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{service} returned invalid JSON payload"))?;
    Ok(parsed)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

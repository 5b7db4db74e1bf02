use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_SHEET_ID: &str = "133ZHExWO_6Jfdmx_VRntJG_XJuy7wTXgepPs78yRuyg";
pub const DEFAULT_SHEET_GID: &str = "2100534081";
pub const DEFAULT_STATUS_API_URL: &str = "https://api.kie.ai/api/v1/gpt4o-image/record-info";
pub const DEFAULT_WEBHOOK_URL: &str =
    "https://vidgy.app.n8n.cloud/webhook/dfc4bb03-133f-4413-8f87-d6746addcf06";

const DEFAULT_SUBMIT_GRACE_MS: u64 = 2000;
const DEFAULT_SELECT_DELAY_MS: u64 = 1000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Endpoints and timings for one chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub sheet_csv_url: String,
    pub status_api_url: String,
    pub status_token: Option<String>,
    pub webhook_url: String,
    /// Wait after a webhook submit before the sheet is re-read.
    pub submit_grace: Duration,
    /// Wait after the post-submit refresh before auto-selecting the new thread.
    pub select_delay: Duration,
    pub http_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sheet_csv_url: sheet_csv_url(DEFAULT_SHEET_ID, DEFAULT_SHEET_GID),
            status_api_url: DEFAULT_STATUS_API_URL.to_string(),
            status_token: None,
            webhook_url: DEFAULT_WEBHOOK_URL.to_string(),
            submit_grace: Duration::from_millis(DEFAULT_SUBMIT_GRACE_MS),
            select_delay: Duration::from_millis(DEFAULT_SELECT_DELAY_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let sheet_csv_url = lookup("AIGEN_SHEET_CSV_URL").unwrap_or_else(|| {
            sheet_csv_url(
                &lookup("AIGEN_SHEET_ID").unwrap_or_else(|| DEFAULT_SHEET_ID.to_string()),
                &lookup("AIGEN_SHEET_GID").unwrap_or_else(|| DEFAULT_SHEET_GID.to_string()),
            )
        });
        Ok(Self {
            sheet_csv_url,
            status_api_url: lookup("AIGEN_STATUS_API_URL").unwrap_or(defaults.status_api_url),
            status_token: lookup("AIGEN_STATUS_TOKEN").or_else(|| lookup("KIE_API_TOKEN")),
            webhook_url: lookup("AIGEN_WEBHOOK_URL").unwrap_or(defaults.webhook_url),
            submit_grace: millis_var(&lookup, "AIGEN_SUBMIT_GRACE_MS")?
                .unwrap_or(defaults.submit_grace),
            select_delay: millis_var(&lookup, "AIGEN_SELECT_DELAY_MS")?
                .unwrap_or(defaults.select_delay),
            http_timeout: lookup("AIGEN_HTTP_TIMEOUT_SECS")
                .map(|raw| {
                    raw.parse::<u64>()
                        .with_context(|| format!("AIGEN_HTTP_TIMEOUT_SECS is not a number: {raw}"))
                })
                .transpose()?
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
        })
    }
}

pub fn sheet_csv_url(sheet_id: &str, gid: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{sheet_id}/export?format=csv&gid={gid}")
}

fn millis_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    lookup(key)
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_millis)
                .with_context(|| format!("{key} is not a number of milliseconds: {raw}"))
        })
        .transpose()
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

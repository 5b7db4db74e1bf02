use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

/// Everything a chat session reports to its event log.
///
/// Serializes to a flat object whose `type` is the snake_case variant name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    SessionStarted {
        sheet_url: String,
        status_api_url: String,
        status_token_set: bool,
        webhook_url: String,
    },
    SheetFetchStarted {
        generation: u64,
    },
    SheetLoaded {
        generation: u64,
        conversations: usize,
    },
    SheetFetchFailed {
        generation: u64,
        error: String,
    },
    /// A refresh result arrived after a newer refresh had started.
    RefreshDiscarded {
        generation: u64,
    },
    ImageLookupFailed {
        task_id: String,
        error: String,
    },
    ImageStatusUnrecognized {
        task_id: String,
        error: String,
        body: String,
    },
    ThreadsBuilt {
        generation: u64,
        threads: usize,
        images: usize,
    },
    MessageSubmitted {
        thread_id: String,
        message_id: String,
        images: usize,
    },
    WebhookFailed {
        thread_id: String,
        message_id: String,
        error: String,
    },
    ThreadAutoSelected {
        thread_id: String,
    },
    ImageLoadFailed {
        thread_id: String,
        index: usize,
        url: String,
        error: String,
    },
}

impl ChatEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::SheetFetchStarted { .. } => "sheet_fetch_started",
            Self::SheetLoaded { .. } => "sheet_loaded",
            Self::SheetFetchFailed { .. } => "sheet_fetch_failed",
            Self::RefreshDiscarded { .. } => "refresh_discarded",
            Self::ImageLookupFailed { .. } => "image_lookup_failed",
            Self::ImageStatusUnrecognized { .. } => "image_status_unrecognized",
            Self::ThreadsBuilt { .. } => "threads_built",
            Self::MessageSubmitted { .. } => "message_submitted",
            Self::WebhookFailed { .. } => "webhook_failed",
            Self::ThreadAutoSelected { .. } => "thread_auto_selected",
            Self::ImageLoadFailed { .. } => "image_load_failed",
        }
    }
}

/// Session event log, one JSON object per line stamped with the session id
/// and a UTC timestamp.
///
/// Clones append to the same file under one lock, so gallery lookups on
/// worker threads can log alongside the engine.
#[derive(Debug, Clone)]
pub struct EventWriter {
    shared: Arc<SessionLog>,
}

#[derive(Debug)]
struct SessionLog {
    path: PathBuf,
    session_id: String,
    file_lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(SessionLog {
                path: path.into(),
                session_id: session_id.into(),
                file_lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    /// Appends `event` and returns the record as written.
    pub fn emit(&self, event: &ChatEvent) -> anyhow::Result<Value> {
        let mut record = serde_json::to_value(event)?;
        if let Value::Object(fields) = &mut record {
            fields.insert(
                "session_id".to_string(),
                Value::String(self.shared.session_id.clone()),
            );
            fields.insert("ts".to_string(), Value::String(timestamp()));
        }
        let line = serde_json::to_string(&record)?;

        if let Some(dir) = self.shared.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let _guard = self
            .shared
            .file_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.shared.path)?;
        writeln!(file, "{line}")?;
        Ok(record)
    }

    /// Appends `event`; a failed write is reported on stderr and the session
    /// carries on.
    pub fn record(&self, event: &ChatEvent) {
        if let Err(err) = self.emit(event) {
            eprintln!(
                "aigen: could not log {} to {}: {err:#}",
                event.name(),
                self.shared.path.display()
            );
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

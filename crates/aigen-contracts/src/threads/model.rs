use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sheet::Shot;

pub const NEW_CHAT_THREAD_ID: &str = "excel-new-1";
pub const NEW_CHAT_TITLE: &str = "New Chat";
pub const TITLE_MAX_CHARS: usize = 80;

const SHEET_THREAD_PREFIX: &str = "sheet-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub is_user: bool,
    /// Inline `data:` URIs attached by the user.
    pub uploaded_images: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub is_frozen: bool,
    pub gallery_images: Vec<String>,
    pub gallery_prompt: String,
    pub gallery_task_ids: Vec<String>,
    pub shots: Vec<Shot>,
}

impl Thread {
    /// An empty, editable thread.
    pub fn new_chat(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: NEW_CHAT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            is_frozen: false,
            gallery_images: Vec::new(),
            gallery_prompt: String::new(),
            gallery_task_ids: Vec::new(),
            shots: Vec::new(),
        }
    }

    pub fn is_new_chat(&self) -> bool {
        !self.is_frozen && !is_sheet_thread_id(&self.id)
    }

    pub fn is_empty_new_chat(&self) -> bool {
        self.is_new_chat() && self.messages.is_empty()
    }

    /// Appends a message, retitling an untouched thread after its first message.
    pub fn push_message(&mut self, message: Message) {
        if self.messages.is_empty() {
            self.title = truncate_title(&message.text);
        }
        self.messages.push(message);
    }
}

pub fn sheet_thread_id(index: usize) -> String {
    format!("{SHEET_THREAD_PREFIX}{}", index + 1)
}

pub fn is_sheet_thread_id(id: &str) -> bool {
    id.strip_prefix(SHEET_THREAD_PREFIX)
        .map(|rest| !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_digit()))
        .unwrap_or(false)
}

/// Id for a thread opened with "new chat"; never collides with sheet ids.
pub fn new_chat_thread_id() -> String {
    format!("chat-{}", Uuid::new_v4())
}

pub fn truncate_title(text: &str) -> String {
    text.chars().take(TITLE_MAX_CHARS).collect()
}

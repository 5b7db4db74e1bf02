use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::sheet::Conversation;
use crate::threads::{Thread, NEW_CHAT_THREAD_ID};

/// Quiet period a gallery click must survive before it expands the image.
pub const GALLERY_CLICK_DEBOUNCE: Duration = Duration::from_millis(200);

/// Identifies one refresh cycle; results carrying an older token are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshToken(u64);

impl RefreshToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingClick {
    pub index: usize,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    EmptyNewChat,
    ViewingThread { frozen: bool },
    ImageExpanded { index: usize },
}

#[derive(Debug, Clone)]
pub struct ChatState {
    pub conversations: Vec<Conversation>,
    pub threads: Vec<Thread>,
    pub selected_thread_id: String,
    pub input: String,
    pub pending_images: Vec<String>,
    pub is_generating: bool,
    pub is_loading: bool,
    pub selected_image_index: Option<usize>,
    image_load_errors: BTreeSet<String>,
    pub(crate) pending_click: Option<PendingClick>,
    refresh_generation: u64,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatState {
    /// State before the first sheet fetch has completed.
    pub fn new() -> Self {
        Self {
            conversations: Vec::new(),
            threads: Vec::new(),
            selected_thread_id: NEW_CHAT_THREAD_ID.to_string(),
            input: String::new(),
            pending_images: Vec::new(),
            is_generating: false,
            is_loading: true,
            selected_image_index: None,
            image_load_errors: BTreeSet::new(),
            pending_click: None,
            refresh_generation: 0,
        }
    }

    pub fn thread(&self, thread_id: &str) -> Option<&Thread> {
        self.threads.iter().find(|thread| thread.id == thread_id)
    }

    pub(crate) fn thread_mut(&mut self, thread_id: &str) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|thread| thread.id == thread_id)
    }

    pub fn current_thread(&self) -> Option<&Thread> {
        self.thread(&self.selected_thread_id)
    }

    pub fn has_pending_input(&self) -> bool {
        !self.input.trim().is_empty() || !self.pending_images.is_empty()
    }

    /// Whether a send would be accepted right now.
    pub fn can_send(&self) -> bool {
        self.has_pending_input()
            && !self.is_generating
            && self
                .current_thread()
                .map(|thread| !thread.is_frozen)
                .unwrap_or(false)
    }

    pub fn image_load_failed(&self, thread_id: &str, index: usize) -> bool {
        self.image_load_errors
            .contains(&image_error_key(thread_id, index))
    }

    pub(crate) fn set_image_load_failed(&mut self, thread_id: &str, index: usize, failed: bool) {
        let key = image_error_key(thread_id, index);
        if failed {
            self.image_load_errors.insert(key);
        } else {
            self.image_load_errors.remove(&key);
        }
    }

    pub fn is_current(&self, token: RefreshToken) -> bool {
        token.0 == self.refresh_generation
    }

    pub(crate) fn next_refresh_token(&mut self) -> RefreshToken {
        self.refresh_generation += 1;
        RefreshToken(self.refresh_generation)
    }

    pub fn expanded_image(&self) -> Option<(usize, &str)> {
        let index = self.selected_image_index?;
        let url = self.current_thread()?.gallery_images.get(index)?;
        Some((index, url.as_str()))
    }

    pub fn view(&self) -> ViewState {
        if self.is_loading {
            return ViewState::Loading;
        }
        if let Some((index, _)) = self.expanded_image() {
            return ViewState::ImageExpanded { index };
        }
        match self.current_thread() {
            Some(thread) if thread.is_frozen || !thread.messages.is_empty() => {
                ViewState::ViewingThread {
                    frozen: thread.is_frozen,
                }
            }
            _ => ViewState::EmptyNewChat,
        }
    }
}

pub fn image_error_key(thread_id: &str, index: usize) -> String {
    format!("{thread_id}-{index}")
}

use std::time::Instant;

use chrono::{DateTime, Utc};

use super::state::{ChatState, PendingClick, RefreshToken, GALLERY_CLICK_DEBOUNCE};
use crate::sheet::Conversation;
use crate::threads::{Message, Thread, NEW_CHAT_THREAD_ID};

pub const SEND_FAILED_ALERT: &str = "Failed to generate ad. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RefreshRequested,
    SheetLoaded {
        token: RefreshToken,
        conversations: Vec<Conversation>,
    },
    SheetFailed {
        token: RefreshToken,
    },
    ThreadsBuilt {
        token: RefreshToken,
        threads: Vec<Thread>,
    },
    SelectThread {
        thread_id: String,
    },
    NewChat {
        thread_id: String,
        now: DateTime<Utc>,
    },
    InputChanged {
        text: String,
    },
    EnterPressed {
        shift: bool,
    },
    ImageAttached {
        data_uri: String,
    },
    ImageRemoved {
        index: usize,
    },
    SendRequested {
        message_id: String,
        now: DateTime<Utc>,
    },
    SubmitAccepted {
        prompt: String,
    },
    SubmitFailed,
    SendSettled {
        prompt: String,
    },
    SelectByPrompt {
        prompt: String,
    },
    GalleryClicked {
        index: usize,
        at: Instant,
    },
    Tick {
        now: Instant,
    },
    ImageViewClosed,
    ImageLoadFailed {
        thread_id: String,
        index: usize,
    },
    ImageRetry {
        thread_id: String,
        index: usize,
    },
}

/// A new user message on its way to the ad webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub thread_id: String,
    pub message_id: String,
    pub text: String,
    pub uploaded_images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchSheet {
        token: RefreshToken,
    },
    BuildThreads {
        token: RefreshToken,
        conversations: Vec<Conversation>,
    },
    RequestSend,
    SubmitMessage(OutgoingMessage),
    RefreshAfterSubmit {
        prompt: String,
    },
    SelectPromptLater {
        prompt: String,
    },
    Alert(String),
}

pub fn reduce(state: &mut ChatState, action: Action) -> Vec<Effect> {
    match action {
        Action::RefreshRequested => {
            let token = state.next_refresh_token();
            state.is_loading = true;
            vec![Effect::FetchSheet { token }]
        }
        Action::SheetLoaded {
            token,
            conversations,
        } => {
            if !state.is_current(token) {
                return Vec::new();
            }
            state.conversations = conversations.clone();
            state.is_loading = false;
            vec![Effect::BuildThreads {
                token,
                conversations,
            }]
        }
        Action::SheetFailed { token } => {
            if !state.is_current(token) {
                return Vec::new();
            }
            state.conversations.clear();
            state.is_loading = false;
            vec![Effect::BuildThreads {
                token,
                conversations: Vec::new(),
            }]
        }
        Action::ThreadsBuilt { token, threads } => {
            if !state.is_current(token) {
                return Vec::new();
            }
            state.threads = threads;
            if state.current_thread().is_none() {
                state.selected_thread_id = NEW_CHAT_THREAD_ID.to_string();
                state.selected_image_index = None;
            }
            Vec::new()
        }
        Action::SelectThread { thread_id } => {
            select_thread(state, &thread_id);
            Vec::new()
        }
        Action::NewChat { thread_id, now } => {
            state.threads.retain(|thread| !thread.is_empty_new_chat());
            state.threads.insert(0, Thread::new_chat(thread_id.clone(), now));
            state.selected_thread_id = thread_id;
            state.selected_image_index = None;
            state.pending_click = None;
            Vec::new()
        }
        Action::InputChanged { text } => {
            state.input = text;
            Vec::new()
        }
        Action::EnterPressed { shift: true } => {
            state.input.push('\n');
            Vec::new()
        }
        Action::EnterPressed { shift: false } => {
            if state.can_send() {
                vec![Effect::RequestSend]
            } else {
                Vec::new()
            }
        }
        Action::ImageAttached { data_uri } => {
            if data_uri.starts_with("data:image/") {
                state.pending_images.push(data_uri);
            }
            Vec::new()
        }
        Action::ImageRemoved { index } => {
            if index < state.pending_images.len() {
                state.pending_images.remove(index);
            }
            Vec::new()
        }
        Action::SendRequested { message_id, now } => {
            if !state.can_send() {
                return Vec::new();
            }
            let thread_id = state.selected_thread_id.clone();
            let text = std::mem::take(&mut state.input);
            let uploaded_images = std::mem::take(&mut state.pending_images);
            let Some(thread) = state.thread_mut(&thread_id) else {
                return Vec::new();
            };
            thread.push_message(Message {
                id: message_id.clone(),
                text: text.clone(),
                is_user: true,
                uploaded_images: uploaded_images.clone(),
                timestamp: now,
            });
            state.is_generating = true;
            vec![Effect::SubmitMessage(OutgoingMessage {
                thread_id,
                message_id,
                text,
                uploaded_images,
            })]
        }
        Action::SubmitAccepted { prompt } => vec![Effect::RefreshAfterSubmit { prompt }],
        Action::SubmitFailed => {
            state.is_generating = false;
            vec![Effect::Alert(SEND_FAILED_ALERT.to_string())]
        }
        Action::SendSettled { prompt } => {
            state.is_generating = false;
            state.selected_image_index = None;
            vec![Effect::SelectPromptLater { prompt }]
        }
        Action::SelectByPrompt { prompt } => {
            let wanted = prompt.trim();
            if let Some(index) = state
                .conversations
                .iter()
                .position(|conversation| conversation.prompt.trim() == wanted)
            {
                select_thread(state, &crate::threads::sheet_thread_id(index));
            }
            Vec::new()
        }
        Action::GalleryClicked { index, at } => {
            state.pending_click = Some(PendingClick { index, at });
            Vec::new()
        }
        Action::Tick { now } => {
            if let Some(click) = state.pending_click {
                if now.saturating_duration_since(click.at) >= GALLERY_CLICK_DEBOUNCE {
                    state.pending_click = None;
                    let in_range = state
                        .current_thread()
                        .map(|thread| click.index < thread.gallery_images.len())
                        .unwrap_or(false);
                    if in_range {
                        state.selected_image_index = Some(click.index);
                    }
                }
            }
            Vec::new()
        }
        Action::ImageViewClosed => {
            state.selected_image_index = None;
            Vec::new()
        }
        Action::ImageLoadFailed { thread_id, index } => {
            state.set_image_load_failed(&thread_id, index, true);
            Vec::new()
        }
        Action::ImageRetry { thread_id, index } => {
            state.set_image_load_failed(&thread_id, index, false);
            Vec::new()
        }
    }
}

fn select_thread(state: &mut ChatState, thread_id: &str) {
    if state.thread(thread_id).is_none() {
        return;
    }
    state.selected_thread_id = thread_id.to_string();
    state.selected_image_index = None;
    state.pending_click = None;
}

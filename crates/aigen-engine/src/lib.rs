//! Network side of the AIGen ad chat client.
//!
//! [`ChatEngine`] owns the chat state store and runs the effects its reducer
//! asks for: reading the sheet feed, resolving gallery images, submitting
//! messages to the ad webhook and the post-submit refresh.

pub mod attachments;
pub mod config;
pub mod providers;
pub mod resolver;

use std::path::Path;
use std::thread;
use std::time::Instant;

use aigen_contracts::events::{ChatEvent, EventWriter};
use aigen_contracts::sheet::conversations_from_csv;
use aigen_contracts::store::{reduce, Action, ChatState, Effect, RefreshToken};
use aigen_contracts::threads::{build_threads, new_chat_thread_id};
use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use crate::attachments::{image_data_uri_from_bytes, image_data_uri_from_path, WebhookPayload};
use crate::config::EngineConfig;
use crate::providers::Collaborators;
use crate::resolver::resolve_galleries;

pub use aigen_contracts::store::GALLERY_CLICK_DEBOUNCE;

pub struct ChatEngine {
    config: EngineConfig,
    collaborators: Collaborators,
    events: EventWriter,
    state: ChatState,
    alerts: Vec<String>,
}

impl ChatEngine {
    pub fn new(
        config: EngineConfig,
        collaborators: Collaborators,
        events: EventWriter,
    ) -> Result<Self> {
        events.emit(&ChatEvent::SessionStarted {
            sheet_url: config.sheet_csv_url.clone(),
            status_api_url: config.status_api_url.clone(),
            status_token_set: config.status_token.is_some(),
            webhook_url: config.webhook_url.clone(),
        })?;
        Ok(Self {
            config,
            collaborators,
            events,
            state: ChatState::new(),
            alerts: Vec::new(),
        })
    }

    /// Engine wired to the real HTTP services.
    pub fn with_http(config: EngineConfig, events: EventWriter) -> Result<Self> {
        let collaborators = Collaborators::http(&config)?;
        Self::new(config, collaborators, events)
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn event_writer(&self) -> EventWriter {
        self.events.clone()
    }

    /// User-facing alerts raised since the last call.
    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }

    /// Applies an action and runs every effect it produces, depth first, so
    /// a post-submit refresh has finished before the send settles.
    pub fn dispatch(&mut self, action: Action) {
        for effect in reduce(&mut self.state, action) {
            self.run_effect(effect);
        }
    }

    /// Full fetch → normalize → resolve → rebuild cycle.
    pub fn refresh(&mut self) {
        self.dispatch(Action::RefreshRequested);
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.dispatch(Action::InputChanged { text: text.into() });
    }

    pub fn press_enter(&mut self, shift: bool) {
        self.dispatch(Action::EnterPressed { shift });
    }

    /// Sends the pending input; returns false when the send was not allowed.
    pub fn send(&mut self) -> bool {
        if !self.state.can_send() {
            return false;
        }
        self.dispatch(send_requested());
        true
    }

    pub fn new_chat(&mut self) -> String {
        let thread_id = new_chat_thread_id();
        self.dispatch(Action::NewChat {
            thread_id: thread_id.clone(),
            now: Utc::now(),
        });
        thread_id
    }

    pub fn select_thread(&mut self, thread_id: &str) -> bool {
        self.dispatch(Action::SelectThread {
            thread_id: thread_id.to_string(),
        });
        self.state.selected_thread_id == thread_id
    }

    pub fn attach_image_path(&mut self, path: &Path) -> Result<()> {
        let data_uri = image_data_uri_from_path(path)?;
        self.dispatch(Action::ImageAttached { data_uri });
        Ok(())
    }

    pub fn attach_image_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let data_uri = image_data_uri_from_bytes(bytes)?;
        self.dispatch(Action::ImageAttached { data_uri });
        Ok(())
    }

    pub fn remove_image(&mut self, index: usize) {
        self.dispatch(Action::ImageRemoved { index });
    }

    pub fn click_gallery(&mut self, index: usize) {
        self.dispatch(Action::GalleryClicked {
            index,
            at: Instant::now(),
        });
    }

    /// Commits a debounced gallery click once its quiet period has passed.
    pub fn tick(&mut self) {
        self.dispatch(Action::Tick {
            now: Instant::now(),
        });
    }

    pub fn close_image(&mut self) {
        self.dispatch(Action::ImageViewClosed);
    }

    /// Loads the expanded image; a failure flips its placeholder flag.
    /// Returns whether an image is expanded and loaded.
    pub fn probe_expanded_image(&mut self) -> bool {
        let Some((index, url)) = self
            .state
            .expanded_image()
            .map(|(index, url)| (index, url.to_string()))
        else {
            return false;
        };
        let thread_id = self.state.selected_thread_id.clone();
        match self.collaborators.probe.probe(&url) {
            Ok(()) => true,
            Err(err) => {
                self.events.record(&ChatEvent::ImageLoadFailed {
                    thread_id: thread_id.clone(),
                    index,
                    url,
                    error: format!("{err:#}"),
                });
                self.dispatch(Action::ImageLoadFailed { thread_id, index });
                false
            }
        }
    }

    pub fn retry_image(&mut self, index: usize) {
        let thread_id = self.state.selected_thread_id.clone();
        self.dispatch(Action::ImageRetry { thread_id, index });
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::FetchSheet { token } => self.fetch_sheet(token),
            Effect::BuildThreads {
                token,
                conversations,
            } => {
                let galleries = resolve_galleries(
                    self.collaborators.status.as_ref(),
                    &conversations,
                    &self.events,
                );
                let threads = build_threads(&conversations, &galleries, Utc::now());
                self.events.record(&ChatEvent::ThreadsBuilt {
                    generation: token.generation(),
                    threads: threads.len(),
                    images: galleries.iter().map(Vec::len).sum(),
                });
                self.dispatch_refresh_result(token, Action::ThreadsBuilt { token, threads });
            }
            Effect::RequestSend => self.dispatch(send_requested()),
            Effect::SubmitMessage(message) => {
                let submitted = WebhookPayload::from_message(&message)
                    .and_then(|payload| self.collaborators.webhook.submit(&payload));
                match submitted {
                    Ok(()) => {
                        self.events.record(&ChatEvent::MessageSubmitted {
                            thread_id: message.thread_id,
                            message_id: message.message_id,
                            images: message.uploaded_images.len(),
                        });
                        self.dispatch(Action::SubmitAccepted {
                            prompt: message.text,
                        });
                    }
                    Err(err) => {
                        self.events.record(&ChatEvent::WebhookFailed {
                            thread_id: message.thread_id,
                            message_id: message.message_id,
                            error: format!("{err:#}"),
                        });
                        self.dispatch(Action::SubmitFailed);
                    }
                }
            }
            Effect::RefreshAfterSubmit { prompt } => {
                thread::sleep(self.config.submit_grace);
                self.refresh();
                self.dispatch(Action::SendSettled { prompt });
            }
            Effect::SelectPromptLater { prompt } => {
                thread::sleep(self.config.select_delay);
                let before = self.state.selected_thread_id.clone();
                self.dispatch(Action::SelectByPrompt { prompt });
                if self.state.selected_thread_id != before {
                    self.events.record(&ChatEvent::ThreadAutoSelected {
                        thread_id: self.state.selected_thread_id.clone(),
                    });
                }
            }
            Effect::Alert(text) => self.alerts.push(text),
        }
    }

    fn fetch_sheet(&mut self, token: RefreshToken) {
        self.events.record(&ChatEvent::SheetFetchStarted {
            generation: token.generation(),
        });
        let action = match self.collaborators.sheet.fetch_csv() {
            Ok(text) => {
                let conversations = conversations_from_csv(&text);
                self.events.record(&ChatEvent::SheetLoaded {
                    generation: token.generation(),
                    conversations: conversations.len(),
                });
                Action::SheetLoaded {
                    token,
                    conversations,
                }
            }
            Err(err) => {
                self.events.record(&ChatEvent::SheetFetchFailed {
                    generation: token.generation(),
                    error: format!("{err:#}"),
                });
                Action::SheetFailed { token }
            }
        };
        self.dispatch_refresh_result(token, action);
    }

    fn dispatch_refresh_result(&mut self, token: RefreshToken, action: Action) {
        if !self.state.is_current(token) {
            self.events.record(&ChatEvent::RefreshDiscarded {
                generation: token.generation(),
            });
        }
        self.dispatch(action);
    }
}

fn send_requested() -> Action {
    Action::SendRequested {
        message_id: Uuid::new_v4().to_string(),
        now: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use aigen_contracts::events::EventWriter;
    use aigen_contracts::store::{ViewState, SEND_FAILED_ALERT};
    use aigen_contracts::threads::NEW_CHAT_THREAD_ID;
    use anyhow::{anyhow, bail, Result};
    use serde_json::{json, Value};

    use super::ChatEngine;
    use crate::attachments::{encode_data_uri, WebhookPayload};
    use crate::config::EngineConfig;
    use crate::providers::{AdWebhook, Collaborators, ImageProbe, ImageStatusSource, SheetSource};

    const HEADER: &str = "Prompt,Output Shot List,Image Task IDs";

    /// Serves queued CSV bodies in order, repeating the last one.
    struct QueuedSheet {
        bodies: Mutex<VecDeque<Option<String>>>,
        fetches: Arc<Mutex<usize>>,
    }

    impl SheetSource for QueuedSheet {
        fn fetch_csv(&self) -> Result<String> {
            *self.fetches.lock().map_err(|_| anyhow!("poisoned"))? += 1;
            let mut bodies = self.bodies.lock().map_err(|_| anyhow!("poisoned"))?;
            let next = if bodies.len() > 1 {
                bodies.pop_front().flatten()
            } else {
                bodies.front().cloned().flatten()
            };
            next.ok_or_else(|| anyhow!("sheet request failed (503)"))
        }
    }

    struct MapStatus(HashMap<String, Value>);

    impl ImageStatusSource for MapStatus {
        fn lookup(&self, task_id: &str) -> Result<Value> {
            match self.0.get(task_id) {
                Some(body) => Ok(body.clone()),
                None => bail!("unknown task {task_id}"),
            }
        }
    }

    struct BrokenUrls(Vec<String>);

    impl ImageProbe for BrokenUrls {
        fn probe(&self, url: &str) -> Result<()> {
            if self.0.iter().any(|broken| broken == url) {
                bail!("404 for {url}");
            }
            Ok(())
        }
    }

    struct RecordingWebhook {
        payloads: Arc<Mutex<Vec<WebhookPayload>>>,
        fail: bool,
    }

    impl AdWebhook for RecordingWebhook {
        fn submit(&self, payload: &WebhookPayload) -> Result<()> {
            if self.fail {
                bail!("ad webhook request failed (502)");
            }
            self.payloads
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .push(payload.clone());
            Ok(())
        }
    }

    struct Harness {
        engine: ChatEngine,
        payloads: Arc<Mutex<Vec<WebhookPayload>>>,
        fetches: Arc<Mutex<usize>>,
        _temp: tempfile::TempDir,
    }

    fn csv(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    fn harness(sheets: Vec<Option<String>>, webhook_fails: bool) -> Result<Harness> {
        let temp = tempfile::tempdir()?;
        let events = EventWriter::new(temp.path().join("events.jsonl"), "test-session");
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let fetches = Arc::new(Mutex::new(0));
        let status = MapStatus(HashMap::from([
            (
                "t1".to_string(),
                json!({"data": {"response": {"resultUrls": ["https://cdn.example/1.png"]}}}),
            ),
            (
                "t2".to_string(),
                json!({"resultUrls": ["https://cdn.example/2.png", "https://cdn.example/3.png"]}),
            ),
        ]));
        let collaborators = Collaborators {
            sheet: Box::new(QueuedSheet {
                bodies: Mutex::new(sheets.into_iter().collect()),
                fetches: fetches.clone(),
            }),
            status: Box::new(status),
            probe: Box::new(BrokenUrls(vec!["https://cdn.example/3.png".to_string()])),
            webhook: Box::new(RecordingWebhook {
                payloads: payloads.clone(),
                fail: webhook_fails,
            }),
        };
        let config = EngineConfig {
            submit_grace: Duration::ZERO,
            select_delay: Duration::ZERO,
            ..EngineConfig::default()
        };
        Ok(Harness {
            engine: ChatEngine::new(config, collaborators, events)?,
            payloads,
            fetches,
            _temp: temp,
        })
    }

    fn fetch_count(harness: &Harness) -> usize {
        harness.fetches.lock().map(|count| *count).unwrap_or(0)
    }

    #[test]
    fn refresh_builds_threads_with_resolved_galleries() -> Result<()> {
        let sheet = csv(&[
            "Smart panel,\"[{\"\"shot_number\"\": 1}]\",\"t1,missing,t2\"",
            "short,row",
            "Hallway switch,plain text shot,",
        ]);
        let mut h = harness(vec![Some(sheet)], false)?;
        h.engine.refresh();

        let state = h.engine.state();
        assert!(!state.is_loading);
        let ids: Vec<&str> = state.threads.iter().map(|thread| thread.id.as_str()).collect();
        assert_eq!(ids, vec![NEW_CHAT_THREAD_ID, "sheet-1", "sheet-2"]);
        assert_eq!(
            state.threads[1].gallery_images,
            vec![
                "https://cdn.example/1.png",
                "https://cdn.example/2.png",
                "https://cdn.example/3.png"
            ]
        );
        assert_eq!(state.threads[1].gallery_task_ids, vec!["t1", "missing", "t2"]);
        assert!(state.threads[2].gallery_images.is_empty());
        assert_eq!(state.threads[2].shots.len(), 1);
        assert_eq!(state.threads[2].shots[0].description, "plain text shot");
        assert_eq!(state.view(), ViewState::EmptyNewChat);
        Ok(())
    }

    #[test]
    fn failed_sheet_fetch_leaves_only_new_chat() -> Result<()> {
        let mut h = harness(vec![None], false)?;
        h.engine.refresh();

        let state = h.engine.state();
        assert!(!state.is_loading);
        assert!(state.conversations.is_empty());
        assert_eq!(state.threads.len(), 1);
        assert!(h.engine.take_alerts().is_empty());

        let log = std::fs::read_to_string(h.engine.event_writer().path())?;
        assert!(log.contains("sheet_fetch_failed"));
        Ok(())
    }

    #[test]
    fn send_submits_refreshes_and_selects_new_thread() -> Result<()> {
        let before = csv(&["Old prompt,,t1"]);
        let after = csv(&["Old prompt,,t1", "Brand new ad,,t2"]);
        let mut h = harness(vec![Some(before), Some(after)], false)?;
        h.engine.refresh();

        h.engine.set_input("  Brand new ad  ");
        assert!(h.engine.send());

        let payloads = h.payloads.lock().map_err(|_| anyhow!("poisoned"))?.clone();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].text, "  Brand new ad  ");
        assert_eq!(payloads[0].image, None);

        let state = h.engine.state();
        assert_eq!(fetch_count(&h), 2);
        assert!(!state.is_generating);
        assert_eq!(state.selected_thread_id, "sheet-2");
        assert_eq!(
            state.current_thread().map(|thread| thread.gallery_images.len()),
            Some(2)
        );
        assert!(h.engine.take_alerts().is_empty());
        Ok(())
    }

    #[test]
    fn send_with_image_uploads_first_attachment() -> Result<()> {
        let mut h = harness(vec![Some(csv(&[]))], false)?;
        h.engine.refresh();
        h.engine
            .dispatch(aigen_contracts::store::Action::ImageAttached {
                data_uri: encode_data_uri("image/png", b"png-bytes"),
            });
        assert!(h.engine.send());

        let payloads = h.payloads.lock().map_err(|_| anyhow!("poisoned"))?.clone();
        let image = payloads[0].image.clone().ok_or_else(|| anyhow!("no image"))?;
        assert_eq!(image.bytes, b"png-bytes".to_vec());
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(payloads[0].text, "");
        Ok(())
    }

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn pasted_png_bytes_reach_the_webhook() -> Result<()> {
        let mut h = harness(vec![Some(csv(&[]))], false)?;
        h.engine.refresh();
        h.engine.attach_image_bytes(PNG_BYTES)?;
        assert_eq!(h.engine.state().pending_images.len(), 1);
        h.engine.set_input("Use this panel photo");
        assert!(h.engine.send());

        let payloads = h.payloads.lock().map_err(|_| anyhow!("poisoned"))?.clone();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].text, "Use this panel photo");
        let image = payloads[0].image.clone().ok_or_else(|| anyhow!("no image"))?;
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, PNG_BYTES.to_vec());
        assert!(h.engine.state().pending_images.is_empty());
        Ok(())
    }

    #[test]
    fn pasted_non_image_bytes_are_rejected() -> Result<()> {
        let mut h = harness(vec![Some(csv(&[]))], false)?;
        h.engine.refresh();
        assert!(h.engine.attach_image_bytes(b"just some text").is_err());
        assert!(h.engine.state().pending_images.is_empty());
        assert!(!h.engine.send());
        Ok(())
    }

    #[test]
    fn webhook_failure_alerts_without_rollback_or_refresh() -> Result<()> {
        let mut h = harness(vec![Some(csv(&["Old prompt,,"]))], true)?;
        h.engine.refresh();
        h.engine.set_input("Will fail");
        assert!(h.engine.send());

        assert_eq!(h.engine.take_alerts(), vec![SEND_FAILED_ALERT.to_string()]);
        let state = h.engine.state();
        assert!(!state.is_generating);
        assert_eq!(fetch_count(&h), 1);
        let thread = state.current_thread().ok_or_else(|| anyhow!("no thread"))?;
        assert_eq!(thread.messages.len(), 1);
        assert_eq!(thread.messages[0].text, "Will fail");

        let log = std::fs::read_to_string(h.engine.event_writer().path())?;
        assert!(log.contains("webhook_failed"));
        Ok(())
    }

    #[test]
    fn frozen_thread_rejects_send() -> Result<()> {
        let mut h = harness(vec![Some(csv(&["Old prompt,,"]))], false)?;
        h.engine.refresh();
        assert!(h.engine.select_thread("sheet-1"));
        h.engine.set_input("more please");

        assert!(!h.engine.send());
        h.engine.press_enter(false);
        assert!(h.payloads.lock().map_err(|_| anyhow!("poisoned"))?.is_empty());
        assert_eq!(
            h.engine.state().current_thread().map(|thread| thread.messages.len()),
            Some(1)
        );
        Ok(())
    }

    #[test]
    fn enter_key_sends_from_new_chat() -> Result<()> {
        let mut h = harness(vec![Some(csv(&[]))], false)?;
        h.engine.refresh();
        let thread_id = h.engine.new_chat();
        assert_eq!(h.engine.state().selected_thread_id, thread_id);

        h.engine.set_input("first line");
        h.engine.press_enter(true);
        assert_eq!(h.engine.state().input, "first line\n");
        h.engine.set_input("first line\nsecond line");
        h.engine.press_enter(false);

        let payloads = h.payloads.lock().map_err(|_| anyhow!("poisoned"))?.clone();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].text, "first line\nsecond line");
        Ok(())
    }

    #[test]
    fn broken_gallery_image_is_flagged_and_retryable() -> Result<()> {
        let mut h = harness(vec![Some(csv(&["Panel,,t2"]))], false)?;
        h.engine.refresh();
        assert!(h.engine.select_thread("sheet-1"));

        h.engine.click_gallery(0);
        std::thread::sleep(super::GALLERY_CLICK_DEBOUNCE + Duration::from_millis(20));
        h.engine.tick();
        assert!(h.engine.probe_expanded_image());

        h.engine.click_gallery(1);
        std::thread::sleep(super::GALLERY_CLICK_DEBOUNCE + Duration::from_millis(20));
        h.engine.tick();
        assert_eq!(h.engine.state().view(), ViewState::ImageExpanded { index: 1 });
        assert!(!h.engine.probe_expanded_image());
        assert!(h.engine.state().image_load_failed("sheet-1", 1));

        h.engine.retry_image(1);
        assert!(!h.engine.state().image_load_failed("sheet-1", 1));
        h.engine.close_image();
        assert_eq!(
            h.engine.state().view(),
            ViewState::ViewingThread { frozen: true }
        );
        Ok(())
    }
}

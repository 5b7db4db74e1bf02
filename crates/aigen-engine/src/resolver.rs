use std::thread;

use aigen_contracts::events::{ChatEvent, EventWriter};
use aigen_contracts::images::result_urls;
use aigen_contracts::sheet::Conversation;

use crate::providers::{truncate_text, ImageStatusSource};

/// Upper bound on status lookups in flight for one gallery.
pub const MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Looks up task ids concurrently, at most [`MAX_CONCURRENT_LOOKUPS`] at a
/// time, and flattens the result URLs in task-id order. A failed lookup
/// contributes no images and never aborts its siblings.
pub fn resolve_gallery(
    source: &dyn ImageStatusSource,
    task_ids: &[String],
    events: &EventWriter,
) -> Vec<String> {
    let task_ids: Vec<&str> = task_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect();
    task_ids
        .chunks(MAX_CONCURRENT_LOOKUPS)
        .flat_map(|batch| lookup_batch(source, batch, events))
        .collect()
}

/// Galleries for each conversation, index-aligned with `conversations`.
pub fn resolve_galleries(
    source: &dyn ImageStatusSource,
    conversations: &[Conversation],
    events: &EventWriter,
) -> Vec<Vec<String>> {
    conversations
        .iter()
        .map(|conversation| resolve_gallery(source, &conversation.task_ids, events))
        .collect()
}

fn lookup_batch(source: &dyn ImageStatusSource, batch: &[&str], events: &EventWriter) -> Vec<String> {
    thread::scope(|scope| {
        let handles: Vec<_> = batch
            .iter()
            .map(|task_id| scope.spawn(move || lookup_urls(source, task_id, events)))
            .collect();
        handles
            .into_iter()
            .zip(batch)
            .flat_map(|(handle, task_id)| {
                handle.join().unwrap_or_else(|_| {
                    events.record(&ChatEvent::ImageLookupFailed {
                        task_id: task_id.to_string(),
                        error: "lookup thread panicked".to_string(),
                    });
                    Vec::new()
                })
            })
            .collect()
    })
}

fn lookup_urls(source: &dyn ImageStatusSource, task_id: &str, events: &EventWriter) -> Vec<String> {
    let body = match source.lookup(task_id) {
        Ok(body) => body,
        Err(err) => {
            events.record(&ChatEvent::ImageLookupFailed {
                task_id: task_id.to_string(),
                error: format!("{err:#}"),
            });
            return Vec::new();
        }
    };
    match result_urls(&body) {
        Ok(urls) => urls,
        Err(err) => {
            events.record(&ChatEvent::ImageStatusUnrecognized {
                task_id: task_id.to_string(),
                error: err.to_string(),
                body: truncate_text(&body.to_string(), 512),
            });
            Vec::new()
        }
    }
}

use chrono::{DateTime, Duration, Utc};

use super::model::{sheet_thread_id, truncate_title, Message, Thread, NEW_CHAT_THREAD_ID};
use crate::sheet::Conversation;

/// Builds the display thread list from conversations and their resolved
/// galleries (`galleries[i]` belongs to `conversations[i]`; missing entries
/// mean no images).
///
/// The always-present new-chat slot comes first, followed by one frozen
/// thread per conversation, back-dated a minute apart so sheet order is
/// creation order.
pub fn build_threads(
    conversations: &[Conversation],
    galleries: &[Vec<String>],
    now: DateTime<Utc>,
) -> Vec<Thread> {
    let total = conversations.len() as i64;
    let mut threads = Vec::with_capacity(conversations.len() + 1);
    threads.push(Thread::new_chat(NEW_CHAT_THREAD_ID, now));
    for (index, conversation) in conversations.iter().enumerate() {
        let id = sheet_thread_id(index);
        let created_at = now - Duration::minutes(total - index as i64);
        let seed = Message {
            id: format!("{id}-user"),
            text: conversation.prompt.clone(),
            is_user: true,
            uploaded_images: Vec::new(),
            timestamp: created_at,
        };
        threads.push(Thread {
            id,
            title: truncate_title(&conversation.prompt),
            messages: vec![seed],
            created_at,
            is_frozen: true,
            gallery_images: galleries.get(index).cloned().unwrap_or_default(),
            gallery_prompt: conversation.prompt.clone(),
            gallery_task_ids: conversation.task_ids.clone(),
            shots: conversation.shots.clone(),
        });
    }
    threads
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};

    use super::build_threads;
    use crate::sheet::{Conversation, Shot};
    use crate::threads::NEW_CHAT_THREAD_ID;

    fn conversation(prompt: &str, task_ids: &[&str]) -> Conversation {
        Conversation {
            prompt: prompt.to_string(),
            shots: vec![Shot::free_text(1, "shot")],
            task_ids: task_ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    #[test]
    fn ids_are_new_chat_plus_one_per_conversation() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let conversations = vec![conversation("a", &[]), conversation("b", &[]), conversation("c", &[])];
        let threads = build_threads(&conversations, &[], now);

        assert_eq!(threads[0].id, NEW_CHAT_THREAD_ID);
        assert!(!threads[0].is_frozen);
        assert!(threads[0].messages.is_empty());
        let ids: BTreeSet<&str> = threads.iter().map(|thread| thread.id.as_str()).collect();
        assert_eq!(
            ids,
            BTreeSet::from([NEW_CHAT_THREAD_ID, "sheet-1", "sheet-2", "sheet-3"])
        );
    }

    #[test]
    fn sheet_threads_are_frozen_and_back_dated_in_order() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let conversations = vec![conversation("first", &["t1"]), conversation("second", &[])];
        let galleries = vec![vec!["u1".to_string()]];
        let threads = build_threads(&conversations, &galleries, now);

        let first = &threads[1];
        let second = &threads[2];
        assert!(first.is_frozen && second.is_frozen);
        assert!(first.created_at < second.created_at);
        assert!(second.created_at < now);
        assert_eq!(first.messages.len(), 1);
        assert_eq!(first.messages[0].id, "sheet-1-user");
        assert_eq!(first.messages[0].text, "first");
        assert!(first.messages[0].is_user);
        assert_eq!(first.gallery_images, vec!["u1"]);
        assert_eq!(first.gallery_task_ids, vec!["t1"]);
        assert_eq!(first.gallery_prompt, "first");
        assert!(second.gallery_images.is_empty());
    }

    #[test]
    fn titles_are_truncated_to_eighty_chars() {
        let now = Utc::now();
        let long = "é".repeat(120);
        let threads = build_threads(&[conversation(&long, &[])], &[], now);
        assert_eq!(threads[1].title.chars().count(), 80);
        assert_eq!(threads[1].messages[0].text, long);
    }

    #[test]
    fn empty_sheet_still_yields_new_chat_slot() {
        let threads = build_threads(&[], &[], Utc::now());
        assert_eq!(threads.len(), 1);
        assert!(threads[0].is_empty_new_chat());
    }
}

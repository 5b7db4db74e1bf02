pub mod conversation;
pub mod csv;

pub use conversation::{
    decode_shots, decode_task_ids, normalize_rows, Conversation, SheetColumns, Shot,
};
pub use csv::parse_csv;

/// Parses published-sheet CSV text straight into conversations.
pub fn conversations_from_csv(text: &str) -> Vec<Conversation> {
    normalize_rows(&parse_csv(text))
}

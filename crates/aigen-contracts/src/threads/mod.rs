pub mod builder;
pub mod model;

pub use builder::build_threads;
pub use model::{
    is_sheet_thread_id, new_chat_thread_id, sheet_thread_id, truncate_title, Message, Thread,
    NEW_CHAT_THREAD_ID, NEW_CHAT_TITLE, TITLE_MAX_CHARS,
};

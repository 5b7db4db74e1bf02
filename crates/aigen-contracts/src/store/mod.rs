pub mod reducer;
pub mod state;

pub use reducer::{reduce, Action, Effect, OutgoingMessage, SEND_FAILED_ALERT};
pub use state::{image_error_key, ChatState, RefreshToken, ViewState, GALLERY_CLICK_DEBOUNCE};

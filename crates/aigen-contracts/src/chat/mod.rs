pub mod command_registry;
pub mod intent_parser;
pub mod placeholder;

pub use command_registry::CHAT_HELP_COMMANDS;
pub use intent_parser::{parse_intent, Intent};
pub use placeholder::{PlaceholderTicker, SAMPLE_PROMPTS};

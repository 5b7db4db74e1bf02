//! Data contracts for the AIGen ad chat client: the sheet feed parser, the
//! thread model, the image-status decoder and the chat state store.
//!
//! Nothing in this crate performs I/O except the event log.

pub mod chat;
pub mod events;
pub mod images;
pub mod sheet;
pub mod store;
pub mod threads;

//! Transient, per-user state of the chat dialogue.

mod store;

pub use store::{ConversationStore, DialogueState, InMemoryConversationStore, PendingEntry};

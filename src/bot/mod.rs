//! The Telegram bot: event parsing, dialogue handling and replies.

mod dispatcher;
mod event;
mod handlers;
mod messenger;
pub mod reply;
pub mod telegram;

pub use dispatcher::CommandDispatcher;
pub use event::{CategoryToken, ChatEvent, Command, Incoming, MenuButton, RESERVED_PREFIXES};
pub use handlers::{EntryInput, parse_entry_input};
pub use messenger::Messenger;
pub use reply::{CategoryButton, Markup, Reply};

//! The capability the bot needs from a chat platform.

use async_trait::async_trait;

use crate::{Error, bot::Reply, database_id::ChatId};

/// Sends replies to a chat and acknowledges button presses.
///
/// The Telegram client implements this in production; tests record replies
/// instead.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `reply` to the chat `chat_id`.
    ///
    /// # Errors
    /// Returns an [Error::MessagingError] if the platform rejects the message.
    async fn send_reply(&self, chat_id: ChatId, reply: Reply) -> Result<(), Error>;

    /// Tell the platform the inline button press `callback_id` was received.
    ///
    /// # Errors
    /// Returns an [Error::MessagingError] if the platform rejects the answer.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), Error>;
}

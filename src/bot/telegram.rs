//! The Telegram side of the bot: long polling, update conversion and replies.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{
        InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
        User,
    },
};

use crate::{
    Error,
    bot::{ChatEvent, CommandDispatcher, Incoming, Markup, MenuButton, Messenger, Reply},
    conversation::InMemoryConversationStore,
    database_id,
};

/// The dispatcher used in production.
pub type BotDispatcher = CommandDispatcher<InMemoryConversationStore>;

/// Sends replies through the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    /// Wrap a Telegram client.
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_reply(&self, chat_id: database_id::ChatId, reply: Reply) -> Result<(), Error> {
        let request = self.bot.send_message(ChatId(chat_id), reply.text);

        let result = match reply_markup(reply.markup) {
            Some(markup) => request.reply_markup(markup).await,
            None => request.await,
        };

        result.map(|_| ()).map_err(|error| {
            tracing::error!("could not send message to chat {chat_id}: {error}");
            Error::MessagingError(error.to_string())
        })
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), Error> {
        self.bot
            .answer_callback_query(callback_id.to_owned())
            .await
            .map(|_| ())
            .map_err(|error| Error::MessagingError(error.to_string()))
    }
}

fn reply_markup(markup: Markup) -> Option<ReplyMarkup> {
    match markup {
        Markup::None => None,
        Markup::MainMenu => Some(ReplyMarkup::Keyboard(main_menu_keyboard())),
        Markup::Categories(buttons) => {
            let rows = buttons.into_iter().map(|button| {
                vec![InlineKeyboardButton::callback(
                    button.label,
                    button.token.to_string(),
                )]
            });
            Some(ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(rows)))
        }
    }
}

fn main_menu_keyboard() -> KeyboardMarkup {
    let rows = MenuButton::ROWS.iter().map(|row| {
        row.iter()
            .map(|button| KeyboardButton::new(button.label()))
            .collect::<Vec<_>>()
    });

    KeyboardMarkup::new(rows).resize_keyboard()
}

fn user_id(user: &User) -> Option<database_id::UserId> {
    i64::try_from(user.id.0).ok()
}

/// Poll Telegram for updates until the process is interrupted.
pub async fn run(bot: Bot, dispatcher: Arc<BotDispatcher>) {
    tracing::info!("Starting Telegram long polling");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("Telegram long polling stopped");
}

async fn handle_message(
    bot: Bot,
    message: Message,
    dispatcher: Arc<BotDispatcher>,
) -> ResponseResult<()> {
    let Some(text) = message.text() else {
        tracing::debug!("Ignoring non-text message in chat {}", message.chat.id);
        return Ok(());
    };

    let Some(user_id) = message.from.as_ref().and_then(user_id) else {
        tracing::debug!("Ignoring message without a sender in chat {}", message.chat.id);
        return Ok(());
    };

    let incoming = Incoming {
        user_id,
        chat_id: message.chat.id.0,
        event: ChatEvent::from_text(text),
    };

    dispatcher
        .dispatch(incoming, &TelegramMessenger::new(bot))
        .await;

    Ok(())
}

async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    dispatcher: Arc<BotDispatcher>,
) -> ResponseResult<()> {
    let messenger = TelegramMessenger::new(bot);

    let (Some(data), Some(chat_id), Some(user_id)) = (
        query.data.as_deref(),
        query.message.as_ref().map(|message| message.chat().id.0),
        user_id(&query.from),
    ) else {
        tracing::debug!("Ignoring callback query {} without data or message", query.id);
        // Stops the client's loading indicator on the pressed button.
        if let Err(error) = messenger.answer_callback(&query.id).await {
            tracing::warn!("could not answer callback query {}: {error}", query.id);
        }
        return Ok(());
    };

    let incoming = Incoming {
        user_id,
        chat_id,
        event: ChatEvent::from_callback_data(data),
    };

    dispatcher
        .dispatch_callback(&query.id, incoming, &messenger)
        .await;

    Ok(())
}

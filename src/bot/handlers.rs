//! Handlers for each kind of [ChatEvent](crate::bot::ChatEvent).
//!
//! Handlers are plain functions over a [HandlerContext]. The database lock is
//! always released before a reply is sent.

use std::sync::Mutex;

use rusqlite::Connection;

use crate::{
    Error,
    bot::{
        CategoryToken, Messenger, Reply,
        reply::{self, format_categories, format_confirmation, format_statistics},
    },
    category::{CategoryKind, get_all_categories, get_categories_by_kind, get_category},
    conversation::{ConversationStore, DialogueState},
    database_id::{ChatId, UserId},
    transaction::{Transaction, create_transaction, get_user_summary},
};

/// Everything a handler needs to act on one incoming event.
pub struct HandlerContext<'a> {
    pub db_connection: &'a Mutex<Connection>,
    pub conversations: &'a dyn ConversationStore,
    pub messenger: &'a dyn Messenger,
    pub user_id: UserId,
    pub chat_id: ChatId,
}

impl HandlerContext<'_> {
    async fn reply(&self, reply: Reply) -> Result<(), Error> {
        self.messenger.send_reply(self.chat_id, reply).await
    }

    /// Run `query` with the database connection held only for its duration.
    fn with_connection<T>(
        &self,
        query: impl FnOnce(&Connection) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let connection = self.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })?;

        query(&connection)
    }
}

/// The amount and description parsed from a `"<amount> <description?>"` message.
#[derive(Debug, PartialEq)]
pub struct EntryInput<'a> {
    /// The first word as a number.
    pub amount: f64,
    /// The rest of the message, if any.
    pub description: Option<&'a str>,
}

/// Split `text` on the first run of whitespace into an amount and an optional
/// description.
///
/// A decimal comma is accepted in place of a decimal point.
///
/// # Errors
/// Returns [Error::InvalidAmount] if the first word is not a finite number.
pub fn parse_entry_input(text: &str) -> Result<EntryInput<'_>, Error> {
    let text = text.trim();
    let (raw_amount, description) = match text.split_once(char::is_whitespace) {
        Some((amount, description)) => (amount, Some(description.trim())),
        None => (text, None),
    };

    let amount: f64 = raw_amount
        .replace(',', ".")
        .parse()
        .map_err(|_| Error::InvalidAmount(raw_amount.to_owned()))?;

    if !amount.is_finite() {
        return Err(Error::InvalidAmount(raw_amount.to_owned()));
    }

    Ok(EntryInput {
        amount,
        description: description.filter(|description| !description.is_empty()),
    })
}

/// `/start`: greet the user and show the main menu.
pub async fn start(context: &HandlerContext<'_>) -> Result<(), Error> {
    context.reply(Reply::with_main_menu(reply::GREETING)).await
}

/// `/help`: list the commands.
pub async fn help(context: &HandlerContext<'_>) -> Result<(), Error> {
    context.reply(Reply::with_main_menu(reply::HELP)).await
}

/// `/categories`: list every category, expenses first.
pub async fn show_categories(context: &HandlerContext<'_>) -> Result<(), Error> {
    let categories = context.with_connection(get_all_categories)?;

    context
        .reply(Reply::with_main_menu(format_categories(&categories)))
        .await
}

/// `/statistics`: report the user's totals.
///
/// Query errors are reported to the user rather than returned.
pub async fn show_statistics(context: &HandlerContext<'_>) -> Result<(), Error> {
    let user_id = context.user_id;

    let text = match context.with_connection(|connection| get_user_summary(user_id, connection)) {
        Ok(summary) => format_statistics(&summary),
        Err(error) => {
            tracing::error!("could not get statistics for user {user_id}: {error}");
            format!("Ошибка при получении статистики: {error}")
        }
    };

    context.reply(Reply::with_main_menu(text)).await
}

/// The "add income/expense" menu buttons: show the categories of `kind`.
pub async fn choose_category(context: &HandlerContext<'_>, kind: CategoryKind) -> Result<(), Error> {
    let categories =
        context.with_connection(|connection| get_categories_by_kind(kind, connection))?;

    if categories.is_empty() {
        tracing::warn!("No {kind} categories to choose from");
        return context.reply(Reply::with_main_menu(reply::NO_CATEGORIES)).await;
    }

    context.conversations.await_category(context.user_id, kind);

    context
        .reply(Reply::category_picker(kind, &categories))
        .await
}

/// An inline category button: remember the category and ask for the amount.
///
/// The category is looked up first so that buttons from old messages cannot
/// start an entry for a category that no longer exists.
pub async fn select_category(
    context: &HandlerContext<'_>,
    token: CategoryToken,
) -> Result<(), Error> {
    let category = match context.with_connection(|connection| get_category(token.category_id, connection)) {
        Ok(category) => category,
        Err(Error::NotFound) => {
            tracing::warn!(
                "User {} selected unknown category {}",
                context.user_id,
                token.category_id
            );
            return context
                .reply(Reply::with_main_menu(reply::CATEGORY_NOT_FOUND))
                .await;
        }
        Err(error) => return Err(error),
    };

    if category.kind != token.kind {
        tracing::warn!(
            "Button {token} disagrees with the stored type of category {}, using {}",
            category.id,
            category.kind
        );
    }

    context
        .conversations
        .begin_entry(context.user_id, category.id, category.kind);

    context.reply(Reply::with_main_menu(reply::ENTRY_PROMPT)).await
}

/// Free text while a category is selected: record the transaction.
///
/// On a malformed amount the user is asked again and the entry stays pending.
/// The entry is taken from the store before anything is written, so when two
/// chats of the same user answer at once only one of them records it.
pub async fn enter_amount(context: &HandlerContext<'_>, text: &str) -> Result<(), Error> {
    let input = match parse_entry_input(text) {
        Ok(input) => input,
        Err(error) => {
            tracing::debug!("Rejected entry from user {}: {error}", context.user_id);
            return context.reply(Reply::text(reply::INVALID_AMOUNT)).await;
        }
    };

    let Some(entry) = context.conversations.consume_entry(context.user_id) else {
        tracing::debug!(
            "Entry of user {} was already taken, ignoring {text:?}",
            context.user_id
        );
        return Ok(());
    };

    let builder = Transaction::build(input.amount, entry.category_id, context.user_id)
        .description(input.description);

    let result = context.with_connection(|connection| {
        let transaction = create_transaction(builder, connection)?;
        let category = get_category(transaction.category_id, connection)?;
        Ok((transaction, category))
    });

    let (transaction, category) = match result {
        Ok(created) => created,
        Err(Error::InvalidCategory(category_id)) => {
            tracing::warn!(
                "Category {category_id} disappeared before user {} entered an amount",
                context.user_id
            );
            return context
                .reply(Reply::with_main_menu(reply::CATEGORY_NOT_FOUND))
                .await;
        }
        Err(error) => return Err(error),
    };

    tracing::info!(
        "User {} recorded transaction {} in category {}",
        context.user_id,
        transaction.id,
        category.name
    );

    let text = format_confirmation(
        entry.kind,
        transaction.amount,
        category.name.as_ref(),
        transaction.description.as_deref(),
    );

    context.reply(Reply::with_main_menu(text)).await
}

/// `/cancel`: drop any unfinished entry.
pub async fn cancel(context: &HandlerContext<'_>) -> Result<(), Error> {
    let text = match context.conversations.cancel(context.user_id) {
        DialogueState::Idle => reply::NOTHING_TO_CANCEL,
        DialogueState::AwaitingCategory(_) | DialogueState::AwaitingAmount(_) => reply::CANCELLED,
    };

    context.reply(Reply::with_main_menu(text)).await
}

//! Parsing of incoming chat text and button payloads into [ChatEvent]s.

use std::{fmt::Display, str::FromStr};

use crate::{
    Error,
    category::{CategoryId, CategoryKind},
    database_id::{ChatId, UserId},
};

/// Text prefixes that never count as transaction input, even when they are
/// not an exact menu label or a known command.
pub const RESERVED_PREFIXES: &[&str] = &["📊", "📋", "💰", "💸", "/"];

/// The slash commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Greet the user and show the main menu.
    Start,
    /// List the available commands.
    Help,
    /// List all categories.
    Categories,
    /// Show the user's income, expenses and balance.
    Statistics,
    /// Abandon an unfinished transaction.
    Cancel,
}

impl Command {
    /// Parse a message such as `/start`, `/help@finance_bot` or
    /// `/statistics now`.
    ///
    /// Returns `None` if the text is not a slash command or the command is
    /// unknown.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);

        match name {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "categories" => Some(Command::Categories),
            "statistics" => Some(Command::Statistics),
            "cancel" => Some(Command::Cancel),
            _ => None,
        }
    }
}

/// The buttons of the persistent main menu keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuButton {
    /// Show the user's totals.
    Statistics,
    /// List all categories.
    Categories,
    /// Start recording income.
    AddIncome,
    /// Start recording an expense.
    AddExpense,
}

impl MenuButton {
    /// The main menu layout, row by row.
    pub const ROWS: [[MenuButton; 2]; 2] = [
        [MenuButton::Statistics, MenuButton::Categories],
        [MenuButton::AddIncome, MenuButton::AddExpense],
    ];

    /// The text on the button, which is also the text the chat sends when it
    /// is pressed.
    pub fn label(&self) -> &'static str {
        match self {
            MenuButton::Statistics => "📊 Статистика",
            MenuButton::Categories => "📋 Категории",
            MenuButton::AddIncome => "💰 Добавить доход",
            MenuButton::AddExpense => "💸 Добавить расход",
        }
    }

    /// The button whose label is exactly `text`.
    pub fn from_label(text: &str) -> Option<Self> {
        MenuButton::ROWS
            .iter()
            .flatten()
            .find(|button| button.label() == text)
            .copied()
    }
}

/// The payload of an inline category button, `cat_<type>_<category_id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryToken {
    /// The type of the category, as shown when the button was made.
    pub kind: CategoryKind,
    /// The category the button selects.
    pub category_id: CategoryId,
}

impl FromStr for CategoryToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidCategoryToken(s.to_owned());
        let mut parts = s.split('_');

        let (Some("cat"), Some(kind), Some(category_id), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        Ok(Self {
            kind: kind.parse().map_err(|_| invalid())?,
            category_id: category_id.parse().map_err(|_| invalid())?,
        })
    }
}

impl Display for CategoryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cat_{}_{}", self.kind, self.category_id)
    }
}

/// Something a user did in the chat.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A known slash command.
    Command(Command),
    /// A press of a main menu button.
    Menu(MenuButton),
    /// A press of an inline category button.
    CategorySelected(CategoryToken),
    /// Any other text, which may be an amount and description.
    Text(String),
    /// Input the bot does not act on: unknown commands, text starting with a
    /// reserved prefix, and malformed button payloads.
    Ignored(String),
}

impl ChatEvent {
    /// Classify a text message.
    ///
    /// Slash commands take priority over menu labels, which take priority over
    /// free text.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();

        if text.starts_with('/') {
            return match Command::parse(text) {
                Some(command) => ChatEvent::Command(command),
                None => ChatEvent::Ignored(text.to_owned()),
            };
        }

        if let Some(button) = MenuButton::from_label(text) {
            return ChatEvent::Menu(button);
        }

        if text.is_empty()
            || RESERVED_PREFIXES
                .iter()
                .any(|prefix| text.starts_with(prefix))
        {
            return ChatEvent::Ignored(text.to_owned());
        }

        ChatEvent::Text(text.to_owned())
    }

    /// Classify the payload of an inline button press.
    pub fn from_callback_data(data: &str) -> Self {
        match data.parse() {
            Ok(token) => ChatEvent::CategorySelected(token),
            Err(error) => {
                tracing::debug!("{error}");
                ChatEvent::Ignored(data.to_owned())
            }
        }
    }
}

/// A [ChatEvent] together with who sent it and where to reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    /// The user who caused the event.
    pub user_id: UserId,
    /// The chat to reply in.
    pub chat_id: ChatId,
    /// What the user did.
    pub event: ChatEvent,
}

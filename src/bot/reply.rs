//! The messages the bot sends back, independent of the chat platform.

use crate::{
    bot::event::CategoryToken,
    category::{Category, CategoryKind},
    transaction::Summary,
};

/// Reply to `/start`.
pub const GREETING: &str =
    "Привет! Я бот для учета финансов. Используй кнопки меню или /help для просмотра команд.";

/// Reply to `/help`.
pub const HELP: &str = "Доступные команды:
/start - Показать главное меню
/categories - Показать категории
/statistics - Показать статистику
/cancel - Отменить добавление операции

Чтобы добавить операцию, нажмите «💰 Добавить доход» или «💸 Добавить расход», \
выберите категорию и отправьте сумму и описание через пробел.";

/// Asks for the amount once a category is picked.
pub const ENTRY_PROMPT: &str = "Введите сумму и описание через пробел\nНапример: 1000 Описание";

/// The amount could not be parsed; the entry stays pending.
pub const INVALID_AMOUNT: &str = "Неверный формат суммы. Пожалуйста, введите число.";

/// The selected category no longer exists.
pub const CATEGORY_NOT_FOUND: &str = "Категория не найдена. Выберите категорию заново.";

/// There is nothing to pick from.
pub const NO_CATEGORIES: &str = "Нет доступных категорий.";

/// `/cancel` dropped an unfinished entry.
pub const CANCELLED: &str = "Добавление операции отменено.";

/// `/cancel` with no dialogue in progress.
pub const NOTHING_TO_CANCEL: &str = "Нечего отменять.";

/// An inline button that selects a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryButton {
    /// The category name shown on the button.
    pub label: String,
    /// The payload sent back when the button is pressed.
    pub token: CategoryToken,
}

/// The keyboard attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Markup {
    /// Leave the current keyboard as it is.
    #[default]
    None,
    /// The persistent main menu, see [MenuButton::ROWS](crate::bot::MenuButton::ROWS).
    MainMenu,
    /// One inline button per category, one per row.
    Categories(Vec<CategoryButton>),
}

/// A message to send to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The message body.
    pub text: String,
    /// The keyboard to show with it.
    pub markup: Markup,
}

impl Reply {
    /// A reply without a keyboard.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: Markup::None,
        }
    }

    /// A reply that (re)displays the main menu.
    pub fn with_main_menu(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: Markup::MainMenu,
        }
    }

    /// A prompt to pick one of `categories`.
    pub fn category_picker(kind: CategoryKind, categories: &[Category]) -> Self {
        let text = match kind {
            CategoryKind::Expense => "Выберите категорию расхода:",
            CategoryKind::Income => "Выберите категорию дохода:",
        };

        let buttons = categories
            .iter()
            .map(|category| CategoryButton {
                label: category.name.to_string(),
                token: CategoryToken {
                    kind: category.kind,
                    category_id: category.id,
                },
            })
            .collect();

        Self {
            text: text.to_owned(),
            markup: Markup::Categories(buttons),
        }
    }
}

/// Format an amount with two decimal places.
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

/// List categories, expenses first then income, one `- <name>` per line.
pub fn format_categories(categories: &[Category]) -> String {
    let names = |kind: CategoryKind| {
        categories
            .iter()
            .filter(|category| category.kind == kind)
            .map(|category| format!("- {}", category.name))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Доступные категории:\n\nРасходы:\n{}\n\nДоходы:\n{}",
        names(CategoryKind::Expense),
        names(CategoryKind::Income)
    )
}

/// The three line income, expense and balance report.
pub fn format_statistics(summary: &Summary) -> String {
    format!(
        "Статистика:\nВсего доходов: {} руб.\nВсего расходов: {} руб.\nБаланс: {} руб.",
        format_amount(summary.income),
        format_amount(summary.expense),
        format_amount(summary.balance())
    )
}

/// The confirmation sent after a transaction was recorded.
pub fn format_confirmation(
    kind: CategoryKind,
    amount: f64,
    category_name: &str,
    description: Option<&str>,
) -> String {
    let heading = match kind {
        CategoryKind::Income => "Доход добавлен",
        CategoryKind::Expense => "Расход добавлен",
    };

    format!(
        "{heading}:\nСумма: {} руб.\nКатегория: {category_name}\nОписание: {}",
        format_amount(amount),
        description.unwrap_or("")
    )
}

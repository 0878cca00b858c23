//! Routes chat events to their handlers based on the user's dialogue state.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Error,
    bot::{
        ChatEvent, Command, Incoming, MenuButton, Messenger, Reply,
        handlers::{self, HandlerContext},
    },
    category::CategoryKind,
    conversation::{ConversationStore, DialogueState},
};

/// Routes incoming chat events to handlers.
///
/// Holds the bot's own database connection and the store of dialogue state.
/// The platform client is passed in per event so the same dispatcher can be
/// driven by Telegram or by tests.
#[derive(Debug)]
pub struct CommandDispatcher<C>
where
    C: ConversationStore,
{
    db_connection: Arc<Mutex<Connection>>,
    conversations: Arc<C>,
}

impl<C> CommandDispatcher<C>
where
    C: ConversationStore,
{
    /// Create a dispatcher over an initialized database connection.
    pub fn new(db_connection: Arc<Mutex<Connection>>, conversations: Arc<C>) -> Self {
        Self {
            db_connection,
            conversations,
        }
    }

    /// The store of dialogue state.
    pub fn conversations(&self) -> &C {
        &self.conversations
    }

    /// Handle one event to completion.
    ///
    /// Errors never escape: they are logged and the user gets a generic error
    /// reply.
    pub async fn dispatch(&self, incoming: Incoming, messenger: &dyn Messenger) {
        let context = HandlerContext {
            db_connection: &self.db_connection,
            conversations: self.conversations.as_ref(),
            messenger,
            user_id: incoming.user_id,
            chat_id: incoming.chat_id,
        };

        tracing::debug!("Handling {:?} from user {}", incoming.event, incoming.user_id);

        if let Err(error) = route(&context, incoming.event).await {
            tracing::error!(
                "could not handle event from user {}: {error}",
                incoming.user_id
            );

            let reply = Reply::with_main_menu(format!("Произошла ошибка: {error}"));
            if let Err(send_error) = messenger.send_reply(incoming.chat_id, reply).await {
                tracing::error!("could not report error to chat {}: {send_error}", incoming.chat_id);
            }
        }
    }

    /// Acknowledge the button press `callback_id`, then handle `incoming`.
    ///
    /// A failed acknowledgement only leaves the button's loading indicator
    /// spinning, so it is logged and the press is handled anyway.
    pub async fn dispatch_callback(
        &self,
        callback_id: &str,
        incoming: Incoming,
        messenger: &dyn Messenger,
    ) {
        if let Err(error) = messenger.answer_callback(callback_id).await {
            tracing::warn!("could not answer callback query {callback_id}: {error}");
        }

        self.dispatch(incoming, messenger).await;
    }
}

async fn route(context: &HandlerContext<'_>, event: ChatEvent) -> Result<(), Error> {
    match event {
        ChatEvent::Command(Command::Start) => handlers::start(context).await,
        ChatEvent::Command(Command::Help) => handlers::help(context).await,
        ChatEvent::Command(Command::Categories) | ChatEvent::Menu(MenuButton::Categories) => {
            handlers::show_categories(context).await
        }
        ChatEvent::Command(Command::Statistics) | ChatEvent::Menu(MenuButton::Statistics) => {
            handlers::show_statistics(context).await
        }
        ChatEvent::Command(Command::Cancel) => handlers::cancel(context).await,
        ChatEvent::Menu(MenuButton::AddIncome) => {
            handlers::choose_category(context, CategoryKind::Income).await
        }
        ChatEvent::Menu(MenuButton::AddExpense) => {
            handlers::choose_category(context, CategoryKind::Expense).await
        }
        ChatEvent::CategorySelected(token) => handlers::select_category(context, token).await,
        ChatEvent::Text(text) => match context.conversations.state(context.user_id) {
            DialogueState::AwaitingAmount(_) => handlers::enter_amount(context, &text).await,
            DialogueState::Idle | DialogueState::AwaitingCategory(_) => {
                tracing::debug!(
                    "Ignoring text from user {} with no pending entry",
                    context.user_id
                );
                Ok(())
            }
        },
        ChatEvent::Ignored(input) => {
            tracing::debug!("Ignoring input {input:?} from user {}", context.user_id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier, Mutex};

    use crate::{
        bot::{ChatEvent, Incoming, Markup, reply},
        category::{CategoryId, CategoryKind, get_categories_by_kind, seed_default_categories},
        database_id::UserId,
        conversation::{ConversationStore, DialogueState, InMemoryConversationStore, PendingEntry},
        test_utils::{RecordingMessenger, get_test_connection, insert_test_category},
        transaction::{Transaction, count_transactions, create_transaction, get_all_transactions},
    };

    use super::CommandDispatcher;

    const USER: i64 = 123456789;
    const CHAT: i64 = 987654321;

    fn get_test_dispatcher() -> CommandDispatcher<InMemoryConversationStore> {
        CommandDispatcher::new(
            Arc::new(Mutex::new(get_test_connection())),
            Arc::new(InMemoryConversationStore::default()),
        )
    }

    /// Holds every caller of [ConversationStore::state] until two have read it.
    struct GatedStore {
        inner: InMemoryConversationStore,
        gate: Barrier,
    }

    impl ConversationStore for GatedStore {
        fn state(&self, user_id: UserId) -> DialogueState {
            let state = self.inner.state(user_id);
            self.gate.wait();
            state
        }

        fn await_category(&self, user_id: UserId, kind: CategoryKind) {
            self.inner.await_category(user_id, kind);
        }

        fn begin_entry(&self, user_id: UserId, category_id: CategoryId, kind: CategoryKind) {
            self.inner.begin_entry(user_id, category_id, kind);
        }

        fn consume_entry(&self, user_id: UserId) -> Option<PendingEntry> {
            self.inner.consume_entry(user_id)
        }

        fn cancel(&self, user_id: UserId) -> DialogueState {
            self.inner.cancel(user_id)
        }

        fn pending_entry(&self, user_id: UserId) -> Option<PendingEntry> {
            self.inner.pending_entry(user_id)
        }
    }

    fn incoming(event: ChatEvent) -> Incoming {
        Incoming {
            user_id: USER,
            chat_id: CHAT,
            event,
        }
    }

    async fn send_text(
        dispatcher: &CommandDispatcher<InMemoryConversationStore>,
        messenger: &RecordingMessenger,
        text: &str,
    ) {
        dispatcher
            .dispatch(incoming(ChatEvent::from_text(text)), messenger)
            .await;
    }

    async fn press_button(
        dispatcher: &CommandDispatcher<InMemoryConversationStore>,
        messenger: &RecordingMessenger,
        data: &str,
    ) {
        dispatcher
            .dispatch(incoming(ChatEvent::from_callback_data(data)), messenger)
            .await;
    }

    #[tokio::test]
    async fn start_shows_main_menu() {
        let dispatcher = get_test_dispatcher();
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "/start").await;

        let replies = messenger.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, CHAT);
        assert_eq!(replies[0].1.text, reply::GREETING);
        assert_eq!(replies[0].1.markup, Markup::MainMenu);
    }

    #[tokio::test]
    async fn help_lists_commands() {
        let dispatcher = get_test_dispatcher();
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "/help").await;

        let reply = messenger.single_reply();
        for command in ["/categories", "/statistics", "/cancel"] {
            assert!(reply.text.contains(command), "help is missing {command}");
        }
    }

    #[tokio::test]
    async fn categories_command_and_button_list_expenses_first() {
        let dispatcher = get_test_dispatcher();
        {
            let connection = dispatcher.db_connection.lock().unwrap();
            insert_test_category(&connection, "Зарплата", CategoryKind::Income);
            insert_test_category(&connection, "Продукты", CategoryKind::Expense);
        }
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "/categories").await;
        send_text(&dispatcher, &messenger, "📋 Категории").await;

        let replies = messenger.replies();
        assert_eq!(replies.len(), 2);
        for (_, reply) in replies {
            let expenses = reply.text.find("Расходы:\n- Продукты").expect("no expenses");
            let income = reply.text.find("Доходы:\n- Зарплата").expect("no income");
            assert!(expenses < income);
        }
    }

    #[tokio::test]
    async fn add_expense_shows_expense_categories() {
        let dispatcher = get_test_dispatcher();
        let expenses = {
            let connection = dispatcher.db_connection.lock().unwrap();
            seed_default_categories(&connection).unwrap();
            get_categories_by_kind(CategoryKind::Expense, &connection).unwrap()
        };
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "💸 Добавить расход").await;

        let reply = messenger.single_reply();
        assert_eq!(reply.text, "Выберите категорию расхода:");
        let Markup::Categories(buttons) = reply.markup else {
            panic!("want category buttons, got {:?}", reply.markup);
        };
        assert_eq!(buttons.len(), expenses.len());
        assert_eq!(
            buttons[0].token.to_string(),
            format!("cat_expense_{}", expenses[0].id)
        );
        assert_eq!(
            dispatcher.conversations().state(USER),
            DialogueState::AwaitingCategory(CategoryKind::Expense)
        );
    }

    #[tokio::test]
    async fn full_expense_dialogue_records_transaction() {
        let dispatcher = get_test_dispatcher();
        let category = {
            let connection = dispatcher.db_connection.lock().unwrap();
            insert_test_category(&connection, "Продукты", CategoryKind::Expense)
        };
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "💸 Добавить расход").await;
        press_button(&dispatcher, &messenger, &format!("cat_expense_{}", category.id)).await;
        assert_eq!(
            dispatcher.conversations().pending_entry(USER),
            Some(PendingEntry {
                category_id: category.id,
                kind: CategoryKind::Expense
            })
        );
        messenger.clear();

        send_text(&dispatcher, &messenger, "1000 Продукты").await;

        let connection = dispatcher.db_connection.lock().unwrap();
        let transactions = get_all_transactions(&connection).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].amount, 1000.0);
        assert_eq!(transactions[0].description.as_deref(), Some("Продукты"));
        assert_eq!(transactions[0].category_id, category.id);
        assert_eq!(transactions[0].user_id, USER);
        assert_eq!(dispatcher.conversations().state(USER), DialogueState::Idle);
        assert_eq!(
            messenger.single_reply().text,
            "Расход добавлен:\nСумма: 1000.00 руб.\nКатегория: Продукты\nОписание: Продукты"
        );
    }

    #[tokio::test]
    async fn category_button_prompts_for_amount() {
        let dispatcher = get_test_dispatcher();
        let category = {
            let connection = dispatcher.db_connection.lock().unwrap();
            insert_test_category(&connection, "Зарплата", CategoryKind::Income)
        };
        let messenger = RecordingMessenger::default();

        press_button(&dispatcher, &messenger, &format!("cat_income_{}", category.id)).await;

        assert_eq!(messenger.single_reply().text, reply::ENTRY_PROMPT);
    }

    #[tokio::test]
    async fn invalid_amount_keeps_entry_for_retry() {
        let dispatcher = get_test_dispatcher();
        let category = {
            let connection = dispatcher.db_connection.lock().unwrap();
            insert_test_category(&connection, "Продукты", CategoryKind::Expense)
        };
        dispatcher
            .conversations()
            .begin_entry(USER, category.id, CategoryKind::Expense);
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "abc test").await;

        assert_eq!(messenger.single_reply().text, reply::INVALID_AMOUNT);
        assert!(dispatcher.conversations().pending_entry(USER).is_some());
        {
            let connection = dispatcher.db_connection.lock().unwrap();
            assert_eq!(count_transactions(&connection), Ok(0));
        }

        send_text(&dispatcher, &messenger, "250 хлеб").await;

        let connection = dispatcher.db_connection.lock().unwrap();
        assert_eq!(count_transactions(&connection), Ok(1));
        assert_eq!(dispatcher.conversations().pending_entry(USER), None);
    }

    #[test]
    fn entry_answered_from_two_chats_at_once_is_recorded_once() {
        let dispatcher = CommandDispatcher::new(
            Arc::new(Mutex::new(get_test_connection())),
            Arc::new(GatedStore {
                inner: InMemoryConversationStore::default(),
                gate: Barrier::new(2),
            }),
        );
        let category = {
            let connection = dispatcher.db_connection.lock().unwrap();
            insert_test_category(&connection, "Продукты", CategoryKind::Expense)
        };
        dispatcher
            .conversations()
            .begin_entry(USER, category.id, CategoryKind::Expense);
        let messenger = RecordingMessenger::default();

        std::thread::scope(|scope| {
            for chat_id in [10, 20] {
                let dispatcher = &dispatcher;
                let messenger = &messenger;
                scope.spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .build()
                        .unwrap();
                    runtime.block_on(dispatcher.dispatch(
                        Incoming {
                            user_id: USER,
                            chat_id,
                            event: ChatEvent::from_text("100 x"),
                        },
                        messenger,
                    ));
                });
            }
        });

        let connection = dispatcher.db_connection.lock().unwrap();
        assert_eq!(count_transactions(&connection), Ok(1));
        assert_eq!(messenger.replies().len(), 1);
        assert_eq!(dispatcher.conversations().pending_entry(USER), None);
    }

    #[tokio::test]
    async fn text_without_pending_entry_is_ignored() {
        let dispatcher = get_test_dispatcher();
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "1000 Продукты").await;

        assert!(messenger.replies().is_empty());
        let connection = dispatcher.db_connection.lock().unwrap();
        assert_eq!(count_transactions(&connection), Ok(0));
    }

    #[tokio::test]
    async fn menu_label_while_awaiting_amount_is_not_an_entry() {
        let dispatcher = get_test_dispatcher();
        let category = {
            let connection = dispatcher.db_connection.lock().unwrap();
            insert_test_category(&connection, "Продукты", CategoryKind::Expense)
        };
        dispatcher
            .conversations()
            .begin_entry(USER, category.id, CategoryKind::Expense);
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "📊 Статистика").await;
        send_text(&dispatcher, &messenger, "💸 500").await;

        let connection = dispatcher.db_connection.lock().unwrap();
        assert_eq!(count_transactions(&connection), Ok(0));
        assert_eq!(messenger.replies().len(), 1);
    }

    #[tokio::test]
    async fn button_press_is_acknowledged_before_handling() {
        let dispatcher = get_test_dispatcher();
        let category = {
            let connection = dispatcher.db_connection.lock().unwrap();
            insert_test_category(&connection, "Зарплата", CategoryKind::Income)
        };
        let messenger = RecordingMessenger::default();
        let data = format!("cat_income_{}", category.id);

        dispatcher
            .dispatch_callback("query-1", incoming(ChatEvent::from_callback_data(&data)), &messenger)
            .await;

        assert_eq!(messenger.acknowledged(), vec!["query-1".to_owned()]);
        assert_eq!(messenger.single_reply().text, reply::ENTRY_PROMPT);
    }

    #[tokio::test]
    async fn failed_acknowledgement_still_selects_category() {
        let dispatcher = get_test_dispatcher();
        let category = {
            let connection = dispatcher.db_connection.lock().unwrap();
            insert_test_category(&connection, "Продукты", CategoryKind::Expense)
        };
        let messenger = RecordingMessenger::rejecting_acknowledgements();
        let data = format!("cat_expense_{}", category.id);

        dispatcher
            .dispatch_callback("query-1", incoming(ChatEvent::from_callback_data(&data)), &messenger)
            .await;

        assert_eq!(messenger.single_reply().text, reply::ENTRY_PROMPT);
        assert_eq!(
            dispatcher.conversations().pending_entry(USER),
            Some(PendingEntry {
                category_id: category.id,
                kind: CategoryKind::Expense
            })
        );
    }

    #[tokio::test]
    async fn unknown_category_button_does_not_start_entry() {
        let dispatcher = get_test_dispatcher();
        let messenger = RecordingMessenger::default();

        press_button(&dispatcher, &messenger, "cat_expense_42").await;

        assert_eq!(messenger.single_reply().text, reply::CATEGORY_NOT_FOUND);
        assert_eq!(dispatcher.conversations().state(USER), DialogueState::Idle);
    }

    #[tokio::test]
    async fn entry_for_missing_category_is_reported_and_dropped() {
        let dispatcher = get_test_dispatcher();
        dispatcher
            .conversations()
            .begin_entry(USER, 42, CategoryKind::Expense);
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "100 обед").await;

        assert_eq!(messenger.single_reply().text, reply::CATEGORY_NOT_FOUND);
        assert_eq!(dispatcher.conversations().pending_entry(USER), None);
    }

    #[tokio::test]
    async fn statistics_reports_user_totals() {
        let dispatcher = get_test_dispatcher();
        {
            let connection = dispatcher.db_connection.lock().unwrap();
            let food = insert_test_category(&connection, "Продукты", CategoryKind::Expense);
            let wages = insert_test_category(&connection, "Зарплата", CategoryKind::Income);
            create_transaction(Transaction::build(100.0, food.id, USER), &connection).unwrap();
            create_transaction(Transaction::build(500.0, wages.id, USER), &connection).unwrap();
            create_transaction(Transaction::build(999.0, wages.id, USER + 1), &connection)
                .unwrap();
        }
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "/statistics").await;

        assert_eq!(
            messenger.single_reply().text,
            "Статистика:\nВсего доходов: 500.00 руб.\nВсего расходов: 100.00 руб.\nБаланс: 400.00 руб."
        );
    }

    #[tokio::test]
    async fn statistics_failure_is_reported_to_user() {
        let dispatcher = get_test_dispatcher();
        {
            let connection = dispatcher.db_connection.lock().unwrap();
            connection
                .execute_batch("DROP TABLE transactions;")
                .unwrap();
        }
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "📊 Статистика").await;

        assert!(
            messenger
                .single_reply()
                .text
                .starts_with("Ошибка при получении статистики:")
        );
    }

    #[tokio::test]
    async fn unexpected_errors_get_generic_reply() {
        let dispatcher = get_test_dispatcher();
        {
            let connection = dispatcher.db_connection.lock().unwrap();
            connection
                .execute_batch("DROP TABLE transactions; DROP TABLE categories;")
                .unwrap();
        }
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "/categories").await;

        assert!(messenger.single_reply().text.starts_with("Произошла ошибка:"));
    }

    #[tokio::test]
    async fn cancel_drops_pending_entry() {
        let dispatcher = get_test_dispatcher();
        dispatcher
            .conversations()
            .begin_entry(USER, 1, CategoryKind::Expense);
        let messenger = RecordingMessenger::default();

        send_text(&dispatcher, &messenger, "/cancel").await;

        assert_eq!(messenger.single_reply().text, reply::CANCELLED);
        assert_eq!(dispatcher.conversations().state(USER), DialogueState::Idle);
    }

    #[tokio::test]
    async fn new_selection_replaces_unfinished_entry() {
        let dispatcher = get_test_dispatcher();
        let (food, wages) = {
            let connection = dispatcher.db_connection.lock().unwrap();
            (
                insert_test_category(&connection, "Продукты", CategoryKind::Expense),
                insert_test_category(&connection, "Зарплата", CategoryKind::Income),
            )
        };
        let messenger = RecordingMessenger::default();

        press_button(&dispatcher, &messenger, &format!("cat_expense_{}", food.id)).await;
        press_button(&dispatcher, &messenger, &format!("cat_income_{}", wages.id)).await;
        send_text(&dispatcher, &messenger, "5000").await;

        let connection = dispatcher.db_connection.lock().unwrap();
        let transactions = get_all_transactions(&connection).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].category_id, wages.id);
        assert_eq!(transactions[0].description, None);
    }
}

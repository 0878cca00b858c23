//! Helpers shared by the unit tests.

#![allow(missing_docs)]

use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;

use crate::{
    Error,
    bot::{Messenger, Reply},
    category::{Category, CategoryKind, CategoryName, create_category},
    database_id::ChatId,
    db::initialize,
};

/// An in-memory database with all tables created.
pub(crate) fn get_test_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    initialize(&conn).unwrap();
    conn
}

#[track_caller]
pub(crate) fn insert_test_category(
    connection: &Connection,
    name: &str,
    kind: CategoryKind,
) -> Category {
    create_category(CategoryName::new_unchecked(name), kind, connection)
        .expect("Could not create test category")
}

/// A [Messenger] that records every reply instead of sending it.
#[derive(Debug, Default)]
pub(crate) struct RecordingMessenger {
    sent: Mutex<Vec<(ChatId, Reply)>>,
    acknowledged: Mutex<Vec<String>>,
    reject_acknowledgements: bool,
}

impl RecordingMessenger {
    /// A messenger whose button acknowledgements always fail.
    pub(crate) fn rejecting_acknowledgements() -> Self {
        Self {
            reject_acknowledgements: true,
            ..Self::default()
        }
    }

    pub(crate) fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }

    pub(crate) fn replies(&self) -> Vec<(ChatId, Reply)> {
        self.sent.lock().unwrap().clone()
    }

    #[track_caller]
    pub(crate) fn single_reply(&self) -> Reply {
        let replies = self.replies();
        assert_eq!(replies.len(), 1, "want exactly one reply, got {replies:?}");
        replies[0].1.clone()
    }

    pub(crate) fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_reply(&self, chat_id: ChatId, reply: Reply) -> Result<(), Error> {
        self.sent.lock().unwrap().push((chat_id, reply));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), Error> {
        if self.reject_acknowledgements {
            return Err(Error::MessagingError("query is too old".to_owned()));
        }

        self.acknowledged.lock().unwrap().push(callback_id.to_owned());
        Ok(())
    }
}

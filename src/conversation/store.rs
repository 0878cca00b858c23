//! Per-user dialogue state for the "add transaction" conversation.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use crate::{
    category::{CategoryId, CategoryKind},
    database_id::UserId,
};

/// The category a user picked and is now expected to enter an amount for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEntry {
    /// The category the new transaction will be recorded against.
    pub category_id: CategoryId,
    /// Whether the new transaction is income or an expense.
    pub kind: CategoryKind,
}

/// Where a user is in the "add transaction" dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogueState {
    /// No dialogue in progress.
    #[default]
    Idle,
    /// The user asked to add a transaction and was shown the category buttons.
    AwaitingCategory(CategoryKind),
    /// The user picked a category and the next free text is the amount.
    AwaitingAmount(PendingEntry),
}

/// Stores the dialogue state of each user.
///
/// Implementations hold state in memory only. It is never persisted and never
/// visible to the REST API.
pub trait ConversationStore: Send + Sync {
    /// The current dialogue state of `user_id`, [DialogueState::Idle] if none.
    fn state(&self, user_id: UserId) -> DialogueState;

    /// Record that `user_id` has been shown the category buttons for `kind`.
    ///
    /// Replaces any unfinished entry.
    fn await_category(&self, user_id: UserId, kind: CategoryKind);

    /// Start an entry for `user_id`, replacing any unfinished one.
    fn begin_entry(&self, user_id: UserId, category_id: CategoryId, kind: CategoryKind);

    /// Remove and return the entry of `user_id`.
    ///
    /// Returns `None` if the user is not entering an amount, in which case
    /// nothing is changed.
    fn consume_entry(&self, user_id: UserId) -> Option<PendingEntry>;

    /// Drop any dialogue state for `user_id` and return what was dropped.
    fn cancel(&self, user_id: UserId) -> DialogueState;

    /// The entry of `user_id` without removing it.
    fn pending_entry(&self, user_id: UserId) -> Option<PendingEntry> {
        match self.state(user_id) {
            DialogueState::AwaitingAmount(entry) => Some(entry),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StoredState {
    state: DialogueState,
    updated_at: Instant,
}

/// A [ConversationStore] backed by a mutex-guarded map.
///
/// When constructed with a time to live, state older than the TTL is treated
/// as [DialogueState::Idle] and evicted the next time the user is looked up.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    states: Mutex<HashMap<UserId, StoredState>>,
    ttl: Option<Duration>,
}

impl InMemoryConversationStore {
    /// Create an empty store. `ttl` of `None` keeps state until it is consumed.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// The number of users with dialogue state, including expired state that
    /// has not been evicted yet.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no user has dialogue state.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The map stays consistent even if a holder panicked, every write is a
    // single insert or remove.
    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, StoredState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, user_id: UserId, state: DialogueState, now: Instant) {
        self.lock().insert(
            user_id,
            StoredState {
                state,
                updated_at: now,
            },
        );
    }

    fn is_expired(&self, stored: &StoredState, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(stored.updated_at) >= ttl)
    }

    // Returns the state of `user_id`, evicting it first if it has expired.
    fn live_state(
        &self,
        states: &mut HashMap<UserId, StoredState>,
        user_id: UserId,
        now: Instant,
    ) -> DialogueState {
        let Some(stored) = states.get(&user_id).copied() else {
            return DialogueState::Idle;
        };

        if self.is_expired(&stored, now) {
            tracing::debug!("Dialogue state for user {user_id} expired");
            states.remove(&user_id);
            return DialogueState::Idle;
        }

        stored.state
    }

    fn state_at(&self, user_id: UserId, now: Instant) -> DialogueState {
        self.live_state(&mut self.lock(), user_id, now)
    }

    fn consume_entry_at(&self, user_id: UserId, now: Instant) -> Option<PendingEntry> {
        let mut states = self.lock();

        let DialogueState::AwaitingAmount(entry) = self.live_state(&mut states, user_id, now)
        else {
            return None;
        };

        states.remove(&user_id);

        Some(entry)
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn state(&self, user_id: UserId) -> DialogueState {
        self.state_at(user_id, Instant::now())
    }

    fn await_category(&self, user_id: UserId, kind: CategoryKind) {
        self.set(user_id, DialogueState::AwaitingCategory(kind), Instant::now());
    }

    fn begin_entry(&self, user_id: UserId, category_id: CategoryId, kind: CategoryKind) {
        let entry = PendingEntry { category_id, kind };
        self.set(user_id, DialogueState::AwaitingAmount(entry), Instant::now());
    }

    fn consume_entry(&self, user_id: UserId) -> Option<PendingEntry> {
        self.consume_entry_at(user_id, Instant::now())
    }

    fn cancel(&self, user_id: UserId) -> DialogueState {
        let mut states = self.lock();
        let state = self.live_state(&mut states, user_id, Instant::now());
        states.remove(&user_id);
        state
    }
}

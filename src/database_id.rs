//! Database and platform ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// Database identifier for a transaction.
pub type TransactionId = DatabaseId;

/// The opaque ID the messaging platform assigns to a user.
pub type UserId = i64;

/// The ID of the chat that replies should be sent to.
pub type ChatId = i64;

//! The API endpoints URIs.

/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/v1/transactions/";
/// [TRANSACTIONS] without the trailing slash.
pub const TRANSACTIONS_NO_SLASH: &str = "/api/v1/transactions";

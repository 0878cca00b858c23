//! Per-user income and expense totals.

use rusqlite::Connection;
use serde::Serialize;

use crate::{Error, category::CategoryKind, database_id::UserId};

/// Income and expense totals for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    /// The sum of all transactions in income categories.
    pub income: f64,
    /// The sum of all transactions in expense categories.
    pub expense: f64,
}

impl Summary {
    /// Income minus expenses.
    pub fn balance(&self) -> f64 {
        self.income - self.expense
    }
}

/// Sum the transactions of `user_id` by the type of their category.
///
/// Users without any transactions get a zeroed [Summary].
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_user_summary(user_id: UserId, connection: &Connection) -> Result<Summary, Error> {
    let mut statement = connection.prepare(
        "SELECT categories.type, SUM(transactions.amount)
         FROM transactions
         INNER JOIN categories ON categories.id = transactions.category_id
         WHERE transactions.user_id = :user_id
         GROUP BY categories.type",
    )?;

    let rows = statement.query_map(&[(":user_id", &user_id)], |row| {
        let kind: CategoryKind = row.get(0)?;
        let total: f64 = row.get(1)?;
        Ok((kind, total))
    })?;

    let mut summary = Summary::default();
    for row in rows {
        let (kind, total) = row?;
        match kind {
            CategoryKind::Income => summary.income = total,
            CategoryKind::Expense => summary.expense = total,
        }
    }

    Ok(summary)
}

//! Database operations for categories.

use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    category::{Category, CategoryId, CategoryKind, CategoryName},
};

/// The categories every fresh database starts with.
///
/// Expenses are listed first, which is also the order the chat menus show
/// them in.
pub const DEFAULT_CATEGORIES: &[(&str, CategoryKind)] = &[
    ("Продукты", CategoryKind::Expense),
    ("Транспорт", CategoryKind::Expense),
    ("Развлечения", CategoryKind::Expense),
    ("Коммунальные услуги", CategoryKind::Expense),
    ("Здоровье", CategoryKind::Expense),
    ("Зарплата", CategoryKind::Income),
    ("Фриланс", CategoryKind::Income),
    ("Подарки", CategoryKind::Income),
    ("Инвестиции", CategoryKind::Income),
];

/// Create a category and return it with its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateCategoryName] if a category with `name` already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    name: CategoryName,
    kind: CategoryKind,
    connection: &Connection,
) -> Result<Category, Error> {
    let now = OffsetDateTime::now_utc();

    connection
        .execute(
            "INSERT INTO categories (name, type, created_at, updated_at) VALUES (?1, ?2, ?3, ?3);",
            (name.as_ref(), kind, now),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateCategoryName(name.to_string()),
            error => error.into(),
        })?;

    let id = connection.last_insert_rowid();

    Ok(Category { id, name, kind })
}

/// Retrieve a single category by ID.
///
/// # Errors
/// Returns [Error::NotFound] if `category_id` does not refer to a category.
pub fn get_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name, type FROM categories WHERE id = :id;")?
        .query_row(&[(":id", &category_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve a single category by its unique name, if it exists.
pub fn get_category_by_name(name: &str, connection: &Connection) -> Result<Option<Category>, Error> {
    connection
        .prepare("SELECT id, name, type FROM categories WHERE name = :name;")?
        .query_row(&[(":name", &name)], map_row)
        .optional()
        .map_err(|error| error.into())
}

/// Retrieve all categories in insertion order.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name, type FROM categories ORDER BY id ASC;")?
        .query_map([], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the categories of one kind in insertion order.
pub fn get_categories_by_kind(
    kind: CategoryKind,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name, type FROM categories WHERE type = :type ORDER BY id ASC;")?
        .query_map(&[(":type", &kind)], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Insert each of [DEFAULT_CATEGORIES] that does not exist yet.
///
/// Safe to call on every start up. A name that appears between the existence
/// check and the insert is counted as already seeded.
///
/// Returns the number of categories that were inserted.
///
/// # Errors
/// Returns an [Error::SqlError] if a query fails for any reason other than a
/// duplicate name.
pub fn seed_default_categories(connection: &Connection) -> Result<usize, Error> {
    let mut inserted = 0;

    for &(name, kind) in DEFAULT_CATEGORIES {
        if get_category_by_name(name, connection)?.is_some() {
            tracing::debug!("Category {name} already exists");
            continue;
        }

        match create_category(CategoryName::new_unchecked(name), kind, connection) {
            Ok(category) => {
                tracing::info!("Added category {} ({})", category.name, category.kind);
                inserted += 1;
            }
            Err(Error::DuplicateCategoryName(name)) => {
                tracing::warn!("Category {name} was created concurrently, skipping");
            }
            Err(error) => return Err(error),
        }
    }

    Ok(inserted)
}

/// Initialize the category table and indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_categories_type ON categories(type);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let name = CategoryName::new_unchecked(&raw_name);
    let kind = row.get(2)?;

    Ok(Category { id, name, kind })
}

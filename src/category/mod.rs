//! Income and expense categories for classifying transactions.

mod db;
mod domain;

pub use db::{
    DEFAULT_CATEGORIES, create_category, create_category_table, get_all_categories,
    get_categories_by_kind, get_category, get_category_by_name, seed_default_categories,
};
pub use domain::{Category, CategoryId, CategoryKind, CategoryName};

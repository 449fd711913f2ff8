//! SQLite persistence.
//!
//! Decimals are stored as TEXT so they read back exactly as written.

pub mod database;
mod profit_targets;
mod reviews;
mod trades;

pub use database::Database;

use rusqlite::types::Type;
use rusqlite::Row;
use rust_decimal::Decimal;
use std::str::FromStr;

fn conversion_error(
    idx: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

pub(crate) fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn optional_decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Decimal::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Parse a TEXT column through the type's `FromStr`.
pub(crate) fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn decimal_param(value: Decimal) -> String {
    value.to_string()
}

pub(crate) fn optional_decimal_param(value: Option<Decimal>) -> Option<String> {
    value.map(decimal_param)
}

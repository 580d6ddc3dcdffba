//! Normalization rules shared by every backend.
//!
//! Both adapters route codes, columns and date ranges through these
//! functions so that switching backends never changes what callers see:
//! the same bare code always becomes the same qualified code, every table
//! leads with a `time` column, and range filtering is inclusive on both ends.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::period::SecurityKind;
use crate::types::{Exchange, StockCode};

/// Canonical name of the time column in every normalized table.
pub const TIME_COLUMN: &str = "time";

/// Upper bound on bars fetched per code from backends that page by count.
pub const MAX_FETCH_ROWS: usize = 800;

/// Offset of exchange local time from UTC. China observes no daylight saving.
pub const MARKET_UTC_OFFSET_MS: i64 = 8 * 60 * 60 * 1000;

/// Days between 0001-01-01 and 1970-01-01, the epoch of polars `Date`.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Removes a `.SUFFIX` market suffix, if present.
#[must_use]
pub fn strip_suffix(code: &str) -> &str {
    code.split_once('.').map_or(code, |(bare, _)| bare)
}

/// Qualifies a bare code with its market suffix.
///
/// `6…` is Shanghai, `0…` and `3…` are Shenzhen, anything else is returned
/// bare. A code that already has a suffix keeps it, uppercased: re-deriving
/// the suffix would turn Shanghai index `000001.SH` into the unrelated
/// Shenzhen equity `000001.SZ`.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    let code = code.trim();
    if let Some((bare, suffix)) = code.split_once('.') {
        return format!("{bare}.{}", suffix.to_ascii_uppercase());
    }

    match code.as_bytes().first() {
        Some(b'6') => format!("{code}.{}", Exchange::Shanghai.suffix()),
        Some(b'0' | b'3') => format!("{code}.{}", Exchange::Shenzhen.suffix()),
        _ => code.to_string(),
    }
}

/// Returns true if the code is an exchange index.
///
/// Both suffix and prefix must match: Shanghai indices start with `000`,
/// Shenzhen indices with `399`. A Shenzhen `000…` code is an equity.
#[must_use]
pub fn is_index(code: &StockCode) -> bool {
    match code.exchange() {
        Some(Exchange::Shanghai) => code.bare().starts_with("000"),
        Some(Exchange::Shenzhen) => code.bare().starts_with("399"),
        _ => false,
    }
}

/// Classifies a qualified code into stock, index or ETF by exchange and prefix.
///
/// Returns `None` for codes outside these universes (bonds, B shares, ...).
#[must_use]
pub fn classify_security(code: &StockCode) -> Option<SecurityKind> {
    if is_index(code) {
        return Some(SecurityKind::Index);
    }

    let bare = code.bare();
    let has_prefix = |prefixes: &[&str]| prefixes.iter().any(|p| bare.starts_with(p));

    match code.exchange()? {
        Exchange::Shanghai if has_prefix(&["60", "68"]) => Some(SecurityKind::Stock),
        Exchange::Shanghai if has_prefix(&["51", "56", "58"]) => Some(SecurityKind::Etf),
        Exchange::Shenzhen if has_prefix(&["00", "30"]) => Some(SecurityKind::Stock),
        Exchange::Shenzhen if has_prefix(&["15", "16"]) => Some(SecurityKind::Etf),
        Exchange::Beijing if has_prefix(&["4", "8", "92"]) => Some(SecurityKind::Stock),
        _ => None,
    }
}

/// Brings a backend table to the canonical column layout.
///
/// Renames `native_time` to [`TIME_COLUMN`] and keeps `time` followed by the
/// requested fields that are actually present. Row order is untouched.
///
/// The normalized `time` column is a naive `Datetime` holding exchange
/// local time (China Standard Time, UTC+08:00). Integer columns are read as
/// epoch milliseconds and shifted to local time; `Datetime` columns are
/// taken as already local.
pub fn normalize_columns(
    mut df: DataFrame,
    native_time: &str,
    fields: &[String],
) -> Result<DataFrame> {
    if native_time != TIME_COLUMN
        && df.get_column_index(native_time).is_some()
        && df.get_column_index(TIME_COLUMN).is_none()
    {
        df.rename(native_time, TIME_COLUMN.into())?;
    }

    let epoch_millis = df
        .column(TIME_COLUMN)
        .is_ok_and(|time| time.dtype().is_integer());
    if epoch_millis {
        df = df
            .lazy()
            .with_column(
                (col(TIME_COLUMN).cast(DataType::Int64) + lit(MARKET_UTC_OFFSET_MS))
                    .cast(DataType::Datetime(TimeUnit::Milliseconds, None)),
            )
            .collect()?;
    }

    let selected: Vec<&str> = std::iter::once(TIME_COLUMN)
        .chain(fields.iter().map(String::as_str))
        .filter(|name| df.get_column_index(name).is_some())
        .collect();

    Ok(df.select(selected)?)
}

/// Keeps rows whose `time` falls on a date within `[start, end]`.
///
/// Both bounds are inclusive and `start > end` yields an empty table. A
/// table without a usable `time` column is returned unchanged.
#[must_use]
pub fn filter_by_date_range(df: DataFrame, start: NaiveDate, end: NaiveDate) -> DataFrame {
    if df.get_column_index(TIME_COLUMN).is_none() {
        warn!("Table has no {TIME_COLUMN} column, skipping date filter");
        return df;
    }

    let before = df.height();
    let day = col(TIME_COLUMN).cast(DataType::Date).cast(DataType::Int32);
    let filtered = df
        .clone()
        .lazy()
        .filter(
            day.clone()
                .gt_eq(lit(epoch_days(start)))
                .and(day.lt_eq(lit(epoch_days(end)))),
        )
        .collect();

    match filtered {
        Ok(filtered) => {
            debug!(
                %start,
                %end,
                before,
                after = filtered.height(),
                "Filtered table by date range"
            );
            filtered
        }
        Err(e) => {
            error!(error = %e, "Date filter failed, returning unfiltered table");
            df
        }
    }
}

/// Bounds a requested bar count by [`MAX_FETCH_ROWS`].
///
/// Unlimited (`None`) and zero both mean "as many as allowed".
#[must_use]
pub fn cap_count(count: Option<usize>) -> usize {
    match count {
        Some(n) if n > 0 => n.min(MAX_FETCH_ROWS),
        _ => MAX_FETCH_ROWS,
    }
}

fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

//! Year detection.
//!
//! A year is any maximal run of exactly four ASCII digits whose value lies in
//! `[1900, current_year + 1]`. Longer or shorter digit runs are never split
//! or padded, so `12345` and `199` contribute nothing.

use chrono::Datelike;
use std::collections::BTreeSet;

/// Earliest year accepted.
pub const MIN_YEAR: i32 = 1900;

/// Latest year accepted today: one past the current UTC year.
pub fn max_year() -> i32 {
    chrono::Utc::now().year() + 1
}

/// Extract plausible years, ascending and de-duplicated.
pub fn extract_years(text: &str) -> BTreeSet<i32> {
    extract_years_until(text, max_year())
}

/// Same as [`extract_years`] with an explicit upper bound (inclusive).
pub fn extract_years_until(text: &str, max_year: i32) -> BTreeSet<i32> {
    let mut years = BTreeSet::new();
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i - run_start != 4 {
            continue;
        }
        // ASCII digits are single bytes, so this slice is always valid UTF-8.
        if let Ok(year) = text[run_start..i].parse::<i32>() {
            if (MIN_YEAR..=max_year).contains(&year) {
                years.insert(year);
            }
        }
    }

    years
}

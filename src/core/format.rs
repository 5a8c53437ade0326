//! Display formatting for balances and refresh timestamps

use chrono::{DateTime, Utc};

pub const UNIT: &str = "QUAI";
const DECIMALS: usize = 18;
const SHOWN_DECIMALS: usize = 4;
pub const JUST_NOW: &str = "just now";

/// Converts a wei-scale integer string into `"<int>.<4 digits> QUAI"`,
/// truncating the fraction. Values that do not parse are returned as
/// `"<raw> (raw)"`.
pub fn format_quai(wei: &str) -> String {
    if wei.is_empty() {
        return "0".to_string();
    }

    let digits = wei.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return format!("{wei} (raw)");
    }

    // Split on the decimal string so values of any width format.
    let digits = digits.trim_start_matches('0');
    let padded = format!("{digits:0>width$}", width = DECIMALS + 1);
    let (whole, fraction) = padded.split_at(padded.len() - DECIMALS);
    format!("{whole}.{} {UNIT}", &fraction[..SHOWN_DECIMALS])
}

/// Numeric part of [`format_quai`], for table cells that print the unit
/// separately.
pub fn format_amount(wei: &str) -> String {
    let formatted = format_quai(wei);
    match formatted.split_once(' ') {
        Some((amount, _)) => amount.to_string(),
        None => formatted,
    }
}

/// Human readable "time since last update" label.
pub fn since_label(now: DateTime<Utc>, last_updated: DateTime<Utc>) -> String {
    let secs = (now - last_updated).num_seconds().max(0);
    elapsed_label(std::time::Duration::from_secs(secs.unsigned_abs()))
}

/// Same thresholds as [`since_label`], from an already measured duration.
pub fn elapsed_label(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 5 {
        JUST_NOW.to_string()
    } else if secs < 60 {
        format!("{secs}s ago")
    } else {
        format!("{}m ago", secs / 60)
    }
}

/// Shortens a hash or address to its first `keep` characters.
pub fn truncate_id(id: &str, keep: usize) -> String {
    match id.char_indices().nth(keep) {
        Some((idx, _)) => format!("{}...", &id[..idx]),
        None => id.to_string(),
    }
}

/// Renders an API unix-seconds string as a calendar date.
pub fn format_tx_date(time_stamp: &str) -> String {
    time_stamp
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map_or_else(|| time_stamp.to_string(), |dt| dt.format("%b %-d, %Y").to_string())
}

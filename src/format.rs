//! Display formatting shared by the HTML views.

use chrono::{Datelike, Duration, NaiveDate};

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Groups the integer digits of `value` in threes: `1234567` -> `1,234,567`.
pub fn format_count(value: u64) -> String {
    group_digits(&value.to_string())
}

/// Whole-dollar amount with thousands separators, e.g. `$1,234,567`.
pub fn format_usd(value: f64) -> String {
    let rounded = value.abs().round();
    let sign = if value < 0.0 && rounded > 0.0 { "-" } else { "" };
    format!("{sign}${}", group_digits(&format!("{rounded:.0}")))
}

/// `$1.23B`, `$4.56M`, else whole dollars.
pub fn format_market_cap_compact(value: f64) -> String {
    if value >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("${:.2}M", value / 1e6)
    } else {
        format_usd(value)
    }
}

/// `abcd...wxyz` for anything longer than 8 characters.
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// `Today`, `Yesterday`, or `Weekday, Month D, YYYY`.
pub fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        return "Today".to_string();
    }
    if Some(date) == today.pred_opt() {
        return "Yesterday".to_string();
    }
    format!(
        "{}, {} {}, {}",
        date.format("%A"),
        date.format("%B"),
        date.day(),
        date.year()
    )
}

/// Shifts a calendar day, saturating at chrono's representable range.
pub fn adjust_date(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(date)
}

fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

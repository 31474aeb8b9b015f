//! Field-value normalisation: heterogeneous record values to display text.
//!
//! Bitable fields arrive in wildly different shapes: plain scalars,
//! member/multi-select arrays, lookup references carrying `{text}` or
//! `{text_arr}` objects, date objects with a `timestamp`. [`to_text`]
//! flattens all of them to a plain string with one fixed priority order, and
//! never fails: an unrecognised shape is an empty string, not an error.
//! Every rule here is a pure function over `serde_json::Value`, tested in
//! isolation below.

use crate::bitable::Fields;
use chrono::{Datelike, FixedOffset, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Convert any field value to display text.
///
/// Rules, in order:
/// - `null` → empty string
/// - string → trimmed
/// - number → decimal string (integral floats print without a fraction)
/// - array → each element converted (primitives pass through, objects via
///   the priority order below), empty parts dropped, joined with a
///   full-width comma
/// - object → first match of `text_arr` (joined), `text`, `name`, `value`
///   (string or number), `timestamp` (number)
/// - anything else → empty string
///
/// Idempotent: re-normalising the output returns the same string.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(_) => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => number_text(n),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|it| match it {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => number_text(n),
                    Value::Object(_) => object_text(it),
                    _ => String::new(),
                })
                .filter(|p| !p.is_empty())
                .collect();
            parts.join("，")
        }
        Value::Object(_) => object_text(value),
    }
}

/// Extract text from a tagged object using the lookup priority order.
fn object_text(value: &Value) -> String {
    if let Some(arr) = value.get("text_arr").and_then(Value::as_array) {
        return arr
            .iter()
            .map(|e| match e {
                Value::String(s) => s.clone(),
                Value::Number(n) => number_text(n),
                _ => String::new(),
            })
            .collect();
    }
    if let Some(s) = value.get("text").and_then(Value::as_str) {
        return s.to_string();
    }
    if let Some(s) = value.get("name").and_then(Value::as_str) {
        return s.to_string();
    }
    match value.get("value") {
        Some(Value::String(s)) => return s.clone(),
        Some(Value::Number(n)) => return number_text(n),
        _ => {}
    }
    if let Some(Value::Number(n)) = value.get("timestamp") {
        return number_text(n);
    }
    String::new()
}

/// Decimal text for a JSON number; integral floats print without ".0".
fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => String::new(),
    }
}

/// First candidate field present on the record, by name.
///
/// Presence is keyed on the field name, not the value: a field that exists
/// but holds `null` still wins over later candidates.
pub fn pick_field<'a>(fields: &'a Fields, candidates: &[&str]) -> Option<&'a Value> {
    candidates.iter().find_map(|k| fields.get(*k))
}

static RE_AMOUNT_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,\s￥¥]").expect("valid regex"));

/// Parse a field value as a numeric amount.
///
/// Strips thousands separators, whitespace, and currency symbols first.
/// Unparseable input is 0, never an error; an absent price renders as an
/// empty cell, not a failed document.
pub fn parse_amount(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => {
            let text = to_text(value);
            let s = RE_AMOUNT_NOISE.replace_all(&text, "");
            s.parse::<f64>().unwrap_or(0.0)
        }
    }
}

/// Format an amount with thousands grouping.
///
/// Zero and unparseable input yield an empty string. Integers are grouped
/// plain; non-integers are grouped with exactly two decimal digits.
pub fn fmt_money_with_comma(value: &Value) -> String {
    let n = parse_amount(value);
    if n == 0.0 || !n.is_finite() {
        return String::new();
    }
    if n.fract() == 0.0 {
        return group_thousands(&format!("{}", n as i64));
    }
    let fixed = format!("{n:.2}");
    match fixed.split_once('.') {
        Some((int_part, frac)) => format!("{}.{}", group_thousands(int_part), frac),
        None => group_thousands(&fixed),
    }
}

/// Insert thousands separators into a decimal integer string.
fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("{sign}{out}")
}

/// Epochs larger than this are millisecond timestamps; smaller are seconds.
const EPOCH_MS_THRESHOLD: f64 = 10_000_000_000.0;

static RE_TRAILING_ZERO_FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.0+$").expect("valid regex"));
static RE_EPOCH_MS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{13}$").expect("valid regex"));
static RE_EPOCH_S: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").expect("valid regex"));
static RE_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})").expect("valid regex"));

/// Format a date field as "<year>年<month>月<day>日" in the Shanghai
/// calendar, month and day unpadded.
///
/// Numbers are epoch milliseconds when above 10,000,000,000, else epoch
/// seconds. Text input is normalised first: trailing ".0…0" suffixes are
/// stripped (lookup fields sometimes deliver "1758…000.0"), 13/10-digit
/// digit strings are re-read as epochs, `YYYY-M-D` / `YYYY/M/D` prefixes
/// are reformatted, and anything else is returned unchanged; free text
/// like an already-descriptive delivery note must survive as-is.
pub fn fmt_date_cn(value: &Value) -> String {
    if let Value::Number(n) = value {
        if let Some(f) = n.as_f64() {
            let ms = if f > EPOCH_MS_THRESHOLD { f } else { f * 1000.0 };
            if let Some(formatted) = format_epoch_ms(ms as i64) {
                return formatted;
            }
        }
    }

    let s0 = to_text(value);
    let s = RE_TRAILING_ZERO_FRACTION.replace(&s0, "").trim().to_string();

    if RE_EPOCH_MS.is_match(&s) {
        if let Some(formatted) = s.parse::<i64>().ok().and_then(format_epoch_ms) {
            return formatted;
        }
    }
    if RE_EPOCH_S.is_match(&s) {
        if let Some(formatted) = s
            .parse::<i64>()
            .ok()
            .and_then(|secs| format_epoch_ms(secs * 1000))
        {
            return formatted;
        }
    }

    if let Some(caps) = RE_YMD.captures(&s) {
        let (y, m, d) = (&caps[1], &caps[2], &caps[3]);
        if let (Ok(m), Ok(d)) = (m.parse::<u32>(), d.parse::<u32>()) {
            return format!("{y}年{m}月{d}日");
        }
    }

    s
}

/// Calendar date in the Shanghai time zone (UTC+8, no DST).
fn format_epoch_ms(ms: i64) -> Option<String> {
    let shanghai = FixedOffset::east_opt(8 * 3600)?;
    let dt = Utc.timestamp_millis_opt(ms).single()?.with_timezone(&shanghai);
    Some(format!("{}年{}月{}日", dt.year(), dt.month(), dt.day()))
}

/// Today's date in the Shanghai calendar, for defaulting the sign date.
pub fn today_cn() -> String {
    format_epoch_ms(Utc::now().timestamp_millis()).unwrap_or_default()
}

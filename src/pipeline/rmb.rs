//! Formal RMB numerals for legal documents.
//!
//! Contract law practice requires the total written in tamper-resistant
//! long-form numerals (大写金额) alongside the arabic figure. The rendering
//! is deterministic: round to the cent, spell the yuan part in base-10000
//! groups (万/亿/兆), then append jiao and fen digits.
//!
//! Zero handling is where every naive implementation goes wrong:
//! - internal zero runs within a 4-digit group collapse to a single 零
//! - trailing zeros in a group are dropped
//! - an all-zero group contributes nothing, but group promotion continues
//! - 整 terminates a whole-yuan amount; a fractional amount never carries a
//!   零 between jiao and fen

const CN_NUM: [&str; 10] = ["零", "壹", "贰", "叁", "肆", "伍", "陆", "柒", "捌", "玖"];
const CN_UNIT: [&str; 4] = ["", "拾", "佰", "仟"];
const CN_GROUP: [&str; 4] = ["", "万", "亿", "兆"];

/// Spell an amount in formal RMB numerals.
///
/// Non-finite input yields an empty string. Input is rounded to the nearest
/// cent first, so `0.999` spells as 壹元整: the document shows what will
/// actually be paid.
pub fn rmb_uppercase(amount: f64) -> String {
    if !amount.is_finite() {
        return String::new();
    }

    let fixed = (amount * 100.0).round() as i64;
    let yuan = (fixed / 100).unsigned_abs();
    let cents = (fixed % 100).unsigned_abs();

    let mut out = spell_integer(yuan);
    out.push_str("元");

    if cents == 0 {
        out.push_str("整");
        return out;
    }

    let jiao = (cents / 10) as usize;
    let fen = (cents % 10) as usize;
    if jiao > 0 {
        out.push_str(CN_NUM[jiao]);
        out.push_str("角");
    }
    if fen > 0 {
        out.push_str(CN_NUM[fen]);
        out.push_str("分");
    }
    out
}

/// Spell the integer yuan part in base-10000 groups.
fn spell_integer(yuan: u64) -> String {
    let digits = yuan.to_string();
    let mut out = String::new();
    let mut group = 0usize;
    let mut end = digits.len();

    while end > 0 {
        let start = end.saturating_sub(4);
        let chunk = &digits[start..end];
        let spelled = spell_chunk(chunk);
        if !spelled.is_empty() {
            out = format!("{}{}{}", spelled, CN_GROUP[group.min(3)], out);
        }
        group += 1;
        end = start;
    }

    if out.is_empty() {
        out.push_str("零");
    }
    out
}

/// Spell one 1–4 digit chunk with positional units, collapsing zero runs.
fn spell_chunk(chunk: &str) -> String {
    let mut out = String::new();
    let mut zero_pending = false;

    for (j, ch) in chunk.chars().enumerate() {
        let n = ch.to_digit(10).unwrap_or(0) as usize;
        let unit_index = chunk.len() - 1 - j;
        if n == 0 {
            zero_pending = true;
        } else {
            if zero_pending {
                out.push_str("零");
            }
            zero_pending = false;
            out.push_str(CN_NUM[n]);
            out.push_str(CN_UNIT[unit_index]);
        }
    }
    out
}

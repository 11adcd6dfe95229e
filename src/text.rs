//! Lenient number parsing for the editable fields.
//!
//! Field text is never rejected: leading whitespace is skipped, digits are
//! consumed up to the first character that isn't one, and anything that
//! doesn't start with a digit reads as 0. Callers then clamp or substitute.

/// parse a hexadecimal number, with or without a `0x` prefix
pub fn parse_hex(text: &str) -> u64 {
    let t = text.trim_start();
    let t = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .unwrap_or(t);
    parse_radix(t, 16)
}

pub fn parse_decimal(text: &str) -> u64 {
    parse_radix(text.trim_start(), 10)
}

fn parse_radix(text: &str, radix: u32) -> u64 {
    text.chars()
        .map_while(|c| c.to_digit(radix))
        .fold(0u64, |acc, d| {
            acc.saturating_mul(radix as u64).saturating_add(d as u64)
        })
}

use std::fmt::Write;

/// Fallback text for unset or out-of-range counters.
pub const NOT_A_NUMBER: &str = "NaN";

const UNITS: [(u64, char); 3] = [(1_000, 'k'), (1_000_000, 'm'), (1_000_000_000, 'b')];

/// "+N" delta text for the summary cards.
///
/// `None` and zero render as `"0"`. Everything else gets a `+` prefix and
/// thousands separators; negative input is shown by magnitude with the same
/// `+` prefix.
pub fn pretty_delta(value: Option<i64>) -> String {
    match value {
        None | Some(0) => "0".to_string(),
        Some(n) => {
            let mut out = String::with_capacity(16);
            out.push('+');
            write_thousands(&mut out, n.unsigned_abs());
            out
        }
    }
}

/// Compact magnitude with one decimal digit: `950`, `12.3k`, `1.2m`, `3.4b`.
///
/// Rounding is half-up on the tenths digit. When rounding reaches `1000.0` of a
/// unit the next unit is used instead (`999_999` is `"1.0m"`). Values below
/// 1000 print as plain integers. `None` and negative input give [`NOT_A_NUMBER`].
pub fn compact_total(value: Option<i64>) -> String {
    let Some(n) = value else {
        return NOT_A_NUMBER.to_string();
    };
    if n < 0 {
        return NOT_A_NUMBER.to_string();
    }
    compact_magnitude(n.unsigned_abs())
}

/// Chart axis text: [`compact_total`] with a leading `-` for negative values
/// instead of the fallback.
pub fn axis_label(value: i64) -> String {
    let magnitude = compact_magnitude(value.unsigned_abs());
    if value < 0 {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

fn compact_magnitude(n: u64) -> String {
    if n < UNITS[0].0 {
        return n.to_string();
    }

    let mut idx = UNITS
        .iter()
        .rposition(|&(unit, _)| n >= unit)
        .unwrap_or(0);
    loop {
        let (unit, suffix) = UNITS[idx];
        let tenths = (n as u128 * 10 + unit as u128 / 2) / unit as u128;
        if tenths >= 10_000 && idx + 1 < UNITS.len() {
            idx += 1;
            continue;
        }
        let mut out = String::with_capacity(8);
        let _ = write!(out, "{}.{}{}", tenths / 10, tenths % 10, suffix);
        return out;
    }
}

/// Signed count with thousands separators, e.g. `-1,234` or `56,789`.
pub fn format_count(value: i64) -> String {
    let mut out = String::with_capacity(16);
    if value < 0 {
        out.push('-');
    }
    write_thousands(&mut out, value.unsigned_abs());
    out
}

/// Unsigned count with comma thousands separators.
pub fn with_thousands(value: u64) -> String {
    let mut out = String::with_capacity(16);
    write_thousands(&mut out, value);
    out
}

fn write_thousands(buf: &mut String, value: u64) {
    let digits = value.to_string();
    let len = digits.len();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            buf.push(',');
        }
        buf.push(ch);
    }
}

//! Shared text normalization for scraped cells.
//!
//! Every numeric cell on the exchange portal goes through [`parse_number`]:
//! thousands separators, percent signs and currency prefixes are stripped,
//! parenthesized values become negative, and magnitude suffixes (including
//! the South-Asian Lakh/Crore pair) are expanded. Empty, dash, or "N/A"
//! tokens parse to `None` — absent is not zero, and the distinction is
//! preserved all the way into the database.

/// First-write-wins: fill `slot` only if it is still unset.
pub fn set_if_absent<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        if let Some(v) = value {
            *slot = Some(v);
        }
    }
}

/// Parse a scraped numeric token, or `None` when the cell carries no value.
pub fn parse_number(raw: &str) -> Option<f64> {
    let mut s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let lower = s.to_lowercase();
    if matches!(lower.as_str(), "-" | "—" | "–" | "n/a" | "na" | "nil" | "null" | "x") {
        return None;
    }

    // Accounting convention: (12.3) means -12.3
    let negative = s.starts_with('(') && s.ends_with(')');
    if negative {
        s = &s[1..s.len() - 1];
    }

    let mut t = s.trim().to_lowercase();
    for prefix in ["rs.", "rs", "pkr", "₨", "$"] {
        if let Some(rest) = t.strip_prefix(prefix) {
            t = rest.trim_start().to_string();
            break;
        }
    }

    let t = t.replace([',', '%'], "");
    let t = t.trim();
    if t.is_empty() {
        return None;
    }

    // Trailing magnitude suffix, e.g. "2.5B", "1.2 Cr"
    let split = t
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphabetic())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(t.len());
    let (num_part, suffix) = t.split_at(split);

    let multiplier = match suffix {
        "" => 1.0,
        "k" => 1e3,
        "m" | "mn" => 1e6,
        "b" | "bn" => 1e9,
        "l" | "lac" | "lakh" => 1e5,
        "cr" | "crore" => 1e7,
        _ => return None,
    };

    let value: f64 = num_part.trim().parse().ok()?;
    let value = value * multiplier;
    Some(if negative { -value } else { value })
}

/// Integer variant for share/volume counts.
pub fn parse_count(raw: &str) -> Option<i64> {
    parse_number(raw).map(|v| v.round() as i64)
}

/// Normalize a scraped label for fragment matching: lowercase, collapse
/// internal whitespace, trim a trailing colon.
pub fn normalise_label(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let collapsed: String = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches(':').trim().to_string()
}

pub fn normalise_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

/// `Some` only when the trimmed text is non-empty.
pub fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_currency_prefix() {
        assert_eq!(parse_number("Rs. 1,234.50"), Some(1234.50));
        assert_eq!(parse_number("PKR 610.00"), Some(610.0));
        assert_eq!(parse_number("$12.5"), Some(12.5));
    }

    #[test]
    fn test_parse_number_parenthesized_is_negative() {
        assert_eq!(parse_number("(12.3)"), Some(-12.3));
        assert_eq!(parse_number("(1,000)"), Some(-1000.0));
    }

    #[test]
    fn test_parse_number_magnitude_suffixes() {
        assert_eq!(parse_number("2.5B"), Some(2_500_000_000.0));
        assert_eq!(parse_number("1.2M"), Some(1_200_000.0));
        assert_eq!(parse_number("345K"), Some(345_000.0));
        assert_eq!(parse_number("3 Lakh"), Some(300_000.0));
        assert_eq!(parse_number("2.5 Cr"), Some(25_000_000.0));
        assert_eq!(parse_number("1.5Bn"), Some(1_500_000_000.0));
    }

    #[test]
    fn test_parse_number_absent_tokens() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("—"), None);
        assert_eq!(parse_number("N/A"), None);
        assert_eq!(parse_number("  "), None);
    }

    #[test]
    fn test_parse_number_zero_is_not_absent() {
        assert_eq!(parse_number("0"), Some(0.0));
        assert_eq!(parse_number("0.00"), Some(0.0));
    }

    #[test]
    fn test_parse_number_percent_and_negatives() {
        assert_eq!(parse_number("1.50%"), Some(1.5));
        assert_eq!(parse_number("-4.25"), Some(-4.25));
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("10,000"), Some(10_000));
        assert_eq!(parse_count("1.2M"), Some(1_200_000));
        assert_eq!(parse_count("-"), None);
    }

    #[test]
    fn test_set_if_absent_never_overwrites() {
        let mut slot = None;
        set_if_absent(&mut slot, Some(1.0));
        set_if_absent(&mut slot, Some(2.0));
        assert_eq!(slot, Some(1.0));

        let mut empty: Option<f64> = None;
        set_if_absent(&mut empty, None);
        assert_eq!(empty, None);
    }

    #[test]
    fn test_normalise_label() {
        assert_eq!(normalise_label("  P/E  Ratio : "), "p/e ratio");
        assert_eq!(normalise_label("Market\tCap"), "market cap");
    }
}

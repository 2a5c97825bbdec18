//! Display formatting for money, percentages and face amounts

/// Insert thousands separators into a non-negative integer
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Whole-dollar USD, e.g. `1234.0` -> `"$1,234"`
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.abs().round() as u64;
    let sign = if amount < 0.0 && rounded > 0 { "-" } else { "" };
    format!("{}${}", sign, group_thousands(rounded))
}

/// USD with cents, e.g. `1234.5` -> `"$1,234.50"`
pub fn format_currency_cents(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, group_thousands(cents / 100), cents % 100)
}

/// Ratio as a whole percentage, e.g. `0.856` -> `"86%"`
pub fn format_percentage(value: f64) -> String {
    format!("{}%", (value * 100.0).round() as i64)
}

/// Compact face amount label used on rate grids: `$1M`, `$250k`
pub fn format_face_amount(amount: f64) -> String {
    if amount >= 1_000_000.0 {
        format!("${}M", amount / 1_000_000.0)
    } else {
        format!("${}k", amount / 1_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency_whole_dollars() {
        assert_eq!(format_currency(1234.0), "$1,234");
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(250000.0), "$250,000");
        assert_eq!(format_currency(1234.6), "$1,235");
        assert_eq!(format_currency(-1500.0), "-$1,500");
    }

    #[test]
    fn test_format_currency_cents() {
        assert_eq!(format_currency_cents(1234.5), "$1,234.50");
        assert_eq!(format_currency_cents(42.0), "$42.00");
        assert_eq!(format_currency_cents(1_000_000.129), "$1,000,000.13");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.856), "86%");
        assert_eq!(format_percentage(0.95), "95%");
        assert_eq!(format_percentage(0.0), "0%");
    }

    #[test]
    fn test_format_face_amount() {
        assert_eq!(format_face_amount(1_000_000.0), "$1M");
        assert_eq!(format_face_amount(1_500_000.0), "$1.5M");
        assert_eq!(format_face_amount(250_000.0), "$250k");
        assert_eq!(format_face_amount(25_000.0), "$25k");
    }
}

use thiserror::Error;

/// Amounts are integer minor units with two decimal places: 40.00 is stored as 4000.
/// Log entries carry the sign (positive = credit, negative = debit).
pub type Cents = i64;

const SCALE: i64 = 100;

/// Render cents as a plain decimal string, e.g. 4000 -> "40.00", -5 -> "-0.05".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / SCALE as u64, abs % SCALE as u64)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCentsError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount '{0}', expected a number like 50 or 50.25")]
    InvalidFormat(String),

    #[error("amount '{0}' has more than two decimal places")]
    TooPrecise(String),

    #[error("amount '{0}' is out of range")]
    Overflow(String),
}

/// Parse a decimal amount into cents.
///
/// Accepts an optional leading minus, an integer part and up to two fractional digits
/// ("50", "50.5", "50.05", ".75"). More precision is rejected rather than silently rounded.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseCentsError::Empty);
    }

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (whole, fraction) = match body.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (body, ""),
    };

    let invalid = || ParseCentsError::InvalidFormat(trimmed.to_string());

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if fraction.len() > 2 {
        return Err(ParseCentsError::TooPrecise(trimmed.to_string()));
    }

    let overflow = || ParseCentsError::Overflow(trimmed.to_string());

    let units: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let minor: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    let cents = units
        .checked_mul(SCALE)
        .and_then(|c| c.checked_add(minor))
        .ok_or_else(overflow)?;

    Ok(if negative { -cents } else { cents })
}

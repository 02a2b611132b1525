// Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::models::draft::NumberInput;

/// Accepted shape of a numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Integer,
    Decimal,
}

/// Outcome of checking one numeric field, in required → type → range order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberCheck {
    Missing,
    NotANumber,
    OutOfRange,
    Ok(f64),
}

pub fn check_number(
    input: Option<&NumberInput>,
    kind: NumberKind,
    min: f64,
    max: f64,
) -> NumberCheck {
    let Some(input) = input else {
        return NumberCheck::Missing;
    };
    if input.is_blank() {
        return NumberCheck::Missing;
    }

    let value = match kind {
        NumberKind::Integer => input.integer().map(|v| v as f64),
        NumberKind::Decimal => input.value(),
    };
    match value {
        None => NumberCheck::NotANumber,
        Some(v) if v < min || v > max => NumberCheck::OutOfRange,
        Some(v) => NumberCheck::Ok(v),
    }
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| match Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$") {
            Ok(re) => Some(re),
            Err(e) => {
                log::error!("[PHASE: validation] Failed to compile e-mail regex: {}", e);
                None
            }
        })
        .as_ref()
}

/// Basic `local@domain.tld` shape check (no whitespace, one `@`, a dot in the domain).
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(email))
}

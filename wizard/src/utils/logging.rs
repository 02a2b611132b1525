// Logging utilities
// Structured logging with JSON and human-readable formats

use log::Level;
use serde_json::json;

/// Mask a sensitive value, keeping the first and last four characters of long values.
pub fn mask_sensitive(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }

    let start: String = chars[..4].iter().collect();
    let end: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", start, end)
}

/// Mask an e-mail address: `jana.novakova@example.cz` -> `j***@example.cz`.
///
/// The domain stays visible for troubleshooting delivery problems.
pub fn mask_email(email: &str) -> String {
    let e = email.trim();
    if e.is_empty() {
        return String::new();
    }
    match e.rsplit_once('@') {
        Some(("", _)) => "***".to_string(),
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        None => mask_sensitive(e),
    }
}

/// Remove one `[TAG: value]` marker from `message`, returning the value and the rest.
fn take_tag(message: &str, tag: &str) -> Option<(String, String)> {
    let open = format!("[{}:", tag);
    let start = message.find(&open)?;
    let end = start + message[start..].find(']')?;
    let value = message[start + open.len()..end].trim().to_string();
    let rest = format!("{} {}", &message[..start], &message[end + 1..])
        .trim()
        .to_string();
    Some((value, rest))
}

/// Parse phase and step from log message
/// Extracts [PHASE: ...] and [STEP: ...] patterns
pub fn parse_log_metadata(message: &str) -> (Option<String>, Option<String>, String) {
    let mut cleaned = message.to_string();

    let phase = take_tag(&cleaned, "PHASE").map(|(value, rest)| {
        cleaned = rest;
        value
    });
    let step = take_tag(&cleaned, "STEP").map(|(value, rest)| {
        cleaned = rest;
        value
    });

    (phase, step, cleaned)
}

/// Format log entry as JSON for structured logging
pub fn format_json_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
    session: Option<&str>,
) -> String {
    let mut log_entry = json!({
        "timestamp": timestamp,
        "level": level.as_str(),
        "target": target,
        "message": message,
    });

    if let Some(phase) = phase {
        log_entry["phase"] = json!(phase);
    }

    if let Some(step) = step {
        log_entry["step"] = json!(step);
    }

    if let Some(session) = session {
        log_entry["session"] = json!(session);
    }

    serde_json::to_string(&log_entry).unwrap_or_else(|_| "{}".to_string())
}

/// Format log entry as human-readable text
pub fn format_human_readable_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut log_line = format!("[{}] [{}]", timestamp, level.as_str());

    if let Some(phase) = phase {
        log_line.push_str(&format!(" [PHASE: {}]", phase));
    }

    if let Some(step) = step {
        log_line.push_str(&format!(" [STEP: {}]", step));
    }

    log_line.push_str(&format!(" [{}] {}", target, message));
    log_line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_email_keeps_domain_only() {
        let masked = mask_email("jana.novakova@example.cz");
        assert_eq!(masked, "j***@example.cz");
        assert!(!masked.contains("novakova"));
    }

    #[test]
    fn mask_email_handles_odd_input() {
        assert_eq!(mask_email("   "), "");
        assert_eq!(mask_email("@example.cz"), "***");
        assert_eq!(mask_email("not-an-address-at-all"), "not-...-all");
    }

    #[test]
    fn mask_sensitive_is_char_safe() {
        assert_eq!(mask_sensitive("abc"), "***");
        assert_eq!(mask_sensitive("žluťoučký kůň"), "žluť... kůň");
    }

    #[test]
    fn parse_log_metadata_extracts_phase_and_step() {
        let (phase, step, msg) =
            parse_log_metadata("[PHASE: navigation] [STEP: go_next] Moved to step 3");
        assert_eq!(phase.as_deref(), Some("navigation"));
        assert_eq!(step.as_deref(), Some("go_next"));
        assert_eq!(msg, "Moved to step 3");
    }

    #[test]
    fn parse_log_metadata_without_tags_is_passthrough() {
        let (phase, step, msg) = parse_log_metadata("plain message");
        assert_eq!(phase, None);
        assert_eq!(step, None);
        assert_eq!(msg, "plain message");
    }

    #[test]
    fn json_log_includes_optional_fields() {
        let line = format_json_log(
            "2026-01-01T00:00:00Z",
            Level::Info,
            "fitplan_wizard",
            "Draft saved",
            Some("persistence"),
            None,
            Some("5f1c"),
        );
        let v: serde_json::Value = serde_json::from_str(&line).expect("valid json");
        assert_eq!(v["phase"], "persistence");
        assert_eq!(v["session"], "5f1c");
        assert!(v.get("step").is_none());
    }

    #[test]
    fn human_readable_log_layout() {
        let line = format_human_readable_log(
            "2026-01-01 00:00:00.000",
            Level::Warn,
            "fitplan_wizard::api",
            "Catalog unavailable",
            Some("assets"),
            Some("catalog"),
        );
        assert_eq!(
            line,
            "[2026-01-01 00:00:00.000] [WARN] [PHASE: assets] [STEP: catalog] [fitplan_wizard::api] Catalog unavailable"
        );
    }
}

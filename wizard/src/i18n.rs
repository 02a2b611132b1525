// Localization
//
// Dictionaries are nested JSON objects addressed by dotted keys (`common.error_required`).
// Missing keys fall back to the English dictionary.

use log::{info, warn};
use serde_json::Value;

use crate::api::assets::AssetSource;

pub const SUPPORTED: [&str; 9] = ["cs", "sk", "en", "de", "pt", "es", "it", "pl", "fr"];
pub const DEFAULT_LANG: &str = "cs";
pub const FALLBACK_LANG: &str = "en";

/// Translation lookup used by validators and the controller.
pub trait Translate: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;

    fn lang(&self) -> &str;

    /// Translated text, or the key itself when no dictionary has it.
    fn t(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_else(|| key.to_string())
    }
}

pub fn is_supported(lang: &str) -> bool {
    SUPPORTED.contains(&lang)
}

/// Pick the session language: explicit query value, then the stored choice, then the first
/// supported accepted language (`de-AT` matches `de`), then the default.
pub fn detect_lang<'a>(
    query: Option<&str>,
    stored: Option<&str>,
    accepted: impl IntoIterator<Item = &'a str>,
    default_lang: &str,
) -> String {
    if let Some(lang) = query.filter(|l| is_supported(l)) {
        return lang.to_string();
    }
    if let Some(lang) = stored.filter(|l| is_supported(l)) {
        return lang.to_string();
    }
    for candidate in accepted {
        let prefix: String = candidate.chars().take(2).collect::<String>().to_ascii_lowercase();
        if is_supported(&prefix) {
            return prefix;
        }
    }
    if is_supported(default_lang) {
        default_lang.to_string()
    } else {
        DEFAULT_LANG.to_string()
    }
}

/// Language tags from the process locale (`LANGUAGE`, `LC_ALL`, `LANG`).
pub fn env_languages() -> Vec<String> {
    let mut langs = Vec::new();
    for var in ["LANGUAGE", "LC_ALL", "LANG"] {
        if let Ok(value) = std::env::var(var) {
            for part in value.split(':') {
                let tag = part.split(['.', '@']).next().unwrap_or_default().trim();
                if !tag.is_empty() && tag != "C" && tag != "POSIX" {
                    langs.push(tag.replace('_', "-"));
                }
            }
        }
    }
    langs
}

/// Support address shown on the review step and error pages.
pub fn contact_email_for(lang: &str) -> &'static str {
    match lang {
        "cs" => "info@fitlime.cz",
        "sk" => "info@fitlime.sk",
        _ => "info@fitlime.eu",
    }
}

#[derive(Debug, Clone)]
pub struct Localizer {
    lang: String,
    dict: Value,
    fallback: Value,
}

impl Localizer {
    pub fn new(lang: &str, dict: Value, fallback: Value) -> Self {
        let lang = if is_supported(lang) { lang } else { DEFAULT_LANG };
        Self {
            lang: lang.to_string(),
            dict,
            fallback,
        }
    }

    /// Localizer without dictionaries; every lookup misses.
    pub fn empty(lang: &str) -> Self {
        Self::new(lang, Value::Null, Value::Null)
    }

    /// Load the dictionary for `lang` plus the English fallback. Failures are logged and
    /// leave the corresponding dictionary empty.
    pub async fn load(source: &dyn AssetSource, lang: &str) -> Self {
        let lang = if is_supported(lang) { lang } else { DEFAULT_LANG };

        let fallback = match source.dictionary(FALLBACK_LANG).await {
            Ok(v) => v,
            Err(e) => {
                warn!("[PHASE: i18n] [STEP: fallback] Fallback dictionary load failed: {}", e);
                Value::Null
            }
        };

        let dict = if lang == FALLBACK_LANG {
            fallback.clone()
        } else {
            match source.dictionary(lang).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        "[PHASE: i18n] [STEP: dictionary] Dictionary '{}' load failed: {}",
                        lang, e
                    );
                    Value::Null
                }
            }
        };

        info!("[PHASE: i18n] [STEP: dictionary] Language set to '{}'", lang);
        Self::new(lang, dict, fallback)
    }
}

fn get_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(root, |node, part| node.get(part))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Translate for Localizer {
    fn lookup(&self, key: &str) -> Option<String> {
        get_path(&self.dict, key)
            .and_then(as_text)
            .or_else(|| get_path(&self.fallback, key).and_then(as_text))
    }

    fn lang(&self) -> &str {
        &self.lang
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_lookup_with_english_fallback() {
        let t = Localizer::new(
            "cs",
            json!({ "common": { "next": "Další" } }),
            json!({ "common": { "next": "Next", "back": "Back" } }),
        );
        assert_eq!(t.lookup("common.next").as_deref(), Some("Další"));
        assert_eq!(t.lookup("common.back").as_deref(), Some("Back"));
        assert_eq!(t.lookup("common.missing"), None);
        assert_eq!(t.t("common.missing"), "common.missing");
        assert_eq!(t.lang(), "cs");
    }

    #[test]
    fn unsupported_language_becomes_default() {
        assert_eq!(Localizer::empty("xx").lang(), DEFAULT_LANG);
    }

    #[test]
    fn detect_lang_priority() {
        assert_eq!(detect_lang(Some("de"), Some("sk"), ["en"], "cs"), "de");
        assert_eq!(detect_lang(Some("xx"), Some("sk"), ["en"], "cs"), "sk");
        assert_eq!(detect_lang(None, None, ["ru-RU", "pl-PL"], "cs"), "pl");
        assert_eq!(detect_lang(None, None, ["ru"], "cs"), "cs");
        assert_eq!(detect_lang(None, None, Vec::<&str>::new(), "zz"), DEFAULT_LANG);
    }

    #[test]
    fn contact_email_by_language() {
        assert_eq!(contact_email_for("cs"), "info@fitlime.cz");
        assert_eq!(contact_email_for("sk"), "info@fitlime.sk");
        assert_eq!(contact_email_for("de"), "info@fitlime.eu");
    }
}

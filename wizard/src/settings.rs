// Runtime settings
//
// Layered: built-in defaults, then an optional `fitplan-wizard.toml`, then `FITPLAN_WIZARD_*`
// environment variables (e.g. `FITPLAN_WIZARD_API_BASE_URL`).

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "fitplan-wizard.toml";
pub const ENV_PREFIX: &str = "FITPLAN_WIZARD";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub assets_base_url: String,
    /// Read step markup and dictionaries from this folder instead of `assets_base_url`.
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Page the wizard lives on; `?step=N` is mirrored into its query.
    pub start_url: String,
    pub default_lang: String,
    pub settle_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Settings {
    /// Defaults, `./fitplan-wizard.toml` or the one next to the binary, then the process env.
    pub fn load() -> Result<Self> {
        let local = PathBuf::from(SETTINGS_FILE);
        let file = if local.exists() {
            local
        } else {
            crate::utils::path_resolver::resolve_deployment_folder().join(SETTINGS_FILE)
        };
        Self::load_from(Some(&file), None)
    }

    /// `env` replaces the process environment when given.
    pub fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("api_base_url", "http://localhost:8000/api")?
            .set_default("assets_base_url", "http://localhost:8000/")?
            .set_default("start_url", "http://localhost:8000/wizard.html")?
            .set_default("default_lang", crate::i18n::DEFAULT_LANG)?
            .set_default("settle_delay_ms", 150_i64)?
            .set_default("request_timeout_secs", 15_i64)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let settings: Settings = builder
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;
        Ok(settings)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_file_or_env() {
        let settings = Settings::load_from(None, Some(HashMap::new())).expect("settings");
        assert_eq!(settings.api_base_url, "http://localhost:8000/api");
        assert_eq!(settings.default_lang, "cs");
        assert_eq!(settings.settle_delay(), Duration::from_millis(150));
        assert_eq!(settings.assets_dir, None);
        assert_eq!(settings.data_dir, None);
    }

    #[test]
    fn file_then_env_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            "api_base_url = \"https://api.fitplan.example\"\nsettle_delay_ms = 0\ndata_dir = \"/var/lib/fitplan\"\n",
        )
        .expect("write");

        let mut env = HashMap::new();
        env.insert(
            "FITPLAN_WIZARD_API_BASE_URL".to_string(),
            "https://staging.fitplan.example".to_string(),
        );
        env.insert("FITPLAN_WIZARD_REQUEST_TIMEOUT_SECS".to_string(), "30".to_string());

        let settings = Settings::load_from(Some(&path), Some(env)).expect("settings");
        assert_eq!(settings.api_base_url, "https://staging.fitplan.example");
        assert_eq!(settings.settle_delay_ms, 0);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.data_dir, Some(PathBuf::from("/var/lib/fitplan")));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let settings = Settings::load_from(Some(Path::new("/nonexistent/fitplan-wizard.toml")), Some(HashMap::new()))
            .expect("settings");
        assert_eq!(settings.request_timeout_secs, 15);
    }
}

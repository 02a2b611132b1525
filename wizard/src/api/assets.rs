// Step assets
//
// Markup for each step, the sports catalog and the translation dictionaries are fetched from
// the static asset host (or a local directory in headless/offline runs).

use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use super::{join_url, ApiError};
use crate::models::catalog::SportsCatalog;
use crate::wizard::steps::Step;

/// Source of the static wizard assets.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Raw markup of a step (`steps/NN-name.html`).
    async fn step_markup(&self, step: Step) -> Result<String, ApiError>;

    /// Sports catalog (`sports/catalog.json`).
    async fn sports_catalog(&self) -> Result<SportsCatalog, ApiError>;

    /// Translation dictionary (`i18n/<lang>.json`).
    async fn dictionary(&self, lang: &str) -> Result<serde_json::Value, ApiError>;
}

pub fn catalog_path() -> &'static str {
    "sports/catalog.json"
}

pub fn dictionary_path(lang: &str) -> String {
    format!("i18n/{}.json", lang)
}

// =============================================================================
// HTTP
// =============================================================================

pub struct HttpAssetSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpAssetSource {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| anyhow::anyhow!("Invalid assets base URL '{}': {}", base_url, e))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let url = join_url(&self.base, path)?;
        let resp = self
            .client
            .get(url.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        debug!(
            "[PHASE: assets] [STEP: fetch] GET {} -> {}",
            url,
            resp.status()
        );

        if !resp.status().is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
                detail: resp
                    .status()
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.get(path).await?;
        let url = resp.url().to_string();
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                url,
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn step_markup(&self, step: Step) -> Result<String, ApiError> {
        let resp = self.get(step.markup_path()).await?;
        let url = resp.url().to_string();
        resp.text()
            .await
            .map_err(|source| ApiError::Transport { url, source })
    }

    async fn sports_catalog(&self) -> Result<SportsCatalog, ApiError> {
        self.get_json(catalog_path()).await
    }

    async fn dictionary(&self, lang: &str) -> Result<serde_json::Value, ApiError> {
        self.get_json(&dictionary_path(lang)).await
    }
}

// =============================================================================
// Local directory
// =============================================================================

/// Serves the same relative layout from a directory on disk.
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read(&self, rel: &str) -> Result<String, ApiError> {
        let path = self.root.join(rel);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ApiError::Io {
                path: path.display().to_string(),
                source,
            })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, rel: &str) -> Result<T, ApiError> {
        let raw = self.read(rel).await?;
        serde_json::from_str(&raw).map_err(|e| ApiError::InvalidResponse {
            url: self.root.join(rel).display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl AssetSource for DirAssetSource {
    async fn step_markup(&self, step: Step) -> Result<String, ApiError> {
        self.read(step.markup_path()).await
    }

    async fn sports_catalog(&self) -> Result<SportsCatalog, ApiError> {
        self.read_json(catalog_path()).await
    }

    async fn dictionary(&self, lang: &str) -> Result<serde_json::Value, ApiError> {
        self.read_json(&dictionary_path(lang)).await
    }
}

// =============================================================================
// Catalog cache
// =============================================================================

/// Loads the sports catalog once per session.
///
/// A failed load is not cached: the caller gets an empty catalog and the next step entry
/// tries again.
#[derive(Debug, Default)]
pub struct CatalogCache {
    catalog: OnceCell<SportsCatalog>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, source: &dyn AssetSource) -> SportsCatalog {
        let loaded = self
            .catalog
            .get_or_try_init(|| async {
                let catalog = source.sports_catalog().await?;
                info!(
                    "[PHASE: assets] [STEP: catalog] Sports catalog loaded ({} sports)",
                    catalog.grouped().values().map(Vec::len).sum::<usize>()
                );
                Ok::<_, ApiError>(catalog)
            })
            .await;

        match loaded {
            Ok(catalog) => catalog.clone(),
            Err(e) => {
                warn!(
                    "[PHASE: assets] [STEP: catalog] Sports catalog unavailable, using empty catalog: {}",
                    e
                );
                SportsCatalog::default()
            }
        }
    }

    /// Cached catalog without fetching.
    pub fn cached(&self) -> Option<&SportsCatalog> {
        self.catalog.get()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// In-memory asset source for controller/history tests.
    pub struct StubAssets {
        pub failing_steps: Mutex<Vec<Step>>,
        pub catalog: Option<SportsCatalog>,
        pub dictionaries: HashMap<String, serde_json::Value>,
        pub catalog_calls: AtomicU32,
        pub markup_calls: AtomicU32,
    }

    impl StubAssets {
        pub fn new() -> Self {
            Self {
                failing_steps: Mutex::new(Vec::new()),
                catalog: Some(SportsCatalog::default()),
                dictionaries: HashMap::new(),
                catalog_calls: AtomicU32::new(0),
                markup_calls: AtomicU32::new(0),
            }
        }

        pub fn with_catalog(mut self, catalog: SportsCatalog) -> Self {
            self.catalog = Some(catalog);
            self
        }

        pub fn without_catalog(mut self) -> Self {
            self.catalog = None;
            self
        }

        pub fn fail_step(&self, step: Step) {
            if let Ok(mut failing) = self.failing_steps.lock() {
                failing.push(step);
            }
        }
    }

    #[async_trait]
    impl AssetSource for StubAssets {
        async fn step_markup(&self, step: Step) -> Result<String, ApiError> {
            self.markup_calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failing_steps
                .lock()
                .map(|f| f.contains(&step))
                .unwrap_or(false);
            if failing {
                return Err(ApiError::Status {
                    url: step.markup_path().to_string(),
                    status: 404,
                    detail: "Not Found".to_string(),
                });
            }
            Ok(format!("<section data-step=\"{}\"></section>", step.index()))
        }

        async fn sports_catalog(&self) -> Result<SportsCatalog, ApiError> {
            self.catalog_calls.fetch_add(1, Ordering::SeqCst);
            self.catalog.clone().ok_or_else(|| ApiError::Status {
                url: catalog_path().to_string(),
                status: 503,
                detail: "Service Unavailable".to_string(),
            })
        }

        async fn dictionary(&self, lang: &str) -> Result<serde_json::Value, ApiError> {
            self.dictionaries
                .get(lang)
                .cloned()
                .ok_or_else(|| ApiError::Status {
                    url: dictionary_path(lang),
                    status: 404,
                    detail: "Not Found".to_string(),
                })
        }
    }

    #[tokio::test]
    async fn catalog_cache_loads_once() {
        let source = StubAssets::new();
        let cache = CatalogCache::new();
        let _ = cache.get(&source).await;
        let _ = cache.get(&source).await;
        assert_eq!(source.catalog_calls.load(Ordering::SeqCst), 1);
        assert!(cache.cached().is_some());
    }

    #[tokio::test]
    async fn catalog_failure_is_not_cached() {
        let source = StubAssets::new().without_catalog();
        let cache = CatalogCache::new();
        assert!(cache.get(&source).await.is_empty());
        assert!(cache.get(&source).await.is_empty());
        assert_eq!(source.catalog_calls.load(Ordering::SeqCst), 2);
        assert!(cache.cached().is_none());
    }

    #[tokio::test]
    async fn dir_source_reads_relative_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("steps")).expect("mkdir");
        std::fs::create_dir_all(dir.path().join("sports")).expect("mkdir");
        std::fs::write(dir.path().join("steps/02-goal.html"), "<h1>Goal</h1>").expect("write");
        std::fs::write(
            dir.path().join("sports/catalog.json"),
            r#"{"running": {"labels": {"en": "Running"}}}"#,
        )
        .expect("write");

        let source = DirAssetSource::new(dir.path());
        assert_eq!(
            source.step_markup(Step::Goal).await.expect("markup"),
            "<h1>Goal</h1>"
        );
        assert_eq!(
            source.sports_catalog().await.expect("catalog").label("running", "cs"),
            "Running"
        );
        assert!(matches!(
            source.step_markup(Step::Plan).await,
            Err(ApiError::Io { .. })
        ));
    }
}

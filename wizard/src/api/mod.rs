// HTTP collaborators: step assets (markup, sports catalog, dictionaries) and order submission.

pub mod assets;
pub mod orders;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {detail}")]
    Status {
        url: String,
        status: u16,
        detail: String,
    },

    #[error("invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL {0}")]
    Url(String),
}

/// Join a relative path onto a base URL, treating the base as a directory.
pub(crate) fn join_url(base: &url::Url, path: &str) -> Result<url::Url, ApiError> {
    let mut dir = base.clone();
    if !dir.path().ends_with('/') {
        let with_slash = format!("{}/", dir.path());
        dir.set_path(&with_slash);
    }
    dir.join(path.trim_start_matches('/'))
        .map_err(|e| ApiError::Url(format!("{}{}: {}", base, path, e)))
}

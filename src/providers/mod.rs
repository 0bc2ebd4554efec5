//! Audio source providers.
//!
//! The cascade depends on the [`AudioProvider`] trait rather than on the
//! concrete upstream clients, so each provider owns its request shape,
//! response parsing, and failure handling.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::AppConfig;
use crate::instances::InstanceDirectory;

pub mod metadata;
pub mod mirror;
pub mod paid;

/// Upstream that produced a resolved URL, in cascade priority order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceName {
    /// Free metadata-matched lookup.
    Primary,
    /// Free mirror-based lookup.
    Secondary,
    /// Paid API fallback.
    Tertiary,
}

impl SourceName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
        }
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated track identity submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionRequest {
    pub video_id: Option<String>,
    pub free_text_query: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration_seconds: Option<f64>,
}

impl ResolutionRequest {
    /// Free-text query, falling back to `"<title> <artist>"`.
    pub fn search_query(&self) -> Option<String> {
        if let Some(q) = &self.free_text_query {
            return Some(q.clone());
        }
        match (&self.title, &self.artist) {
            (Some(title), Some(artist)) => Some(format!("{title} {artist}")),
            _ => None,
        }
    }
}

/// A playable URL plus whatever metadata the winning upstream reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAudio {
    pub url: String,
    #[serde(rename = "source")]
    pub source_name: SourceName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_instance: Option<String>,
    /// Bits per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl ResolvedAudio {
    pub fn new(url: impl Into<String>, source_name: SourceName) -> Self {
        Self {
            url: url.into(),
            source_name,
            mirror_instance: None,
            bitrate: None,
            quality: None,
            container: None,
            format_tag: None,
            title: None,
            artist: None,
            duration_seconds: None,
        }
    }
}

/// Why a single provider produced no result. Never surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream timed out")]
    Timeout,
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("malformed upstream response: {0}")]
    Parse(String),
    #[error("no usable match: {0}")]
    NoMatch(String),
    /// The provider turned out to lack the input it needs, e.g. no
    /// identifier could be resolved. Not counted as an attempt.
    #[error("provider not applicable: {0}")]
    Inapplicable(String),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<ProviderError>,
    },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Contract implemented by every upstream in the cascade.
#[async_trait]
pub trait AudioProvider: Send + Sync {
    fn source(&self) -> SourceName;

    /// Whether the request carries enough data for this provider to try.
    fn is_applicable(&self, req: &ResolutionRequest) -> bool;

    /// Attempts resolution; failures are reported, never panicked or retried
    /// beyond the provider's own fixed budget.
    async fn resolve(&self, req: &ResolutionRequest) -> Result<ResolvedAudio, ProviderError>;
}

/// Builds the providers in cascade priority order.
pub fn build_providers(
    cfg: &AppConfig,
    http: reqwest::Client,
    directory: Arc<InstanceDirectory>,
) -> Vec<Arc<dyn AudioProvider>> {
    vec![
        Arc::new(metadata::MetadataMatchProvider::new(http.clone(), cfg.primary.clone())),
        Arc::new(mirror::MirrorProvider::new(http.clone(), directory, cfg.mirror.clone())),
        Arc::new(paid::PaidApiProvider::new(http, cfg.tertiary.clone())),
    ]
}

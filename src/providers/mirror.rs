//! Mirror-based provider.
//!
//! Talks to interchangeable mirror instances exposing an
//! `/api/v1/search` and `/api/v1/videos/{id}` surface. Every call goes to a
//! freshly picked mirror, except that the detail lookup first prefers the
//! mirror that answered the search.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::MirrorConfig;
use crate::formats::FormatDescriptor;
use crate::instances::InstanceDirectory;
use crate::providers::{AudioProvider, ProviderError, ResolutionRequest, ResolvedAudio, SourceName};
use crate::rewrite::rewrite_to_mirror;

pub const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetail {
    title: Option<String>,
    author: Option<String>,
    #[serde(default)]
    adaptive_formats: Vec<WireFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFormat {
    #[serde(default)]
    url: String,
    container: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    bitrate: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    itag: Option<String>,
    audio_quality: Option<String>,
    #[serde(rename = "type")]
    mime_type: Option<String>,
}

impl From<WireFormat> for FormatDescriptor {
    fn from(wire: WireFormat) -> Self {
        Self {
            url: wire.url,
            container: wire.container,
            bitrate: wire.bitrate,
            tag: wire.itag,
            quality: wire.audio_quality,
            mime_type: wire.mime_type,
        }
    }
}

/// Mirrors disagree on whether numbers are JSON numbers or strings.
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_u64()),
        Some(serde_json::Value::String(s)) => Ok(s.trim().parse().ok()),
        Some(other) => Err(de::Error::custom(format!("unexpected bitrate {other}"))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("unexpected tag {other}"))),
    }
}

pub struct MirrorProvider {
    http: reqwest::Client,
    directory: Arc<InstanceDirectory>,
    cfg: MirrorConfig,
}

impl MirrorProvider {
    pub fn new(http: reqwest::Client, directory: Arc<InstanceDirectory>, cfg: MirrorConfig) -> Self {
        Self {
            http,
            directory,
            cfg,
        }
    }

    /// Finds a video identifier for `query`, returning it with the mirror
    /// that answered.
    async fn search(&self, query: &str) -> Result<(String, String), ProviderError> {
        let mut last = ProviderError::NoMatch("no search attempted".to_string());
        for attempt in 1..=MAX_ATTEMPTS {
            let mirror = self.directory.pick_current().await;
            match self.search_on(&mirror, query).await {
                Ok(video_id) => return Ok((video_id, mirror)),
                Err(err) => {
                    warn!(mirror = %mirror, attempt, error = %err, "mirror search failed");
                    last = err;
                }
            }
        }
        Err(ProviderError::Exhausted {
            attempts: MAX_ATTEMPTS,
            last: Box::new(last),
        })
    }

    async fn search_on(&self, mirror: &str, query: &str) -> Result<String, ProviderError> {
        let response = self
            .http
            .get(format!("{}/api/v1/search", mirror.trim_end_matches('/')))
            .query(&[("q", query), ("type", "video")])
            .timeout(self.cfg.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let items = response.json::<Vec<SearchItem>>().await?;
        items
            .into_iter()
            .find_map(|item| item.video_id.filter(|id| !id.is_empty()))
            .ok_or_else(|| ProviderError::NoMatch(format!("no search results for {query:?}")))
    }

    /// Fetches detail for `video_id` and selects one format. The first
    /// attempt goes to `preferred` when given.
    async fn detail(
        &self,
        video_id: &str,
        mut preferred: Option<String>,
    ) -> Result<ResolvedAudio, ProviderError> {
        let mut last = ProviderError::NoMatch("no detail attempted".to_string());
        for attempt in 1..=MAX_ATTEMPTS {
            let mirror = match preferred.take() {
                Some(mirror) => mirror,
                None => self.directory.pick_current().await,
            };
            match self.detail_on(&mirror, video_id).await {
                Ok(audio) => return Ok(audio),
                Err(err) => {
                    warn!(mirror = %mirror, attempt, video_id, error = %err, "mirror detail failed");
                    last = err;
                }
            }
        }
        Err(ProviderError::Exhausted {
            attempts: MAX_ATTEMPTS,
            last: Box::new(last),
        })
    }

    async fn detail_on(&self, mirror: &str, video_id: &str) -> Result<ResolvedAudio, ProviderError> {
        let response = self
            .http
            .get(format!(
                "{}/api/v1/videos/{video_id}",
                mirror.trim_end_matches('/')
            ))
            .timeout(self.cfg.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let detail = response.json::<VideoDetail>().await?;
        let formats = detail
            .adaptive_formats
            .into_iter()
            .map(FormatDescriptor::from)
            .collect::<Vec<_>>();
        let selected = self.cfg.format_preference.select(&formats).ok_or_else(|| {
            ProviderError::NoMatch(format!(
                "none of {} formats matched {}",
                formats.len(),
                self.cfg.format_preference
            ))
        })?;

        debug!(mirror, video_id, tag = ?selected.tag, "selected audio format");
        let mut audio = ResolvedAudio::new(
            rewrite_to_mirror(&selected.url, mirror),
            SourceName::Secondary,
        );
        audio.mirror_instance = Some(mirror.to_string());
        audio.bitrate = selected.bitrate;
        audio.quality = selected.quality;
        audio.container = selected.container;
        audio.format_tag = selected.tag;
        audio.title = detail.title;
        audio.artist = detail.author;
        Ok(audio)
    }
}

#[async_trait]
impl AudioProvider for MirrorProvider {
    fn source(&self) -> SourceName {
        SourceName::Secondary
    }

    fn is_applicable(&self, req: &ResolutionRequest) -> bool {
        req.video_id.is_some() || req.search_query().is_some()
    }

    async fn resolve(&self, req: &ResolutionRequest) -> Result<ResolvedAudio, ProviderError> {
        let (video_id, search_mirror) = match (&req.video_id, req.search_query()) {
            (Some(video_id), _) => (video_id.clone(), None),
            (None, Some(query)) => {
                let (video_id, mirror) = self.search(&query).await.map_err(|err| {
                    ProviderError::Inapplicable(format!("no identifier resolved: {err}"))
                })?;
                (video_id, Some(mirror))
            }
            (None, None) => {
                return Err(ProviderError::Inapplicable(
                    "no identifier or query".to_string(),
                ));
            }
        };

        let mut audio = self.detail(&video_id, search_mirror).await?;
        audio.duration_seconds = req.duration_seconds;
        Ok(audio)
    }
}

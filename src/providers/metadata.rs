//! Metadata-matched provider.
//!
//! Sends title, artist, and duration to a matching service that answers with
//! a bare track identifier, then templates that identifier into a CDN URL.

use async_trait::async_trait;
use tracing::debug;

use crate::config::PrimaryConfig;
use crate::providers::{AudioProvider, ProviderError, ResolutionRequest, ResolvedAudio, SourceName};

/// Identifiers at or below this length are treated as garbage.
const MIN_IDENTIFIER_LEN: usize = 5;
const TEMPLATE_PLACEHOLDER: &str = "{id}";
const CDN_BITRATE: u64 = 160_000;

pub struct MetadataMatchProvider {
    http: reqwest::Client,
    cfg: PrimaryConfig,
}

impl MetadataMatchProvider {
    pub fn new(http: reqwest::Client, cfg: PrimaryConfig) -> Self {
        Self { http, cfg }
    }
}

#[async_trait]
impl AudioProvider for MetadataMatchProvider {
    fn source(&self) -> SourceName {
        SourceName::Primary
    }

    fn is_applicable(&self, req: &ResolutionRequest) -> bool {
        self.cfg.lookup_url.is_some()
            && req.title.is_some()
            && req.artist.is_some()
            && (!self.cfg.require_duration || req.duration_seconds.is_some())
    }

    async fn resolve(&self, req: &ResolutionRequest) -> Result<ResolvedAudio, ProviderError> {
        let (Some(lookup_url), Some(title), Some(artist)) =
            (self.cfg.lookup_url.as_deref(), &req.title, &req.artist)
        else {
            return Err(ProviderError::NoMatch("title and artist are required".to_string()));
        };

        let title = strip_parenthetical(title);
        let mut query = vec![("title", title.to_string()), ("artist", artist.clone())];
        if let Some(duration) = req.duration_seconds {
            query.push(("duration", format_duration(duration)));
        }

        debug!(title = %title, artist = %artist, "querying metadata match service");
        let response = self
            .http
            .get(lookup_url)
            .query(&query)
            .timeout(self.cfg.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let identifier = parse_identifier(&body)?;

        let mut audio = ResolvedAudio::new(
            self.cfg.cdn_template.replace(TEMPLATE_PLACEHOLDER, identifier),
            SourceName::Primary,
        );
        audio.bitrate = Some(CDN_BITRATE);
        audio.quality = Some("160kbps".to_string());
        audio.container = Some("mp4".to_string());
        audio.title = Some(title.to_string());
        audio.artist = Some(artist.clone());
        audio.duration_seconds = req.duration_seconds;
        Ok(audio)
    }
}

/// Drops everything from the first `(` on, so `Song (Remastered)` matches `Song`.
/// A title that would end up empty, like `(Live) Song`, is kept whole.
pub fn strip_parenthetical(title: &str) -> &str {
    let stripped = match title.find('(') {
        Some(idx) => title[..idx].trim(),
        None => title.trim(),
    };
    if stripped.is_empty() {
        title.trim()
    } else {
        stripped
    }
}

fn parse_identifier(body: &str) -> Result<&str, ProviderError> {
    let identifier = body.trim();
    if identifier.is_empty() || identifier.len() <= MIN_IDENTIFIER_LEN {
        return Err(ProviderError::Parse(format!(
            "identifier {identifier:?} is too short"
        )));
    }
    if identifier.to_ascii_lowercase().contains("error") {
        return Err(ProviderError::NoMatch(identifier.to_string()));
    }
    Ok(identifier)
}

fn format_duration(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as u64)
    } else {
        seconds.to_string()
    }
}

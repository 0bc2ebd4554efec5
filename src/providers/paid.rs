//! Paid API fallback provider.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::TertiaryConfig;
use crate::providers::{AudioProvider, ProviderError, ResolutionRequest, ResolvedAudio, SourceName};

const API_KEY_HEADER: &str = "X-RapidAPI-Key";
const API_HOST_HEADER: &str = "X-RapidAPI-Host";
const CONTAINER: &str = "mp3";

#[derive(Debug, Deserialize)]
struct PaidResponse {
    link: Option<String>,
    title: Option<String>,
    quality: Option<serde_json::Value>,
    duration: Option<serde_json::Value>,
}

pub struct PaidApiProvider {
    http: reqwest::Client,
    cfg: TertiaryConfig,
}

impl PaidApiProvider {
    pub fn new(http: reqwest::Client, cfg: TertiaryConfig) -> Self {
        Self { http, cfg }
    }

    async fn request(&self, video_id: &str, api_key: &str) -> Result<reqwest::Response, ProviderError> {
        Ok(self
            .http
            .get(&self.cfg.api_url)
            .query(&[("id", video_id)])
            .header(API_KEY_HEADER, api_key)
            .header(API_HOST_HEADER, &self.cfg.api_host)
            .timeout(self.cfg.timeout)
            .send()
            .await?)
    }
}

#[async_trait]
impl AudioProvider for PaidApiProvider {
    fn source(&self) -> SourceName {
        SourceName::Tertiary
    }

    fn is_applicable(&self, req: &ResolutionRequest) -> bool {
        self.cfg.api_key.is_some() && req.video_id.is_some()
    }

    async fn resolve(&self, req: &ResolutionRequest) -> Result<ResolvedAudio, ProviderError> {
        let (Some(api_key), Some(video_id)) = (self.cfg.api_key.as_deref(), &req.video_id) else {
            return Err(ProviderError::NoMatch("api key and video id are required".to_string()));
        };

        let mut response = self.request(video_id, api_key).await?;
        if !response.status().is_success() {
            let fallback = self
                .cfg
                .fallback_api_key
                .as_deref()
                .filter(|key| *key != api_key);
            let Some(fallback) = fallback else {
                return Err(ProviderError::Status(response.status().as_u16()));
            };
            warn!(status = %response.status(), "paid api rejected primary key; retrying with fallback key");
            response = self.request(video_id, fallback).await?;
            if !response.status().is_success() {
                return Err(ProviderError::Status(response.status().as_u16()));
            }
        }

        let body = response.json::<PaidResponse>().await?;
        let link = body
            .link
            .filter(|link| !link.trim().is_empty())
            .ok_or_else(|| ProviderError::NoMatch(format!("no link for {video_id}")))?;
        debug!(video_id = %video_id, "paid api returned a link");

        let mut audio = ResolvedAudio::new(link, SourceName::Tertiary);
        audio.container = Some(CONTAINER.to_string());
        audio.title = body.title;
        audio.quality = body.quality.as_ref().and_then(value_to_string);
        audio.duration_seconds = body
            .duration
            .as_ref()
            .and_then(value_to_f64)
            .or(req.duration_seconds);
        Ok(audio)
    }
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(server: &MockServer, api_key: Option<&str>, fallback: Option<&str>) -> PaidApiProvider {
        PaidApiProvider::new(
            reqwest::Client::new(),
            TertiaryConfig {
                api_key: api_key.map(ToOwned::to_owned),
                fallback_api_key: fallback.map(ToOwned::to_owned),
                api_url: format!("{}/dl", server.uri()),
                api_host: "paid.api.test".to_string(),
                timeout: Duration::from_secs(2),
            },
        )
    }

    fn video_request() -> ResolutionRequest {
        ResolutionRequest {
            video_id: Some("abc123".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn normalizes_paid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dl"))
            .and(query_param("id", "abc123"))
            .and(header(API_KEY_HEADER, "key-1"))
            .and(header(API_HOST_HEADER, "paid.api.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "link": "https://dl.paid.test/abc123.mp3",
                "title": "Song",
                "quality": 128,
                "duration": 200.5,
                "status": "ok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let audio = provider(&server, Some("key-1"), None)
            .resolve(&video_request())
            .await
            .expect("resolved");
        assert_eq!(audio.url, "https://dl.paid.test/abc123.mp3");
        assert_eq!(audio.container.as_deref(), Some("mp3"));
        assert_eq!(audio.quality.as_deref(), Some("128"));
        assert_eq!(audio.duration_seconds, Some(200.5));
        assert!(audio.bitrate.is_none() && audio.format_tag.is_none());
    }

    #[tokio::test]
    async fn retries_once_with_fallback_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header(API_KEY_HEADER, "key-1"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header(API_KEY_HEADER, "key-2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"link": "https://dl.paid.test/x"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let audio = provider(&server, Some("key-1"), Some("key-2"))
            .resolve(&video_request())
            .await
            .expect("resolved with fallback key");
        assert_eq!(audio.url, "https://dl.paid.test/x");
    }

    #[tokio::test]
    async fn failure_without_distinct_fallback_is_final() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server, Some("key-1"), Some("key-1"))
            .resolve(&video_request())
            .await;
        assert!(matches!(result, Err(ProviderError::Status(403))));
    }

    #[tokio::test]
    async fn empty_link_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"link": "", "msg": "in queue"})))
            .mount(&server)
            .await;

        assert!(provider(&server, Some("key-1"), None)
            .resolve(&video_request())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn missing_key_makes_provider_inapplicable() {
        let server = MockServer::start().await;
        assert!(!provider(&server, None, None).is_applicable(&video_request()));
        assert!(!provider(&server, Some("k"), None).is_applicable(&ResolutionRequest::default()));
    }
}

//! Ordered, short-circuiting resolution across providers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::providers::{AudioProvider, ProviderError, ResolutionRequest, ResolvedAudio, SourceName};

/// Result of one cascade run.
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeOutcome {
    Success(ResolvedAudio),
    /// Every applicable provider failed; lists those that were tried.
    NotFound { attempted_sources: Vec<SourceName> },
}

/// Tries providers strictly in the order given, one at a time.
pub struct ResolutionCascade {
    providers: Vec<Arc<dyn AudioProvider>>,
}

impl ResolutionCascade {
    pub fn new(providers: Vec<Arc<dyn AudioProvider>>) -> Self {
        Self { providers }
    }

    pub async fn resolve(&self, req: &ResolutionRequest) -> CascadeOutcome {
        let mut attempted_sources = Vec::new();

        for provider in &self.providers {
            let source = provider.source();
            if !provider.is_applicable(req) {
                continue;
            }

            match provider.resolve(req).await {
                Ok(audio) => {
                    info!(source = %source, url = %audio.url, "resolved audio");
                    return CascadeOutcome::Success(audio);
                }
                Err(ProviderError::Inapplicable(reason)) => {
                    debug!(source = %source, reason = %reason, "provider not applicable");
                }
                Err(err) => {
                    attempted_sources.push(source);
                    warn!(source = %source, error = %err, "provider produced no result");
                }
            }
        }

        info!(attempted = ?attempted_sources, "all providers exhausted");
        CascadeOutcome::NotFound { attempted_sources }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::MirrorConfig;
    use crate::formats::FormatPreference;
    use crate::instances::InstanceDirectory;
    use crate::providers::mirror::{MirrorProvider, MAX_ATTEMPTS};

    /// Provider double with a fixed gate, fixed outcome, and a call counter.
    pub(crate) struct StubProvider {
        pub source: SourceName,
        pub applicable: bool,
        pub succeeds: bool,
        pub calls: AtomicUsize,
    }

    impl StubProvider {
        pub(crate) fn new(source: SourceName, applicable: bool, succeeds: bool) -> Arc<Self> {
            Arc::new(Self {
                source,
                applicable,
                succeeds,
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AudioProvider for StubProvider {
        fn source(&self) -> SourceName {
            self.source
        }

        fn is_applicable(&self, _req: &ResolutionRequest) -> bool {
            self.applicable
        }

        async fn resolve(&self, _req: &ResolutionRequest) -> Result<ResolvedAudio, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeeds {
                Ok(ResolvedAudio::new(
                    format!("https://cdn.test/{}", self.source),
                    self.source,
                ))
            } else {
                Err(ProviderError::Timeout)
            }
        }
    }

    fn cascade(stubs: &[Arc<StubProvider>]) -> ResolutionCascade {
        ResolutionCascade::new(
            stubs
                .iter()
                .map(|stub| stub.clone() as Arc<dyn AudioProvider>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let stubs = [
            StubProvider::new(SourceName::Primary, true, true),
            StubProvider::new(SourceName::Secondary, true, true),
            StubProvider::new(SourceName::Tertiary, true, true),
        ];
        let outcome = cascade(&stubs).resolve(&ResolutionRequest::default()).await;

        let CascadeOutcome::Success(audio) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(audio.source_name, SourceName::Primary);
        assert_eq!(stubs[0].calls(), 1);
        assert_eq!(stubs[1].calls(), 0);
        assert_eq!(stubs[2].calls(), 0);
    }

    #[tokio::test]
    async fn failures_fall_through_in_order() {
        let stubs = [
            StubProvider::new(SourceName::Primary, true, false),
            StubProvider::new(SourceName::Secondary, true, false),
            StubProvider::new(SourceName::Tertiary, true, true),
        ];
        let outcome = cascade(&stubs).resolve(&ResolutionRequest::default()).await;

        assert!(matches!(
            outcome,
            CascadeOutcome::Success(ResolvedAudio {
                source_name: SourceName::Tertiary,
                ..
            })
        ));
        assert!(stubs.iter().all(|stub| stub.calls() == 1));
    }

    #[tokio::test]
    async fn exhaustion_reports_only_applicable_sources() {
        let stubs = [
            StubProvider::new(SourceName::Primary, false, true),
            StubProvider::new(SourceName::Secondary, true, false),
            StubProvider::new(SourceName::Tertiary, true, false),
        ];
        let outcome = cascade(&stubs).resolve(&ResolutionRequest::default()).await;

        assert_eq!(
            outcome,
            CascadeOutcome::NotFound {
                attempted_sources: vec![SourceName::Secondary, SourceName::Tertiary]
            }
        );
        assert_eq!(stubs[0].calls(), 0);
    }

    #[tokio::test]
    async fn nothing_applicable_is_not_found_with_no_attempts() {
        let stubs = [StubProvider::new(SourceName::Primary, false, true)];
        let outcome = cascade(&stubs).resolve(&ResolutionRequest::default()).await;
        assert_eq!(
            outcome,
            CascadeOutcome::NotFound {
                attempted_sources: Vec::new()
            }
        );
    }

    #[tokio::test]
    async fn unresolvable_search_is_not_an_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(MAX_ATTEMPTS as u64)
            .mount(&server)
            .await;

        let cfg = MirrorConfig {
            directory_url: None,
            fallback_instance: server.uri(),
            cache_ttl: Duration::from_secs(3600),
            directory_timeout: Duration::from_secs(2),
            timeout: Duration::from_secs(2),
            format_preference: FormatPreference::default(),
        };
        let http = reqwest::Client::new();
        let directory = Arc::new(InstanceDirectory::new(http.clone(), &cfg));
        let secondary: Arc<dyn AudioProvider> = Arc::new(MirrorProvider::new(http, directory, cfg));
        let tertiary = StubProvider::new(SourceName::Tertiary, true, false);

        let outcome = ResolutionCascade::new(vec![secondary, tertiary.clone() as Arc<dyn AudioProvider>])
            .resolve(&ResolutionRequest {
                free_text_query: Some("zzz".to_string()),
                ..Default::default()
            })
            .await;

        assert_eq!(
            outcome,
            CascadeOutcome::NotFound {
                attempted_sources: vec![SourceName::Tertiary]
            }
        );
        assert_eq!(tertiary.calls(), 1);
    }
}

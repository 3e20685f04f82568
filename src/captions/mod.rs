//! Caption resolution.
//!
//! The resolver walks an ordered list of [`CaptionPreference`]s and returns the text of the
//! first track that matches. Every provider failure is reported as absence so the caller can
//! fall back to audio transcription.

use std::sync::Arc;
use std::time::Duration;

use crate::models::{CaptionTrack, TrackKind};
use crate::sources::CaptionProvider;
use crate::utils::with_timeout;

/// One step of the caption fallback chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionPreference {
    pub kind: TrackKind,
    /// Language codes tried in order
    pub languages: Vec<String>,
}

impl CaptionPreference {
    pub fn new<I, S>(kind: TrackKind, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            languages: languages.into_iter().map(Into::into).collect(),
        }
    }
}

/// Caption text together with the track it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCaptions {
    pub text: String,
    pub language: String,
    pub kind: TrackKind,
}

pub struct CaptionResolver {
    provider: Arc<dyn CaptionProvider>,
    policy: Vec<CaptionPreference>,
    timeout: Duration,
}

impl CaptionResolver {
    pub fn new(
        provider: Arc<dyn CaptionProvider>,
        policy: Vec<CaptionPreference>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> &[CaptionPreference] {
        &self.policy
    }

    /// Resolve captions for a video; `None` means no usable captions
    pub async fn resolve(&self, video_id: &str) -> Option<ResolvedCaptions> {
        let tracks = match with_timeout(
            "caption listing",
            self.timeout,
            self.provider.list_tracks(video_id),
        )
        .await
        {
            Ok(tracks) => tracks,
            Err(e) => {
                tracing::warn!("No captions found for {}: {:#}", video_id, e);
                return None;
            }
        };

        for preference in &self.policy {
            let Some(handle) = tracks.find(preference.kind, &preference.languages) else {
                continue;
            };

            let segments = match with_timeout(
                "caption fetch",
                self.timeout,
                self.provider.fetch(handle),
            )
            .await
            {
                Ok(segments) => segments,
                Err(e) => {
                    tracing::warn!(
                        "Fetching {} {} captions for {} failed: {:#}",
                        handle.kind,
                        handle.language,
                        video_id,
                        e
                    );
                    return None;
                }
            };

            let track = CaptionTrack {
                language: handle.language.clone(),
                kind: handle.kind,
                segments,
            };

            if track.is_blank() {
                tracing::debug!(
                    "{} {} captions for {} are empty, trying next preference",
                    track.kind,
                    track.language,
                    video_id
                );
                continue;
            }

            return Some(ResolvedCaptions {
                text: track.joined_text(),
                language: track.language,
                kind: track.kind,
            });
        }

        tracing::info!("No captions found for {}", video_id);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::CaptionSegment;
    use crate::sources::{MockCaptionProvider, TrackHandle, TrackList};

    fn handle(language: &str, kind: TrackKind) -> TrackHandle {
        TrackHandle {
            language: language.to_string(),
            kind,
            url: format!("{}:{}", kind, language),
        }
    }

    fn resolver(provider: MockCaptionProvider) -> CaptionResolver {
        CaptionResolver::new(
            Arc::new(provider),
            Config::default().caption_policy(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_manual_primary_wins() {
        let mut provider = MockCaptionProvider::new();
        provider.expect_list_tracks().returning(|_| {
            Ok(TrackList::new(vec![
                handle("en", TrackKind::Manual),
                handle("si", TrackKind::Generated),
                handle("si", TrackKind::Manual),
            ]))
        });
        provider
            .expect_fetch()
            .withf(|track| track.url == "manual:si")
            .times(1)
            .returning(|_| Ok(vec![CaptionSegment::new("සිංහල")]));

        let resolved = resolver(provider).resolve("vid").await.unwrap();
        assert_eq!(resolved.text, "සිංහල");
        assert_eq!(resolved.kind, TrackKind::Manual);
        assert_eq!(resolved.language, "si");
    }

    #[tokio::test]
    async fn test_manual_secondary_before_generated() {
        let mut provider = MockCaptionProvider::new();
        provider.expect_list_tracks().returning(|_| {
            Ok(TrackList::new(vec![
                handle("si", TrackKind::Generated),
                handle("en", TrackKind::Manual),
            ]))
        });
        provider
            .expect_fetch()
            .withf(|track| track.url == "manual:en")
            .times(1)
            .returning(|_| Ok(vec![CaptionSegment::new("hello")]));

        let resolved = resolver(provider).resolve("vid").await.unwrap();
        assert_eq!(resolved.text, "hello");
    }

    #[tokio::test]
    async fn test_generated_only_when_no_manual() {
        let mut provider = MockCaptionProvider::new();
        provider.expect_list_tracks().returning(|_| {
            Ok(TrackList::new(vec![
                handle("en", TrackKind::Generated),
                handle("ta", TrackKind::Manual),
            ]))
        });
        provider
            .expect_fetch()
            .withf(|track| track.url == "generated:en")
            .times(1)
            .returning(|_| Ok(vec![CaptionSegment::new("auto")]));

        let resolved = resolver(provider).resolve("vid").await.unwrap();
        assert_eq!(resolved.kind, TrackKind::Generated);
        assert_eq!(resolved.text, "auto");
    }

    #[tokio::test]
    async fn test_listing_error_is_absent() {
        let mut provider = MockCaptionProvider::new();
        provider
            .expect_list_tracks()
            .returning(|_| Err(anyhow::anyhow!("Subtitles are disabled for this video")));
        provider.expect_fetch().times(0);

        assert!(resolver(provider).resolve("vid").await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_error_is_absent() {
        let mut provider = MockCaptionProvider::new();
        provider
            .expect_list_tracks()
            .returning(|_| Ok(TrackList::new(vec![handle("si", TrackKind::Manual)])));
        provider
            .expect_fetch()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        assert!(resolver(provider).resolve("vid").await.is_none());
    }

    #[tokio::test]
    async fn test_blank_track_falls_through() {
        let mut provider = MockCaptionProvider::new();
        provider.expect_list_tracks().returning(|_| {
            Ok(TrackList::new(vec![
                handle("si", TrackKind::Manual),
                handle("en", TrackKind::Manual),
            ]))
        });
        provider
            .expect_fetch()
            .withf(|track| track.url == "manual:si")
            .returning(|_| Ok(vec![CaptionSegment::new("  ")]));
        provider
            .expect_fetch()
            .withf(|track| track.url == "manual:en")
            .returning(|_| Ok(vec![CaptionSegment::new("a"), CaptionSegment::new("b")]));

        let resolved = resolver(provider).resolve("vid").await.unwrap();
        assert_eq!(resolved.text, "a b");
    }

    #[tokio::test]
    async fn test_no_matching_tracks() {
        let mut provider = MockCaptionProvider::new();
        provider
            .expect_list_tracks()
            .returning(|_| Ok(TrackList::new(vec![handle("fr", TrackKind::Manual)])));
        provider.expect_fetch().times(0);

        assert!(resolver(provider).resolve("vid").await.is_none());
    }

    /// Never answers within the resolver timeout
    struct StalledProvider {
        stall_listing: bool,
    }

    #[async_trait::async_trait]
    impl CaptionProvider for StalledProvider {
        async fn list_tracks(&self, _video_id: &str) -> crate::Result<TrackList> {
            if self.stall_listing {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(TrackList::new(vec![handle("si", TrackKind::Manual)]))
        }

        async fn fetch(&self, _track: &TrackHandle) -> crate::Result<Vec<CaptionSegment>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![CaptionSegment::new("late")])
        }
    }

    #[tokio::test]
    async fn test_listing_timeout_is_absence() {
        let resolver = CaptionResolver::new(
            Arc::new(StalledProvider { stall_listing: true }),
            Config::default().caption_policy(),
            Duration::from_millis(50),
        );
        assert!(resolver.resolve("vid").await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_absence() {
        let resolver = CaptionResolver::new(
            Arc::new(StalledProvider { stall_listing: false }),
            Config::default().caption_policy(),
            Duration::from_millis(50),
        );
        assert!(resolver.resolve("vid").await.is_none());
    }
}

//! Language normalization: make sure corpus text ends up in the target language.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub mod detect;
pub mod google;

pub use detect::WhatlangDetector;
pub use google::GoogleTranslator;

use crate::utils::with_timeout;
use crate::{CorpusError, Result};

/// Identifies the language of a text
#[cfg_attr(test, mockall::automock)]
pub trait LanguageDetector: Send + Sync {
    /// ISO 639-1 code where one exists; errors when the text is too short or ambiguous
    fn detect(&self, text: &str) -> Result<String>;
}

/// Machine translation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// Outcome of normalizing one text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub detected_language: String,
    pub translated: bool,
}

pub struct TextNormalizer {
    detector: Arc<dyn LanguageDetector>,
    translator: Arc<dyn Translator>,
    source_language: String,
    target_language: String,
    max_chunk_chars: usize,
    timeout: Duration,
}

impl TextNormalizer {
    pub fn new(
        detector: Arc<dyn LanguageDetector>,
        translator: Arc<dyn Translator>,
        config: &crate::config::NormalizeConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            detector,
            translator,
            source_language: crate::utils::primary_language_subtag(&config.source_language),
            target_language: crate::utils::primary_language_subtag(&config.target_language),
            max_chunk_chars: config.max_chunk_chars.max(1),
            timeout,
        }
    }

    /// Translate source-language text to the target language; anything else passes through.
    ///
    /// Errors are [`CorpusError::LanguageUndetected`] or [`CorpusError::TranslationFailed`].
    pub async fn normalize(&self, text: &str) -> Result<NormalizedText> {
        let detected = self
            .detector
            .detect(text)
            .map_err(|e| CorpusError::LanguageUndetected(format!("{:#}", e)))?;

        if detected != self.source_language {
            tracing::debug!("Detected '{}', keeping text as is", detected);
            return Ok(NormalizedText {
                text: text.to_string(),
                detected_language: detected,
                translated: false,
            });
        }

        tracing::info!(
            "Translating {} chars {} -> {}",
            text.chars().count(),
            self.source_language,
            self.target_language
        );

        let mut translated = Vec::new();
        for chunk in split_into_chunks(text, self.max_chunk_chars) {
            let part = with_timeout(
                "translation",
                self.timeout,
                self.translator
                    .translate(&chunk, &self.source_language, &self.target_language),
            )
            .await
            .map_err(|e| CorpusError::TranslationFailed(format!("{:#}", e)))?;
            translated.push(part);
        }

        Ok(NormalizedText {
            text: translated.join(" "),
            detected_language: detected,
            translated: true,
        })
    }
}

/// Split text into pieces of at most `max_chars` characters, breaking at whitespace when possible
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            chunks.extend(chars.chunks(max_chars).map(|piece| piece.iter().collect::<String>()));
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn normalizer(detector: MockLanguageDetector, translator: MockTranslator) -> TextNormalizer {
        TextNormalizer::new(
            Arc::new(detector),
            Arc::new(translator),
            &Config::default().normalize,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_non_source_text_is_unchanged() {
        let mut detector = MockLanguageDetector::new();
        detector.expect_detect().returning(|_| Ok("en".to_string()));
        let mut translator = MockTranslator::new();
        translator.expect_translate().times(0);

        let out = normalizer(detector, translator)
            .normalize("parliament convenes today")
            .await
            .unwrap();
        assert_eq!(out.text, "parliament convenes today");
        assert!(!out.translated);
    }

    #[tokio::test]
    async fn test_source_text_is_translated() {
        let mut detector = MockLanguageDetector::new();
        detector.expect_detect().returning(|_| Ok("si".to_string()));
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .withf(|_, source, target| source == "si" && target == "en")
            .times(1)
            .returning(|_, _, _| Ok("The budget was passed".to_string()));

        let out = normalizer(detector, translator)
            .normalize("අයවැය සම්මත විය")
            .await
            .unwrap();
        assert_eq!(out.text, "The budget was passed");
        assert!(out.translated);
    }

    #[tokio::test]
    async fn test_detection_failure_is_typed() {
        let mut detector = MockLanguageDetector::new();
        detector
            .expect_detect()
            .returning(|_| Err(anyhow::anyhow!("no features in text")));

        let err = normalizer(detector, MockTranslator::new())
            .normalize("")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CorpusError>(),
            Some(CorpusError::LanguageUndetected(_))
        ));
    }

    #[tokio::test]
    async fn test_translation_failure_is_typed() {
        let mut detector = MockLanguageDetector::new();
        detector.expect_detect().returning(|_| Ok("si".to_string()));
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .returning(|_, _, _| Err(anyhow::anyhow!("HTTP 429")));

        let err = normalizer(detector, translator)
            .normalize("ආයුබෝවන්")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CorpusError>(),
            Some(CorpusError::TranslationFailed(_))
        ));
    }

    #[test]
    fn test_split_into_chunks_respects_limit() {
        let chunks = split_into_chunks("aaa bbb ccc dddd", 7);
        assert_eq!(chunks, vec!["aaa bbb", "ccc", "dddd"]);

        let long = split_into_chunks("abcdefghij", 4);
        assert_eq!(long, vec!["abcd", "efgh", "ij"]);

        assert!(split_into_chunks("   ", 10).is_empty());
        assert_eq!(split_into_chunks("one two", 5000), vec!["one two"]);
    }
}

use whatlang::Lang;

use super::LanguageDetector;
use crate::Result;

/// Offline language identification backed by `whatlang`
#[derive(Debug, Clone, Default)]
pub struct WhatlangDetector {
    /// Reject detections whatlang does not consider reliable
    require_reliable: bool,
}

impl WhatlangDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reliable_only(mut self) -> Self {
        self.require_reliable = true;
        self
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            anyhow::bail!("No features in text");
        }

        let info = whatlang::detect(text)
            .ok_or_else(|| anyhow::anyhow!("Language could not be identified"))?;

        if self.require_reliable && !info.is_reliable() {
            anyhow::bail!(
                "Detection of {} is not reliable (confidence {:.2})",
                info.lang().eng_name(),
                info.confidence()
            );
        }

        Ok(iso639_1(info.lang()).to_string())
    }
}

/// Two-letter code for the languages this corpus deals with, whatlang's three-letter code otherwise
pub fn iso639_1(lang: Lang) -> &'static str {
    match lang {
        Lang::Sin => "si",
        Lang::Eng => "en",
        Lang::Tam => "ta",
        Lang::Hin => "hi",
        Lang::Ben => "bn",
        Lang::Urd => "ur",
        Lang::Mal => "ml",
        Lang::Tel => "te",
        Lang::Kan => "kn",
        Lang::Mar => "mr",
        Lang::Guj => "gu",
        Lang::Pan => "pa",
        Lang::Nep => "ne",
        Lang::Ara => "ar",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Rus => "ru",
        Lang::Spa => "es",
        Lang::Por => "pt",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Nld => "nl",
        other => other.code(),
    }
}

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::Translator;
use crate::Result;

/// Google Translate through the public `translate_a/single` endpoint
pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("client", "gtx"), ("sl", source), ("tl", target), ("dt", "t")])
            .form(&[("q", text)])
            .send()
            .await
            .context("Translation request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Translation failed: HTTP {}", response.status());
        }

        let body = response.text().await.context("Failed to read translation")?;
        parse_translation(&body)
    }
}

/// Concatenate the translated sentences of a `translate_a/single?dt=t` response
pub fn parse_translation(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body).context("Failed to parse translation response")?;

    let sentences = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("Unexpected translation response shape"))?;

    let text: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        anyhow::bail!("Translation response contained no text");
    }

    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_translation_joins_sentences() {
        let body = r#"[[["The budget was passed. ","අයවැය සම්මත විය. ",null,null,10],["Parliament adjourned.","පාර්ලිමේන්තුව කල් තැබිණි.",null,null,10]],null,"si"]"#;
        assert_eq!(
            parse_translation(body).unwrap(),
            "The budget was passed. Parliament adjourned."
        );
    }

    #[test]
    fn test_parse_translation_rejects_garbage() {
        assert!(parse_translation("{}").is_err());
        assert!(parse_translation("[[]]").is_err());
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{Precision, SpeechModel, SpeechOptions, SpeechTask};
use crate::config::WhisperConfig;
use crate::CorpusError;

/// JSON written by `whisper --output_format json`
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
    language: Option<String>,
}

/// OpenAI Whisper through its command line interface
#[derive(Debug, Clone)]
pub struct WhisperCli {
    binary: String,
    model: String,
    model_dir: Option<PathBuf>,
    device: Option<String>,
}

impl WhisperCli {
    /// Validate the CLI once for the process, failing early when it is unavailable.
    ///
    /// The CLI still loads its weights on every call.
    pub async fn load(config: &WhisperConfig) -> Result<Self> {
        let model = Self::from_config(config);

        if !crate::utils::check_command_available(&model.binary, "--help").await {
            anyhow::bail!(
                "{} is not available. Please install it: pip install -U openai-whisper",
                model.binary
            );
        }

        tracing::info!("Whisper model '{}' ready", model.model);
        Ok(model)
    }

    pub fn from_config(config: &WhisperConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.model.clone(),
            model_dir: config.model_dir.clone(),
            device: config.device.clone(),
        }
    }

    pub fn args(&self, audio_path: &Path, output_dir: &Path, options: &SpeechOptions) -> Vec<String> {
        let task = match options.task {
            SpeechTask::Transcribe => "transcribe",
            SpeechTask::Translate => "translate",
        };
        let fp16 = match options.precision {
            Precision::Fp16 => "True",
            Precision::Fp32 => "False",
        };

        let mut args = vec![
            audio_path.to_string_lossy().into_owned(),
            "--model".to_string(),
            self.model.clone(),
            "--task".to_string(),
            task.to_string(),
            "--fp16".to_string(),
            fp16.to_string(),
            "--output_format".to_string(),
            "json".to_string(),
            "--output_dir".to_string(),
            output_dir.to_string_lossy().into_owned(),
            "--verbose".to_string(),
            "False".to_string(),
        ];

        if let Some(dir) = &self.model_dir {
            args.push("--model_dir".to_string());
            args.push(dir.to_string_lossy().into_owned());
        }

        if let Some(device) = &self.device {
            args.push("--device".to_string());
            args.push(device.clone());
        }

        args
    }
}

/// Read the recognized text out of whisper's JSON output
pub fn parse_output(body: &str) -> Result<String> {
    let output: WhisperOutput =
        serde_json::from_str(body).context("Failed to parse whisper output")?;

    if let Some(language) = &output.language {
        tracing::debug!("Whisper detected spoken language: {}", language);
    }

    Ok(output.text.trim().to_string())
}

#[async_trait]
impl SpeechModel for WhisperCli {
    async fn transcribe(&self, audio_path: &Path, options: &SpeechOptions) -> Result<String> {
        let output_dir = tempfile::tempdir().context("Failed to create whisper output directory")?;

        tracing::debug!("Running {} on {}", self.binary, audio_path.display());

        let output = Command::new(&self.binary)
            .args(self.args(audio_path, output_dir.path(), options))
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CorpusError::TranscriptionFailed(e.to_string()))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(CorpusError::TranscriptionFailed(error.trim().to_string()).into());
        }

        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let json_path = output_dir.path().join(format!("{}.json", stem));

        let body = fs_err::read_to_string(&json_path)
            .map_err(|e| CorpusError::TranscriptionFailed(e.to_string()))?;

        parse_output(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_args_translate_without_fp16() {
        let whisper = WhisperCli::from_config(&Config::default().whisper);
        let args = whisper.args(
            Path::new("/tmp/a/abc.wav"),
            Path::new("/tmp/out"),
            &SpeechOptions::translate_to_english(),
        );

        let value_of = |flag: &str| {
            let position = args.iter().position(|a| a == flag).unwrap();
            args[position + 1].clone()
        };
        assert_eq!(args[0], "/tmp/a/abc.wav");
        assert_eq!(value_of("--task"), "translate");
        assert_eq!(value_of("--fp16"), "False");
        assert_eq!(value_of("--model"), "base");
        assert_eq!(value_of("--device"), "cpu");
    }

    #[test]
    fn test_parse_output_trims_leading_space() {
        let body = r#"{"text": " The parliament convenes today.", "segments": [], "language": "si"}"#;
        assert_eq!(parse_output(body).unwrap(), "The parliament convenes today.");
    }

    #[tokio::test]
    async fn test_load_fails_for_missing_binary() {
        let mut config = Config::default().whisper;
        config.binary = "definitely-not-a-whisper-binary".to_string();
        assert!(WhisperCli::load(&config).await.is_err());
    }
}

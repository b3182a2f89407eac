//! Text-to-speech collaborator.
//!
//! [`Synthesizer::synthesize`] returns `Ok(None)` when no audio can be
//! produced (provider disabled). [`ElevenLabsSynthesizer`] returns MP3
//! bytes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::config::SpeechConfig;

const ELEVENLABS_BASE: &str = "https://api.elevenlabs.io/v1/text-to-speech";

#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>>;
}

pub struct DisabledSynthesizer;

#[async_trait]
impl Synthesizer for DisabledSynthesizer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn synthesize(&self, _text: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/{}", ELEVENLABS_BASE, config.voice_id),
            api_key,
        })
    }
}

fn speech_request(text: &str) -> serde_json::Value {
    serde_json::json!({
        "text": text,
        "voice_settings": {
            "stability": 0.5,
            "similarity_boost": 0.8,
        },
    })
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("xi-api-key", &self.api_key)
            .json(&speech_request(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Speech API error {}: {}", status, body_text);
        }

        let audio = response.bytes().await?;
        Ok(Some(audio.to_vec()))
    }
}

/// Build the synthesizer selected by `[speech].provider`.
pub fn create_synthesizer(config: &SpeechConfig) -> Result<Arc<dyn Synthesizer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledSynthesizer)),
        "elevenlabs" => Ok(Arc::new(ElevenLabsSynthesizer::new(config)?)),
        other => bail!("Unknown speech provider: {}", other),
    }
}

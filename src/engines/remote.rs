//! Удалённый API синтеза речи
//!
//! Аутентифицированный сетевой вызов с низким параллелизмом, чтобы не
//! упираться в лимиты провайдера. Ответ приходит в сжатом формате и
//! перекодируется в рабочий WAV конвейера до сборки.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::json;

use crate::audio::transcode::decode_to_wav;
use crate::config::ConversionOptions;
use crate::engines::silero::WORKING_SAMPLE_RATE;
use crate::error::{AppError, Result};

use super::{verify_output, Backend, SynthesisEngine};

const SPEECH_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";

static API_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .expect("Failed to create HTTP client")
});

pub struct RemoteApiEngine {
    api_key: String,
}

impl RemoteApiEngine {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::BackendUnavailable(
                "remote TTS API key is not set".to_string(),
            ));
        }
        Ok(Self { api_key })
    }
}

#[async_trait]
impl SynthesisEngine for RemoteApiEngine {
    async fn synthesize(
        &self,
        text: &str,
        options: &ConversionOptions,
        out_file: &Path,
    ) -> Result<()> {
        let response = API_CLIENT
            .post(SPEECH_ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": "tts-1",
                "voice": options.voice,
                "input": text,
                "response_format": "mp3",
                "speed": options.rate_factor(),
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Отказ в авторизации — не временный сбой, повторять бессмысленно
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(AppError::BackendUnavailable(format!(
                    "remote API rejected the key ({}): {}",
                    status, body
                )));
            }
            return Err(AppError::Synthesis(format!(
                "remote API request failed ({}): {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::Synthesis(
                "remote API returned empty audio".to_string(),
            ));
        }

        // Сжатый ответ перекодируется в рабочий формат конвейера
        let compressed = out_file.with_extension("mp3");
        tokio::fs::write(&compressed, &bytes).await?;
        let result = decode_to_wav(&compressed, out_file, WORKING_SAMPLE_RATE).await;
        let _ = tokio::fs::remove_file(&compressed).await;
        result?;

        verify_output(out_file)
    }

    fn backend(&self) -> Backend {
        Backend::RemoteApi
    }
}

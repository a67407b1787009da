//! Клиент локального протокола управления сервером моделей
//!
//! Все вызовы — обычные HTTP/1.1 запросы на loopback с JSON телами;
//! аудио возвращается сырыми байтами с типом `audio/wav`.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// Генерация может занимать минуты (первая загрузка модели включает скачивание)
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .expect("Failed to create HTTP client")
});

/// Состояние сервера по `GET /status`
#[derive(Debug, Clone, Deserialize)]
pub struct ServerStatus {
    /// Фаза жизненного цикла со стороны сервера
    pub status: String,

    /// Идентификаторы резидентных моделей (`silero_ru`, `silero_en`, `xtts`)
    #[serde(default)]
    pub loaded_models: Vec<String>,

    /// Потребление памяти в мегабайтах
    #[serde(default)]
    pub memory_mb: Option<f64>,

    /// Активное вычислительное устройство
    #[serde(default)]
    pub device: Option<String>,
}

/// Тело `POST /load` и `POST /unload`
#[derive(Debug, Serialize)]
pub struct ModelRequest<'a> {
    pub engine: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<&'a str>,
}

/// Тело `POST /generate`
#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub engine: &'a str,
    pub text: &'a str,
    pub speaker: &'a str,
    pub language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_stretch: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_wav: Option<&'a PathBuf>,
}

/// Типизированный клиент протокола управления
#[derive(Debug, Clone)]
pub struct ServerClient {
    base_url: String,
}

impl ServerClient {
    pub fn new(port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{}", port),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Только живость процесса
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        matches!(HTTP_CLIENT.get(&url).send().await, Ok(r) if r.status().is_success())
    }

    pub async fn status(&self) -> Result<ServerStatus> {
        let url = format!("{}/status", self.base_url);
        let response = HTTP_CLIENT.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::ServerLifecycle(format!(
                "status request failed: HTTP {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Идемпотентная загрузка модели; возвращается после завершения загрузки
    pub async fn load(&self, engine: &str, language: Option<&str>) -> Result<()> {
        let url = format!("{}/load", self.base_url);
        let response = HTTP_CLIENT
            .post(&url)
            .json(&ModelRequest { engine, language })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ServerLifecycle(format!(
                "failed to load model {} ({}): {}",
                engine, status, body
            )));
        }
        Ok(())
    }

    /// Выгрузка модели (или всех языков движка при `language = "all"`)
    pub async fn unload(&self, engine: &str, language: Option<&str>) -> Result<()> {
        let url = format!("{}/unload", self.base_url);
        let response = HTTP_CLIENT
            .post(&url)
            .json(&ModelRequest { engine, language })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ServerLifecycle(format!(
                "failed to unload model {} ({}): {}",
                engine, status, body
            )));
        }
        Ok(())
    }

    /// Синтез фрагмента; сервер обязан сразу отказать, если модель не загружена
    pub async fn generate(&self, request: &GenerateRequest<'_>) -> Result<Bytes> {
        let url = format!("{}/generate", self.base_url);
        let response = HTTP_CLIENT.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Synthesis(format!(
                "server generation failed ({}): {}",
                status, body
            )));
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::Synthesis(
                "server returned empty audio".to_string(),
            ));
        }
        Ok(bytes)
    }

    /// Попросить процесс завершиться после короткой паузы
    pub async fn shutdown(&self) -> Result<()> {
        let url = format!("{}/shutdown", self.base_url);
        let response = HTTP_CLIENT.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::ServerLifecycle(format!(
                "shutdown request failed: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

//! Движок Silero: короткоживущий процесс на фрагмент и серверный путь
//!
//! Одноразовый вызов порождает процесс генерации на каждый фрагмент.
//! Серверный вариант делегирует синтез постоянному серверу моделей,
//! когда тот готов, и откатывается к одноразовому процессу иначе.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{ConversionOptions, EngineInstall, Language};
use crate::error::{AppError, Result};
use crate::server::{protocol::GenerateRequest, ServerSupervisor};

use super::{verify_output, Backend, SynthesisEngine};

/// Частота дискретизации рабочего формата конвейера
pub const WORKING_SAMPLE_RATE: u32 = 48_000;

/// Одноразовый запуск скрипта генерации Silero на фрагмент
pub struct SileroEngine {
    python: std::path::PathBuf,
    script: std::path::PathBuf,
}

impl SileroEngine {
    pub fn new(install: &EngineInstall) -> Result<Self> {
        if !install.script.exists() {
            return Err(AppError::BackendUnavailable(format!(
                "Silero generation script not found: {}",
                install.script.display()
            )));
        }
        if !install.python.exists() {
            return Err(AppError::BackendUnavailable(format!(
                "Silero python interpreter not found: {}",
                install.python.display()
            )));
        }
        Ok(Self {
            python: install.python.clone(),
            script: install.script.clone(),
        })
    }
}

#[async_trait]
impl SynthesisEngine for SileroEngine {
    async fn synthesize(
        &self,
        text: &str,
        options: &ConversionOptions,
        out_file: &Path,
    ) -> Result<()> {
        // Диктор задаётся как `модель/имя`, например `v5_ru/aidar`
        if !options.voice.contains('/') {
            return Err(AppError::Configuration(format!(
                "invalid Silero speaker '{}', expected 'model/speaker'",
                options.voice
            )));
        }

        let mut cmd = Command::new(&self.python);
        cmd.arg(&self.script)
            .args(["--text", text])
            .args(["--speaker", &options.voice])
            .arg("--output")
            .arg(out_file)
            .args(["--sample-rate", &WORKING_SAMPLE_RATE.to_string()])
            .kill_on_drop(true);
        if let Some(rate) = &options.rate {
            cmd.args(["--rate", rate]);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| AppError::Synthesis(format!("failed to spawn Silero process: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            log::debug!("silero: {}", line);
        }

        if !output.status.success() {
            let tail = stderr.lines().last().unwrap_or("no output").to_string();
            return Err(AppError::Synthesis(format!(
                "Silero process failed ({}): {}",
                output.status, tail
            )));
        }

        verify_output(out_file)
    }

    fn backend(&self) -> Backend {
        Backend::Silero
    }
}

/// Silero через постоянный сервер моделей с откатом к одноразовому процессу
pub struct SileroServerEngine {
    fallback: SileroEngine,
    supervisor: Option<Arc<ServerSupervisor>>,
}

impl SileroServerEngine {
    pub fn new(fallback: SileroEngine, supervisor: Option<Arc<ServerSupervisor>>) -> Self {
        Self {
            fallback,
            supervisor,
        }
    }
}

#[async_trait]
impl SynthesisEngine for SileroServerEngine {
    async fn synthesize(
        &self,
        text: &str,
        options: &ConversionOptions,
        out_file: &Path,
    ) -> Result<()> {
        let supervisor = match &self.supervisor {
            Some(s) if s.is_ready() => s,
            _ => {
                log::debug!("model server not ready, using one-shot Silero process");
                return self.fallback.synthesize(text, options, out_file).await;
            }
        };

        let language = match options.language {
            Language::Ru => "ru",
            Language::En => "en",
        };
        let request = GenerateRequest {
            engine: "silero",
            text,
            speaker: &options.voice,
            language,
            rate: options.rate.as_deref(),
            pitch: options.pitch,
            time_stretch: options.time_stretch,
            speaker_wav: None,
        };

        let audio = supervisor.generate(&request).await?;
        tokio::fs::write(out_file, &audio).await?;
        verify_output(out_file)
    }

    fn backend(&self) -> Backend {
        Backend::SileroServer
    }
}

//! Движок XTTS: серверный путь с клонированием голоса
//!
//! Основной путь — постоянный сервер моделей; при его недоступности
//! фрагмент синтезируется одноразовым процессом той же формы, что у
//! Silero. Поддерживает эталонный голос (`speaker_wav`).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{ConversionOptions, EngineInstall, Language};
use crate::error::{AppError, Result};
use crate::server::{protocol::GenerateRequest, ServerSupervisor};

use super::{verify_output, Backend, SynthesisEngine};

pub struct XttsEngine {
    install: EngineInstall,
    supervisor: Option<Arc<ServerSupervisor>>,
}

impl XttsEngine {
    pub fn new(install: EngineInstall, supervisor: Option<Arc<ServerSupervisor>>) -> Result<Self> {
        if !install.script.exists() {
            return Err(AppError::BackendUnavailable(format!(
                "XTTS generation script not found: {}",
                install.script.display()
            )));
        }
        if !install.model_dir.exists() {
            return Err(AppError::BackendUnavailable(format!(
                "XTTS model directory not found: {}",
                install.model_dir.display()
            )));
        }
        Ok(Self {
            install,
            supervisor,
        })
    }

    async fn synthesize_oneshot(
        &self,
        text: &str,
        options: &ConversionOptions,
        out_file: &Path,
    ) -> Result<()> {
        let language = options.language.as_str();

        let mut cmd = Command::new(&self.install.python);
        cmd.arg(&self.install.script)
            .args(["--text", text])
            .args(["--speaker", &options.voice])
            .args(["--language", language])
            .arg("--output")
            .arg(out_file)
            .arg("--model-dir")
            .arg(&self.install.model_dir)
            .kill_on_drop(true);
        if let Some(wav) = &options.speaker_wav {
            cmd.arg("--speaker-wav").arg(wav);
        }
        if let Some(rate) = &options.rate {
            cmd.args(["--rate", rate]);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| AppError::Synthesis(format!("failed to spawn XTTS process: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            log::debug!("xtts: {}", line);
        }

        if !output.status.success() {
            let tail = stderr.lines().last().unwrap_or("no output").to_string();
            return Err(AppError::Synthesis(format!(
                "XTTS process failed ({}): {}",
                output.status, tail
            )));
        }

        verify_output(out_file)
    }
}

#[async_trait]
impl SynthesisEngine for XttsEngine {
    async fn synthesize(
        &self,
        text: &str,
        options: &ConversionOptions,
        out_file: &Path,
    ) -> Result<()> {
        let supervisor = match &self.supervisor {
            Some(s) if s.is_ready() => s,
            _ => {
                log::debug!("model server not ready, using one-shot XTTS process");
                return self.synthesize_oneshot(text, options, out_file).await;
            }
        };

        let language = match options.language {
            Language::Ru => "ru",
            Language::En => "en",
        };
        let request = GenerateRequest {
            engine: "xtts",
            text,
            speaker: &options.voice,
            language,
            rate: options.rate.as_deref(),
            pitch: options.pitch,
            time_stretch: options.time_stretch,
            speaker_wav: options.speaker_wav.as_ref(),
        };

        let audio = supervisor.generate(&request).await?;
        tokio::fs::write(out_file, &audio).await?;
        verify_output(out_file)
    }

    fn backend(&self) -> Backend {
        Backend::Xtts
    }
}

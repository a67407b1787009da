//! Системный голос ОС: короткоживущий вызов штатного синтезатора
//!
//! На Windows — SAPI через PowerShell (System.Speech), на остальных
//! платформах — espeak/espeak-ng.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{ConversionOptions, InstalledBackends, Language};
use crate::error::{AppError, Result};
use crate::utils::tools::check_command_in_path;

use super::{verify_output, Backend, SynthesisEngine};

enum VoiceBackend {
    Sapi(PathBuf),
    Espeak(PathBuf),
}

pub struct SystemVoiceEngine {
    backend: VoiceBackend,
}

impl SystemVoiceEngine {
    pub fn new(installed: &InstalledBackends) -> Result<Self> {
        if !installed.system_voice {
            return Err(AppError::BackendUnavailable(
                "system voice is not available on this machine".to_string(),
            ));
        }

        let backend = if cfg!(target_os = "windows") {
            let path = check_command_in_path("powershell").map_err(|e| {
                AppError::BackendUnavailable(format!("powershell not found: {}", e))
            })?;
            VoiceBackend::Sapi(path)
        } else {
            let path = check_command_in_path("espeak-ng")
                .or_else(|_| check_command_in_path("espeak"))
                .map_err(|e| {
                    AppError::BackendUnavailable(format!("espeak not found: {}", e))
                })?;
            VoiceBackend::Espeak(path)
        };

        Ok(Self { backend })
    }

    async fn synthesize_sapi(
        &self,
        exe: &Path,
        text: &str,
        options: &ConversionOptions,
        out_file: &Path,
    ) -> Result<()> {
        // Текст передаётся через файл, чтобы не экранировать его в командной строке
        let text_file = out_file.with_extension("txt");
        tokio::fs::write(&text_file, text).await?;

        // SAPI принимает темп в диапазоне -10..10
        let sapi_rate = ((options.rate_factor() - 1.0) * 10.0).round().clamp(-10.0, 10.0) as i32;
        let select_voice = if options.voice.is_empty() {
            String::new()
        } else {
            format!("$s.SelectVoice('{}'); ", options.voice.replace('\'', ""))
        };
        let script = format!(
            "Add-Type -AssemblyName System.Speech; \
             $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
             {}$s.Rate = {}; \
             $s.SetOutputToWaveFile('{}'); \
             $s.Speak([IO.File]::ReadAllText('{}', [Text.Encoding]::UTF8)); \
             $s.Dispose()",
            select_voice,
            sapi_rate,
            out_file.display(),
            text_file.display()
        );

        let output = Command::new(exe)
            .args(["-NoProfile", "-NonInteractive", "-Command", &script])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::Synthesis(format!("failed to run powershell: {}", e)))?;

        let _ = tokio::fs::remove_file(&text_file).await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Synthesis(format!(
                "SAPI synthesis failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn synthesize_espeak(
        &self,
        exe: &Path,
        text: &str,
        options: &ConversionOptions,
        out_file: &Path,
    ) -> Result<()> {
        // espeak принимает темп в словах в минуту, базовый ~175
        let speed = (175.0 * options.rate_factor()).round() as u32;
        let pitch = ((options.pitch.unwrap_or(1.0) * 50.0) as u32).min(99);
        let voice = if options.voice.is_empty() {
            match options.language {
                Language::Ru => "ru",
                Language::En => "en",
            }
            .to_string()
        } else {
            options.voice.clone()
        };

        let output = Command::new(exe)
            .arg("-w")
            .arg(out_file)
            .args(["-v", &voice])
            .args(["-s", &speed.to_string()])
            .args(["-p", &pitch.to_string()])
            .arg(text)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::Synthesis(format!("failed to run espeak: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Synthesis(format!(
                "espeak synthesis failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SynthesisEngine for SystemVoiceEngine {
    async fn synthesize(
        &self,
        text: &str,
        options: &ConversionOptions,
        out_file: &Path,
    ) -> Result<()> {
        match &self.backend {
            VoiceBackend::Sapi(exe) => {
                let exe = exe.clone();
                self.synthesize_sapi(&exe, text, options, out_file).await?
            }
            VoiceBackend::Espeak(exe) => {
                let exe = exe.clone();
                self.synthesize_espeak(&exe, text, options, out_file).await?
            }
        }
        verify_output(out_file)
    }

    fn backend(&self) -> Backend {
        Backend::SystemVoice
    }
}

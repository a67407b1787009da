//! Перекодирование в формат доставки внешней утилитой
//!
//! Финальное перекодирование делегируется ffmpeg, запускаемому отдельным
//! процессом на каждую часть. Отсутствие ffmpeg — фатальная ошибка
//! предусловия с внятным сообщением, а не тихий пропуск.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::config::OutputFormat;
use crate::error::{AppError, Result};
use crate::utils::tools::find_ffmpeg;

/// Проверить наличие и версию ffmpeg до начала работы
pub fn ensure_ffmpeg() -> Result<PathBuf> {
    find_ffmpeg().map_err(|e| {
        AppError::Assembly(format!(
            "ffmpeg is required to produce the output format but was not found: {}",
            e
        ))
    })
}

async fn run_ffmpeg(args: &[&str]) -> Result<()> {
    let ffmpeg = ensure_ffmpeg()?;
    let output = Command::new(&ffmpeg)
        .args(args)
        .output()
        .await
        .map_err(|e| AppError::Assembly(format!("failed to run ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr.lines().last().unwrap_or("no output");
        return Err(AppError::Assembly(format!(
            "ffmpeg failed ({}): {}",
            output.status, tail
        )));
    }
    Ok(())
}

/// Перекодировать готовую WAV часть в формат доставки
pub async fn transcode(input: &Path, output: &Path, format: OutputFormat) -> Result<()> {
    let input_str = input.to_string_lossy().to_string();
    let output_str = output.to_string_lossy().to_string();

    match format {
        OutputFormat::Wav => {
            tokio::fs::copy(input, output).await?;
            Ok(())
        }
        OutputFormat::Mp3 => {
            run_ffmpeg(&[
                "-y",
                "-i",
                &input_str,
                "-codec:a",
                "libmp3lame",
                "-qscale:a",
                "2",
                &output_str,
            ])
            .await
        }
        OutputFormat::Ogg => {
            run_ffmpeg(&[
                "-y",
                "-i",
                &input_str,
                "-codec:a",
                "libvorbis",
                &output_str,
            ])
            .await
        }
    }
}

/// Перекодировать сжатый ответ удалённого API в рабочий WAV конвейера.
/// Ошибка считается временной: фрагмент уйдёт на повтор.
pub async fn decode_to_wav(input: &Path, output: &Path, sample_rate: u32) -> Result<()> {
    let ffmpeg = find_ffmpeg().map_err(|e| {
        AppError::BackendUnavailable(format!("ffmpeg is required to decode remote audio: {}", e))
    })?;

    let output_cmd = Command::new(&ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-ar", &sample_rate.to_string()])
        .args(["-ac", "1"])
        .args(["-sample_fmt", "s16"])
        .arg(output)
        .output()
        .await
        .map_err(|e| AppError::Synthesis(format!("failed to run ffmpeg: {}", e)))?;

    if !output_cmd.status.success() {
        let stderr = String::from_utf8_lossy(&output_cmd.stderr);
        let tail = stderr.lines().last().unwrap_or("no output");
        return Err(AppError::Synthesis(format!(
            "audio decode failed ({}): {}",
            output_cmd.status, tail
        )));
    }
    Ok(())
}

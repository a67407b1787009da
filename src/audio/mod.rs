//! Сборка аудио: из множества синтезированных фрагментов — файлы доставки
//!
//! Фрагменты группируются в части по количеству, каждая часть склеивается
//! в один WAV и независимо перекодируется в формат доставки. Границы
//! частей определяются только счётчиком фрагментов.

pub mod transcode;
pub mod wav;

use std::path::{Path, PathBuf};

use crate::config::OutputFormat;
use crate::error::{AppError, Result};
use crate::progress::ProgressSink;

/// Склеить фрагменты в части и перекодировать каждую в формат доставки.
///
/// При числе фрагментов больше `part_size_limit` выходных файлов несколько:
/// `base_part1.mp3`, `base_part2.mp3` и так далее; иначе один `base.mp3`.
pub async fn assemble(
    fragments: &[PathBuf],
    output_base: &Path,
    part_size_limit: usize,
    format: OutputFormat,
    silence_ms: u32,
    work_dir: &Path,
    progress: &dyn ProgressSink,
) -> Result<Vec<PathBuf>> {
    if fragments.is_empty() {
        return Err(AppError::Assembly(
            "no audio fragments to assemble".to_string(),
        ));
    }
    if format != OutputFormat::Wav {
        transcode::ensure_ffmpeg()?;
    }

    let part_size = part_size_limit.max(1);
    let parts: Vec<&[PathBuf]> = fragments.chunks(part_size).collect();
    let multi_part = parts.len() > 1;

    let mut outputs = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        let part_wav = work_dir.join(format!("part_{}.wav", i + 1));
        let refs: Vec<&Path> = part.iter().map(|p| p.as_path()).collect();
        wav::concat_wav_files(&refs, &part_wav, silence_ms)?;

        let output = output_name(output_base, format, multi_part, i + 1);
        transcode::transcode(&part_wav, &output, format).await?;
        log::info!(
            "assembled part {}/{} -> {}",
            i + 1,
            parts.len(),
            output.display()
        );
        outputs.push(output);

        let percent = (i + 1) as f32 * 100.0 / parts.len() as f32;
        progress.on_progress(
            percent,
            &format!("Assembled part {}/{}", i + 1, parts.len()),
        );
    }

    Ok(outputs)
}

fn output_name(base: &Path, format: OutputFormat, multi_part: bool, part: usize) -> PathBuf {
    let stem = base
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = if multi_part {
        format!("{}_part{}.{}", stem, part, format.extension())
    } else {
        format!("{}.{}", stem, format.extension())
    };
    match base.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_naming() {
        let base = Path::new("/tmp/book");
        assert_eq!(
            output_name(base, OutputFormat::Mp3, false, 1),
            Path::new("/tmp/book.mp3")
        );
        assert_eq!(
            output_name(base, OutputFormat::Mp3, true, 2),
            Path::new("/tmp/book_part2.mp3")
        );
        assert_eq!(
            output_name(base, OutputFormat::Wav, true, 1),
            Path::new("/tmp/book_part1.wav")
        );
    }
}

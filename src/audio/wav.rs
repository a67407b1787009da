//! Склейка WAV фрагментов без перекодирования
//!
//! Фрагменты — несжатый PCM одного формата, гарантированного движками.
//! Склейка берёт заголовок первого фрагмента, пересчитывает оба поля
//! размера (общий и блока данных) как сумму по всем фрагментам, пишет
//! исправленный заголовок один раз и далее льёт полезную нагрузку каждого
//! фрагмента, пропуская его собственный заголовок.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{AppError, Result};

/// Длина канонического заголовка RIFF/WAVE, который пишут движки
pub const WAV_HEADER_LEN: u64 = 44;

/// Общий формат фрагментов
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// Байт на один фрейм (сэмпл по всем каналам)
    pub fn frame_bytes(&self) -> u32 {
        self.channels as u32 * (self.bits_per_sample as u32 / 8)
    }

    /// Размер тишины заданной длительности в байтах, выровненный по фрейму
    pub fn silence_bytes(&self, millis: u32) -> u64 {
        let frames = self.sample_rate as u64 * millis as u64 / 1000;
        frames * self.frame_bytes() as u64
    }
}

/// Прочитать формат фрагмента
pub fn probe_format(path: &Path) -> Result<WavFormat> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| AppError::Assembly(format!("cannot read {}: {}", path.display(), e)))?;
    let spec = reader.spec();
    Ok(WavFormat {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
    })
}

fn data_len(path: &Path) -> Result<u64> {
    let len = std::fs::metadata(path)?.len();
    if len <= WAV_HEADER_LEN {
        return Err(AppError::Assembly(format!(
            "fragment {} is truncated ({} bytes)",
            path.display(),
            len
        )));
    }
    Ok(len - WAV_HEADER_LEN)
}

/// Склеить фрагменты в один WAV, с паузой `silence_ms` между ними
pub fn concat_wav_files(fragments: &[&Path], out_file: &Path, silence_ms: u32) -> Result<()> {
    let first = *fragments.first().ok_or_else(|| {
        AppError::Assembly("no fragments to concatenate".to_string())
    })?;

    let format = probe_format(first)?;
    for path in &fragments[1..] {
        let other = probe_format(path)?;
        if other != format {
            return Err(AppError::Assembly(format!(
                "fragment {} format {:?} does not match {:?}",
                path.display(),
                other,
                format
            )));
        }
    }

    let silence = format.silence_bytes(silence_ms);
    let mut total_data: u64 = 0;
    for (i, path) in fragments.iter().enumerate() {
        total_data += data_len(path)?;
        if i + 1 < fragments.len() {
            total_data += silence;
        }
    }

    // Заголовок первого фрагмента с пересчитанными полями размера
    let mut header = [0u8; WAV_HEADER_LEN as usize];
    {
        let mut reader = File::open(first)?;
        reader.read_exact(&mut header)?;
    }
    let riff_size = (total_data + WAV_HEADER_LEN - 8) as u32;
    header[4..8].copy_from_slice(&riff_size.to_le_bytes());
    header[40..44].copy_from_slice(&(total_data as u32).to_le_bytes());

    let mut writer = BufWriter::new(File::create(out_file)?);
    writer.write_all(&header)?;

    let silence_buf = vec![0u8; 8192];
    for (i, path) in fragments.iter().enumerate() {
        let mut reader = BufReader::new(File::open(path)?);
        reader.seek(SeekFrom::Start(WAV_HEADER_LEN))?;
        io::copy(&mut reader, &mut writer)?;

        if i + 1 < fragments.len() {
            let mut remaining = silence;
            while remaining > 0 {
                let n = remaining.min(silence_buf.len() as u64) as usize;
                writer.write_all(&silence_buf[..n])?;
                remaining -= n as u64;
            }
        }
    }
    writer.flush()?;

    Ok(())
}

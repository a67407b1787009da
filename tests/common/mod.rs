//! Тестовый движок с детерминированным инжектором сбоев

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bookvox::config::ConversionOptions;
use bookvox::engines::{Backend, BackendDescriptor, SynthesisEngine};
use bookvox::error::{AppError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

pub struct MockEngine {
    /// Тексты всех вызовов в порядке поступления
    pub calls: Mutex<Vec<String>>,
    /// Тексты, которые не синтезируются никогда
    pub fail_always: Vec<String>,
    /// Остальные тексты удаются только с этой попытки (1 — с первой)
    pub succeed_on_attempt: u32,
    attempts: Mutex<HashMap<String, u32>>,
    concurrency: usize,
    /// Искусственная длительность синтеза
    pub delay: Duration,
}

impl MockEngine {
    pub fn new(concurrency: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_always: Vec::new(),
            succeed_on_attempt: 1,
            attempts: Mutex::new(HashMap::new()),
            concurrency,
            delay: Duration::ZERO,
        }
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Записывает один сэмпл со значением длины текста — по нему тесты
    /// проверяют порядок фрагментов в собранном файле
    fn write_marker_wav(path: &Path, text: &str) -> Result<()> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)
            .map_err(|e| AppError::Synthesis(e.to_string()))?;
        writer
            .write_sample(text.chars().count() as i16)
            .map_err(|e| AppError::Synthesis(e.to_string()))?;
        writer
            .finalize()
            .map_err(|e| AppError::Synthesis(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SynthesisEngine for MockEngine {
    async fn synthesize(
        &self,
        text: &str,
        _options: &ConversionOptions,
        out_file: &Path,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(text.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_always.iter().any(|t| t == text) {
            return Err(AppError::Synthesis("injected permanent failure".to_string()));
        }

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(text.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        if attempt < self.succeed_on_attempt {
            return Err(AppError::Synthesis(format!(
                "injected transient failure on attempt {}",
                attempt
            )));
        }

        Self::write_marker_wav(out_file, text)
    }

    fn backend(&self) -> Backend {
        Backend::Silero
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            max_chunk_len: 1000,
            cyrillic_chunk_len: None,
            concurrency: self.concurrency,
            server_backed: false,
        }
    }
}

//! # bookvox
//!
//! Конвейер превращения длинного текста в озвученную книгу: нормализация
//! и разбиение текста, диспетчеризация фрагментов по одному из пяти
//! взаимозаменяемых движков синтеза с повторами и делением упавших
//! фрагментов, супервизор постоянного сервера моделей и сборка множества
//! аудиофрагментов в файлы доставки.
//!
//! Графическая оболочка, инсталлятор зависимостей и хранение настроек —
//! внешние участники: ядро получает от них пути установленных движков и
//! колбэк прогресса, а возвращает готовые файлы и предупреждения.

pub mod audio;
pub mod config;
pub mod dispatch;
pub mod engines;
pub mod error;
pub mod progress;
pub mod server;
pub mod text;
pub mod utils;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use config::{ConversionOptions, InstalledBackends, Language, OutputFormat};
use dispatch::DispatchOptions;
use engines::Backend;
use error::{AppError, Result};
use progress::{NullProgress, ProgressSink, ScaledSink};
use server::{ServerConfig, ServerEngine, ServerSupervisor, SERVER_SCRIPT_NAME};
use utils::temp::JobWorkDir;

/// Одна конверсия: текст, движок и параметры. Неизменна после старта
/// диспетчеризации; отмена — через флаг конвертера.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Исходный текст
    pub text: String,

    /// Выбранный движок синтеза
    pub backend: Backend,

    /// Параметры голоса и звука
    pub options: ConversionOptions,

    /// Базовый путь выходных файлов, без расширения
    pub output_base: PathBuf,

    /// Формат доставки
    pub output_format: OutputFormat,

    /// Максимум фрагментов в одной части
    pub part_size_limit: usize,

    /// Параметры повторов и деления
    pub dispatch: DispatchOptions,
}

impl ConversionJob {
    pub fn new(text: impl Into<String>, backend: Backend, output_base: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            backend,
            options: ConversionOptions::default(),
            output_base: output_base.into(),
            output_format: OutputFormat::default(),
            part_size_limit: 500,
            dispatch: DispatchOptions::default(),
        }
    }
}

/// Итог конверсии. Частичные сбои фрагментов — предупреждения внутри
/// успешного результата, а не провал задачи.
#[derive(Debug)]
pub struct ConversionOutcome {
    /// Файлы доставки в порядке частей
    pub output_files: Vec<PathBuf>,

    /// Предупреждения о фрагментах, не пережитых повторами и делением
    pub warnings: Vec<String>,
}

/// Основная точка входа библиотеки: владеет супервизором сервера моделей
/// и выполняет конверсии последовательно, по одной за раз.
pub struct Converter {
    backends: InstalledBackends,
    supervisor: Option<Arc<ServerSupervisor>>,
    progress: Arc<dyn ProgressSink>,
    cancel: Arc<AtomicBool>,
}

impl Converter {
    /// Создать конвертер. Попутно добиваются осиротевшие серверные
    /// процессы, оставшиеся от упавшего прошлого запуска.
    pub fn new(backends: InstalledBackends) -> Self {
        Self::with_progress(backends, Arc::new(NullProgress))
    }

    /// Создать конвертер с приёмником прогресса
    pub fn with_progress(backends: InstalledBackends, progress: Arc<dyn ProgressSink>) -> Self {
        ServerSupervisor::reap_orphans(SERVER_SCRIPT_NAME);

        let supervisor = Self::build_supervisor(&backends);
        Self {
            backends,
            supervisor,
            progress,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    fn build_supervisor(backends: &InstalledBackends) -> Option<Arc<ServerSupervisor>> {
        let script = backends.server_script.clone()?;
        let python = backends
            .silero
            .as_ref()
            .or(backends.xtts.as_ref())
            .map(|install| install.python.clone())?;
        Some(Arc::new(ServerSupervisor::new(ServerConfig::new(
            python,
            script,
            backends.accelerator,
        ))))
    }

    /// Кооперативный флаг отмены: действует между волнами захвата
    /// фрагментов, уже начатый синтез доводится до конца
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Супервизор сервера моделей, если серверные движки установлены
    pub fn supervisor(&self) -> Option<Arc<ServerSupervisor>> {
        self.supervisor.clone()
    }

    /// Запустить одноразовую озвучку-превью с жёсткой отменой,
    /// не мешающую идущей конверсии
    pub fn start_preview(
        &self,
        backend: Backend,
        text: String,
        options: ConversionOptions,
    ) -> Result<engines::Preview> {
        let engine = engines::create_engine(backend, &self.backends, self.supervisor.clone())?;
        let out_file =
            std::env::temp_dir().join(format!("bookvox_preview_{}.wav", uuid::Uuid::new_v4()));
        Ok(engines::Preview::start(engine, text, options, out_file))
    }

    /// Выполнить конверсию целиком: нормализация, диспетчеризация, сборка.
    ///
    /// Задача проваливается, только если не удался ни один фрагмент;
    /// частичные сбои попадают в `warnings`. Временные фрагменты
    /// удаляются на всех путях выхода.
    pub async fn convert(&self, job: &ConversionJob) -> Result<ConversionOutcome> {
        self.cancel.store(false, Ordering::Relaxed);
        job.options.validate()?;
        if job.text.trim().is_empty() {
            return Err(AppError::InvalidInput("input text is empty".to_string()));
        }

        let descriptor = job.backend.descriptor();

        // Серверные движки: поднять сервер и загрузить модель заранее.
        // Сбой жизненного цикла фатален для задачи, но не для супервизора —
        // следующий start() возможен.
        let supervisor = if descriptor.server_backed {
            self.supervisor.clone()
        } else {
            None
        };
        if let Some(sup) = &supervisor {
            self.progress.on_progress(0.0, "Starting model server");
            sup.start().await?;
            let (server_engine, language) = match job.backend {
                Backend::SileroServer => (
                    ServerEngine::Silero,
                    Some(job.options.language.as_str()),
                ),
                Backend::Xtts => (ServerEngine::Xtts, None),
                _ => unreachable!("only server-backed engines reach this branch"),
            };
            let load_progress = ScaledSink::new(self.progress.clone(), 0.0, 5.0);
            sup.load_model(server_engine, language, &load_progress).await?;
        }

        let engine = engines::create_engine(job.backend, &self.backends, supervisor.clone())?;

        // Предусловие сборки проверяется до дорогой диспетчеризации
        if job.output_format != OutputFormat::Wav {
            audio::transcode::ensure_ffmpeg()?;
        }

        self.progress.on_progress(5.0, "Preparing text");
        let max_len = descriptor.chunk_len_for(job.options.language);
        let chunks = text::normalize(&job.text, job.options.language, max_len)?;
        let total_chunks = chunks.len();
        log::info!(
            "converting {} chars as {} chunks via {}",
            job.text.len(),
            total_chunks,
            job.backend.as_str()
        );

        let mut work_dir = JobWorkDir::create(&job.output_base)?;

        let dispatch_progress: Arc<dyn ProgressSink> =
            Arc::new(ScaledSink::new(self.progress.clone(), 5.0, 85.0));
        let results = dispatch::run(
            chunks,
            engine,
            Arc::new(job.options.clone()),
            work_dir.path().to_path_buf(),
            job.dispatch,
            self.cancel.clone(),
            dispatch_progress,
        )
        .await;

        if self.cancel.load(Ordering::Relaxed) {
            log::warn!("conversion cancelled, cleaning up fragments");
            work_dir.cleanup()?;
            return Err(AppError::Cancelled);
        }

        let mut fragments = Vec::new();
        let mut warnings = Vec::new();
        for result in &results {
            if result.success {
                fragments.extend(result.fragments.iter().cloned());
                if let Some(error) = &result.error {
                    warnings.push(format!(
                        "chunk {} partially recovered by splitting: {}",
                        result.id, error
                    ));
                }
            } else {
                warnings.push(format!(
                    "chunk {} failed: {}",
                    result.id,
                    result.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        if fragments.is_empty() {
            work_dir.cleanup()?;
            return Err(AppError::Synthesis(format!(
                "all {} chunks failed to synthesize",
                total_chunks
            )));
        }
        for warning in &warnings {
            log::warn!("{}", warning);
        }

        self.progress.on_progress(90.0, "Assembling audio");
        let assembly_progress = ScaledSink::new(self.progress.clone(), 90.0, 10.0);
        let assembled = audio::assemble(
            &fragments,
            &job.output_base,
            job.part_size_limit,
            job.output_format,
            job.options.sentence_silence_ms,
            work_dir.path(),
            &assembly_progress,
        )
        .await;

        let output_files = match assembled {
            Ok(files) => files,
            Err(e) => {
                work_dir.cleanup()?;
                return Err(e);
            }
        };

        work_dir.cleanup()?;
        self.progress.on_progress(100.0, "Conversion complete");

        Ok(ConversionOutcome {
            output_files,
            warnings,
        })
    }

    /// Остановить сервер моделей; вызывается при завершении приложения,
    /// чтобы не утекали процессы
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(sup) = &self.supervisor {
            sup.stop().await?;
        }
        Ok(())
    }
}

/// Удобная обёртка: конверсия с настройками по умолчанию
pub async fn convert_text(
    text: &str,
    backend: Backend,
    voice: &str,
    language: Language,
    output_base: &std::path::Path,
    backends: InstalledBackends,
) -> Result<ConversionOutcome> {
    let mut job = ConversionJob::new(text, backend, output_base);
    job.options.voice = voice.to_string();
    job.options.language = language;

    let converter = Converter::new(backends);
    converter.convert(&job).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_voice(text: &str, backend: Backend) -> ConversionJob {
        let dir = std::env::temp_dir().join("bookvox_lib_tests");
        let mut job = ConversionJob::new(text, backend, dir.join("book"));
        job.options.voice = "v5_ru/aidar".to_string();
        job
    }

    #[tokio::test]
    async fn empty_text_is_an_input_error() {
        let converter = Converter::new(InstalledBackends::default());
        let job = job_with_voice("   \n  ", Backend::Silero);
        assert!(matches!(
            converter.convert(&job).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn missing_backend_is_fatal_before_dispatch() {
        let converter = Converter::new(InstalledBackends::default());
        let job = job_with_voice("Какой-то текст для озвучки.", Backend::Silero);
        assert!(matches!(
            converter.convert(&job).await,
            Err(AppError::BackendUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn unset_voice_is_a_configuration_error() {
        let converter = Converter::new(InstalledBackends::default());
        let mut job = job_with_voice("Текст.", Backend::Silero);
        job.options.voice = String::new();
        assert!(matches!(
            converter.convert(&job).await,
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn supervisor_requires_server_script() {
        let converter = Converter::new(InstalledBackends::default());
        assert!(converter.supervisor().is_none());
    }
}

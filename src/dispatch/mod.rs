//! Планировщик диспетчеризации фрагментов
//!
//! Ограниченный пул обработчиков тянет фрагменты из общего курсора
//! (worker-pull: порядок завершения не гарантирован, порядок результата
//! стабилен по номеру). Упавший фрагмент повторяется с фиксированной
//! задержкой, затем рекурсивно делится пополам, чтобы локализовать
//! несинтезируемый отрезок до минимальной единицы.

pub mod chunk;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture};

use crate::config::ConversionOptions;
use crate::engines::SynthesisEngine;
use crate::error::AppError;
use crate::progress::{format_eta, EtaTracker, ProgressSink};
use self::chunk::{Chunk, ChunkResult};

/// Фрагменты короче этого порога не делятся
const MIN_SPLIT_LEN: usize = 50;

/// Размер окна скользящего среднего для оценки оставшегося времени
const ETA_WINDOW: usize = 10;

/// Параметры повторов и деления
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Попыток синтеза на фрагмент
    pub max_retries: u32,

    /// Пауза между попытками
    pub retry_delay: Duration,

    /// Глубина рекурсивного деления
    pub max_split_depth: u32,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            max_split_depth: 3,
        }
    }
}

/// Прогнать фрагменты через движок с ограниченным параллелизмом.
///
/// Флаг отмены проверяется между захватами фрагментов: начатый синтез
/// доводится до конца или ошибки, новые фрагменты не берутся. Уже готовые
/// фрагменты остаются на диске — зачистка на совести вызывающего.
/// Результат упорядочен по номеру фрагмента независимо от порядка
/// завершения.
pub async fn run(
    chunks: Vec<Chunk>,
    engine: Arc<dyn SynthesisEngine>,
    options: Arc<ConversionOptions>,
    work_dir: PathBuf,
    dispatch_options: DispatchOptions,
    cancel: Arc<AtomicBool>,
    progress: Arc<dyn ProgressSink>,
) -> Vec<ChunkResult> {
    let total = chunks.len();
    if total == 0 {
        return Vec::new();
    }

    let concurrency = engine.descriptor().concurrency.max(1);
    log::info!(
        "dispatching {} chunks to {} (concurrency {})",
        total,
        engine.backend().as_str(),
        concurrency
    );

    let chunks = Arc::new(chunks);
    let cursor = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let results: Arc<StdMutex<Vec<Option<ChunkResult>>>> =
        Arc::new(StdMutex::new(vec![None; total]));
    let eta = Arc::new(EtaTracker::new(ETA_WINDOW));

    let mut workers = Vec::with_capacity(concurrency.min(total));
    for _ in 0..concurrency.min(total) {
        let chunks = chunks.clone();
        let cursor = cursor.clone();
        let completed = completed.clone();
        let results = results.clone();
        let eta = eta.clone();
        let engine = engine.clone();
        let options = options.clone();
        let work_dir = work_dir.clone();
        let cancel = cancel.clone();
        let progress = progress.clone();

        workers.push(tokio::spawn(async move {
            loop {
                if cancel.load(Ordering::Relaxed) {
                    log::info!("cancellation requested, worker stops claiming chunks");
                    break;
                }
                let i = cursor.fetch_add(1, Ordering::SeqCst);
                if i >= total {
                    break;
                }

                let chunk = chunks[i].clone();
                let started = Instant::now();
                let result = synth_chunk(
                    engine.clone(),
                    options.clone(),
                    work_dir.clone(),
                    chunk,
                    dispatch_options,
                    dispatch_options.max_split_depth,
                )
                .await;
                eta.record(started.elapsed());

                results.lock().unwrap()[i] = Some(result);

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                let percent = done as f32 * 100.0 / total as f32;
                let status = match eta.estimate(total - done, concurrency) {
                    Some(remaining) => format!(
                        "Synthesized {}/{} chunks, ~{} remaining",
                        done,
                        total,
                        format_eta(remaining)
                    ),
                    None => format!("Synthesized {}/{} chunks", done, total),
                };
                progress.on_progress(percent, &status);
            }
        }));
    }

    join_all(workers).await;

    let mut collected = results.lock().unwrap();
    collected.iter_mut().filter_map(Option::take).collect()
}

/// Синтез одного фрагмента: повторы, затем рекурсивное деление.
///
/// Глубина — явный параметр, а не неявная глубина рекурсии, чтобы тесты
/// могли пересчитать точное число попыток. Половины обрабатываются своей
/// изолированной парой задач и не возвращаются в бюджет родительского пула.
fn synth_chunk(
    engine: Arc<dyn SynthesisEngine>,
    options: Arc<ConversionOptions>,
    work_dir: PathBuf,
    chunk: Chunk,
    opts: DispatchOptions,
    depth: u32,
) -> BoxFuture<'static, ChunkResult> {
    Box::pin(async move {
        // Вырожденная половина после деления по краю
        if chunk.text.trim().is_empty() {
            return ChunkResult {
                index: chunk.index,
                id: chunk.id.clone(),
                success: true,
                fragments: Vec::new(),
                error: None,
            };
        }

        let out_file = work_dir.join(format!("chunk_{}.wav", chunk.id));
        let mut last_error = String::new();

        for attempt in 1..=opts.max_retries {
            match engine.synthesize(&chunk.text, &options, &out_file).await {
                Ok(()) => return ChunkResult::ok(&chunk, vec![out_file]),
                Err(AppError::BackendUnavailable(e)) => {
                    // Фатальное предусловие — повторы бессмысленны
                    log::error!("chunk {}: backend unavailable: {}", chunk.id, e);
                    return ChunkResult::failed(&chunk, format!("backend unavailable: {}", e));
                }
                Err(e) => {
                    last_error = e.to_string();
                    log::warn!(
                        "chunk {} attempt {}/{} failed: {}",
                        chunk.id,
                        attempt,
                        opts.max_retries,
                        last_error
                    );
                }
            }
            if attempt < opts.max_retries {
                tokio::time::sleep(opts.retry_delay).await;
            }
        }

        if depth == 0 || chunk.text.chars().count() < MIN_SPLIT_LEN {
            log::error!(
                "chunk {} failed after {} attempts and cannot be split: {}",
                chunk.id,
                opts.max_retries,
                last_error
            );
            return ChunkResult::failed(&chunk, last_error);
        }

        let (left, right) = chunk.split();
        log::info!(
            "chunk {} failed after {} attempts, splitting into {} + {}",
            chunk.id,
            opts.max_retries,
            left.id,
            right.id
        );

        let (left_result, right_result) = futures::join!(
            synth_chunk(
                engine.clone(),
                options.clone(),
                work_dir.clone(),
                left,
                opts,
                depth - 1
            ),
            synth_chunk(engine, options, work_dir, right, opts, depth - 1),
        );

        // Выход детей в порядке родословной; спасаем всё, что удалось
        let mut fragments = Vec::new();
        fragments.extend(left_result.fragments);
        fragments.extend(right_result.fragments);

        let mut errors = Vec::new();
        if let Some(e) = left_result.error {
            errors.push(format!("{}: {}", left_result.id, e));
        }
        if let Some(e) = right_result.error {
            errors.push(format!("{}: {}", right_result.id, e));
        }

        ChunkResult {
            index: chunk.index,
            id: chunk.id,
            success: !fragments.is_empty(),
            fragments,
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        }
    })
}

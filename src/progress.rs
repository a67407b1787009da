//! Модуль для отслеживания прогресса выполнения операций
//!
//! Планировщик и супервизор сервера сообщают о прогрессе через один
//! синхронный колбэк: процент (0–100) и строка состояния.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Приёмник уведомлений о прогрессе
pub trait ProgressSink: Send + Sync {
    /// Вызывается после каждого значимого шага операции
    fn on_progress(&self, percent: f32, status: &str);
}

/// Приёмник, который игнорирует все уведомления
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&self, _percent: f32, _status: &str) {}
}

/// Приёмник, отображающий дочерний диапазон прогресса на участок
/// [base, base + span] родительского.
pub struct ScaledSink {
    inner: std::sync::Arc<dyn ProgressSink>,
    base: f32,
    span: f32,
}

impl ScaledSink {
    pub fn new(inner: std::sync::Arc<dyn ProgressSink>, base: f32, span: f32) -> Self {
        Self { inner, base, span }
    }
}

impl ProgressSink for ScaledSink {
    fn on_progress(&self, percent: f32, status: &str) {
        let scaled = self.base + self.span * percent.clamp(0.0, 100.0) / 100.0;
        self.inner.on_progress(scaled.clamp(0.0, 100.0), status);
    }
}

/// Оценка оставшегося времени по скользящему среднему последних
/// длительностей, делённому на параллелизм пула.
pub struct EtaTracker {
    durations: Mutex<VecDeque<Duration>>,
    window: usize,
}

impl EtaTracker {
    pub fn new(window: usize) -> Self {
        Self {
            durations: Mutex::new(VecDeque::with_capacity(window)),
            window,
        }
    }

    /// Зафиксировать длительность завершившегося фрагмента
    pub fn record(&self, duration: Duration) {
        let mut durations = self.durations.lock().unwrap();
        if durations.len() == self.window {
            durations.pop_front();
        }
        durations.push_back(duration);
    }

    /// Оценить оставшееся время для `remaining` фрагментов при `concurrency`
    /// одновременных обработчиках. Возвращает None, пока нет ни одного замера.
    pub fn estimate(&self, remaining: usize, concurrency: usize) -> Option<Duration> {
        let durations = self.durations.lock().unwrap();
        if durations.is_empty() {
            return None;
        }
        let total: Duration = durations.iter().sum();
        let mean = total / durations.len() as u32;
        let per_worker = remaining as f64 / concurrency.max(1) as f64;
        Some(mean.mul_f64(per_worker))
    }
}

/// Человекочитаемая оценка оставшегося времени для строки состояния
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct TestSink {
        updates: Mutex<Vec<(f32, String)>>,
    }

    impl ProgressSink for TestSink {
        fn on_progress(&self, percent: f32, status: &str) {
            self.updates
                .lock()
                .unwrap()
                .push((percent, status.to_string()));
        }
    }

    #[test]
    fn test_scaled_sink() {
        let sink = Arc::new(TestSink {
            updates: Mutex::new(Vec::new()),
        });
        let scaled = ScaledSink::new(sink.clone(), 10.0, 80.0);

        scaled.on_progress(0.0, "start");
        scaled.on_progress(50.0, "half");
        scaled.on_progress(100.0, "done");

        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates[0].0, 10.0);
        assert_eq!(updates[1].0, 50.0);
        assert_eq!(updates[2].0, 90.0);
    }

    #[test]
    fn test_eta_window() {
        let tracker = EtaTracker::new(10);
        assert!(tracker.estimate(5, 2).is_none());

        for _ in 0..20 {
            tracker.record(Duration::from_secs(2));
        }

        // 10 фрагментов по 2 секунды на 2 обработчика — около 10 секунд
        let eta = tracker.estimate(10, 2).unwrap();
        assert_eq!(eta.as_secs(), 10);
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(Duration::from_secs(42)), "42s");
        assert_eq!(format_eta(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_eta(Duration::from_secs(3700)), "1h 1m");
    }
}

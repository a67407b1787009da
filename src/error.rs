//! Модуль обработки ошибок библиотеки bookvox
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при работе библиотеки.

use thiserror::Error;

/// Ошибки библиотеки bookvox
#[derive(Debug, Error)]
pub enum AppError {
    /// Пустой или непригодный входной текст
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Бэкенд недоступен (нет модели, скрипта или API ключа) — не повторяется
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Временная ошибка синтеза одного фрагмента — повторяется и дробится
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// Ошибка жизненного цикла сервера моделей
    #[error("Model server error: {0}")]
    ServerLifecycle(String),

    /// Ошибка сборки аудио
    #[error("Audio assembly error: {0}")]
    Assembly(String),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Конверсия отменена вызывающей стороной
    #[error("Conversion cancelled")]
    Cancelled,

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Other(s.to_string())
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Other(s)
    }
}

/// Тип Result для библиотеки bookvox
pub type Result<T> = std::result::Result<T, AppError>;

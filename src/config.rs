//! Модуль конфигурации библиотеки bookvox
//!
//! Этот модуль содержит структуры и перечисления для настройки конверсии
//! и описания установленных бэкендов (контракт с инсталлятором).

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Язык озвучиваемого текста
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
}

impl Default for Language {
    fn default() -> Self {
        Self::Ru
    }
}

impl Language {
    /// Получить строковое представление языка
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }
}

/// Класс вычислительного устройства, под которое собрана установка
/// серверных движков. Смена требует переустановки, а не переключения флага.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    Cpu,
    Cuda,
}

impl Default for Accelerator {
    fn default() -> Self {
        Self::Cpu
    }
}

impl Accelerator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        }
    }
}

/// Формат итоговых аудиофайлов
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Wav,
    Mp3,
    Ogg,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Mp3
    }
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
        }
    }
}

/// Установка одного нейросетевого движка, разрешённая инсталлятором
/// под активное устройство (cpu/cuda).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInstall {
    /// Интерпретатор Python из окружения движка
    pub python: PathBuf,

    /// Скрипт одноразовой генерации (по фрагменту на процесс)
    pub script: PathBuf,

    /// Директория с моделями движка
    pub model_dir: PathBuf,
}

/// Что установлено на машине — читается из инсталлятора, ядро само
/// ничего не устанавливает.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstalledBackends {
    /// Доступен ли системный голос ОС
    pub system_voice: bool,

    /// Установка Silero (короткоживущий процесс и серверный путь)
    pub silero: Option<EngineInstall>,

    /// Установка XTTS (серверный путь с клонированием голоса)
    pub xtts: Option<EngineInstall>,

    /// Скрипт постоянного сервера моделей (общий для обоих серверных движков)
    pub server_script: Option<PathBuf>,

    /// API ключ удалённого сервиса синтеза
    pub remote_api_key: Option<String>,

    /// Активное вычислительное устройство установки
    #[serde(default)]
    pub accelerator: Accelerator,
}

/// Параметры одной конверсии, неизменны после старта диспетчеризации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Идентификатор голоса/диктора (для Silero — `v5_ru/aidar`)
    pub voice: String,

    /// Язык текста
    #[serde(default)]
    pub language: Language,

    /// Скорость речи в формате `+50%` / `-25%`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,

    /// Высота тона (1.0 — без изменений)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,

    /// Растяжение по времени без смены тона (1.0 — без изменений)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_stretch: Option<f32>,

    /// Пауза между предложениями в миллисекундах
    #[serde(default)]
    pub sentence_silence_ms: u32,

    /// Эталонный голос для клонирования (только XTTS)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_wav: Option<PathBuf>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            voice: String::new(),
            language: Language::default(),
            rate: None,
            pitch: None,
            time_stretch: None,
            sentence_silence_ms: 0,
            speaker_wav: None,
        }
    }
}

static RATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]\d+%$").unwrap());

impl ConversionOptions {
    /// Проверяет параметры до начала диспетчеризации
    pub fn validate(&self) -> Result<()> {
        if self.voice.trim().is_empty() {
            return Err(AppError::Configuration("voice is not set".to_string()));
        }
        if let Some(rate) = &self.rate {
            if !RATE_RE.is_match(rate) {
                return Err(AppError::Configuration(format!(
                    "invalid rate '{}', expected '+N%' or '-N%'",
                    rate
                )));
            }
        }
        if let Some(pitch) = self.pitch {
            if !(0.5..=2.0).contains(&pitch) {
                return Err(AppError::Configuration(format!(
                    "pitch {} out of range 0.5..2.0",
                    pitch
                )));
            }
        }
        Ok(())
    }

    /// Преобразует строку скорости `+N%`/`-N%` в множитель
    pub fn rate_factor(&self) -> f32 {
        match &self.rate {
            Some(rate) if RATE_RE.is_match(rate) => {
                let percent: f32 = rate[1..rate.len() - 1].parse().unwrap_or(0.0);
                if rate.starts_with('+') {
                    1.0 + percent / 100.0
                } else {
                    1.0 - percent / 100.0
                }
            }
            _ => 1.0,
        }
    }
}

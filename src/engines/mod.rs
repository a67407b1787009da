//! Движки синтеза речи
//!
//! Пять взаимозаменяемых реализаций за единым контрактом «синтезируй
//! фрагмент в файл»: системный голос ОС, нейросетевой движок в
//! короткоживущем процессе, два движка через постоянный сервер моделей
//! и удалённый HTTP API. Выбор — по закрытому перечислению.

pub mod remote;
pub mod silero;
pub mod system;
pub mod xtts;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::{ConversionOptions, InstalledBackends, Language};
use crate::error::{AppError, Result};
use crate::server::ServerSupervisor;

/// Закрытый перечень бэкендов синтеза
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Системный голос ОС, короткоживущий вызов
    SystemVoice,
    /// Silero в короткоживущем процессе на фрагмент
    Silero,
    /// Silero через постоянный сервер моделей
    SileroServer,
    /// XTTS через постоянный сервер, с клонированием голоса
    Xtts,
    /// Удалённый HTTP API
    RemoteApi,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemVoice => "system_voice",
            Self::Silero => "silero",
            Self::SileroServer => "silero_server",
            Self::Xtts => "xtts",
            Self::RemoteApi => "remote_api",
        }
    }

    /// Константы бэкенда: пределы длины фрагмента и параллелизма
    pub fn descriptor(&self) -> BackendDescriptor {
        match self {
            Self::SystemVoice => BackendDescriptor {
                max_chunk_len: 2000,
                cyrillic_chunk_len: None,
                concurrency: 10,
                server_backed: false,
            },
            Self::Silero => BackendDescriptor {
                max_chunk_len: 1000,
                cyrillic_chunk_len: None,
                concurrency: 10,
                server_backed: false,
            },
            Self::SileroServer => BackendDescriptor {
                max_chunk_len: 1000,
                cyrillic_chunk_len: None,
                concurrency: 5,
                server_backed: true,
            },
            // XTTS прожорлив по памяти и небезопасен для параллельного
            // запуска на одной машине; кириллица токенизируется плотнее
            Self::Xtts => BackendDescriptor {
                max_chunk_len: 500,
                cyrillic_chunk_len: Some(250),
                concurrency: 1,
                server_backed: true,
            },
            Self::RemoteApi => BackendDescriptor {
                max_chunk_len: 4000,
                cyrillic_chunk_len: None,
                concurrency: 3,
                server_backed: false,
            },
        }
    }
}

/// Константы одного бэкенда
#[derive(Debug, Clone, Copy)]
pub struct BackendDescriptor {
    /// Максимальная безопасная длина фрагмента в символах
    pub max_chunk_len: usize,

    /// Уменьшенный предел для кириллицы, если движок чувствителен к токенам
    pub cyrillic_chunk_len: Option<usize>,

    /// Максимум одновременных запросов
    pub concurrency: usize,

    /// Идёт ли синтез через постоянный сервер моделей
    pub server_backed: bool,
}

impl BackendDescriptor {
    /// Предел длины фрагмента с учётом письма целевого языка
    pub fn chunk_len_for(&self, language: Language) -> usize {
        match (language, self.cyrillic_chunk_len) {
            (Language::Ru, Some(limit)) => limit,
            _ => self.max_chunk_len,
        }
    }
}

/// Единый контракт движка: синтезировать фрагмент текста в файл.
/// Реализация обязана либо записать полный непустой файл, либо вернуть
/// типизированную ошибку — частичных файлов не бывает.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        options: &ConversionOptions,
        out_file: &Path,
    ) -> Result<()>;

    fn backend(&self) -> Backend;

    fn descriptor(&self) -> BackendDescriptor {
        self.backend().descriptor()
    }
}

/// Собрать движок выбранного бэкенда, проверив его предусловия
pub fn create_engine(
    backend: Backend,
    installed: &InstalledBackends,
    supervisor: Option<Arc<ServerSupervisor>>,
) -> Result<Arc<dyn SynthesisEngine>> {
    match backend {
        Backend::SystemVoice => Ok(Arc::new(system::SystemVoiceEngine::new(installed)?)),
        Backend::Silero => {
            let install = installed.silero.as_ref().ok_or_else(|| {
                AppError::BackendUnavailable("Silero is not installed".to_string())
            })?;
            Ok(Arc::new(silero::SileroEngine::new(install)?))
        }
        Backend::SileroServer => {
            let install = installed.silero.as_ref().ok_or_else(|| {
                AppError::BackendUnavailable("Silero is not installed".to_string())
            })?;
            let fallback = silero::SileroEngine::new(install)?;
            Ok(Arc::new(silero::SileroServerEngine::new(
                fallback, supervisor,
            )))
        }
        Backend::Xtts => {
            let install = installed.xtts.as_ref().ok_or_else(|| {
                AppError::BackendUnavailable("XTTS is not installed".to_string())
            })?;
            Ok(Arc::new(xtts::XttsEngine::new(install.clone(), supervisor)?))
        }
        Backend::RemoteApi => {
            let api_key = installed
                .remote_api_key
                .as_deref()
                .unwrap_or_default()
                .to_string();
            Ok(Arc::new(remote::RemoteApiEngine::new(api_key)?))
        }
    }
}

/// Проверка инварианта результата: файл существует и не пуст
pub(crate) fn verify_output(out_file: &Path) -> Result<()> {
    match std::fs::metadata(out_file) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(AppError::Synthesis(format!(
            "produced empty audio file: {}",
            out_file.display()
        ))),
        Err(e) => Err(AppError::Synthesis(format!(
            "no audio file produced at {}: {}",
            out_file.display(),
            e
        ))),
    }
}

/// Одноразовая озвучка-превью с жёсткой отменой.
///
/// Отмена снимает задачу целиком: обрыв висящего HTTP запроса и, для
/// процессных движков, уничтожение порождённого процесса (команды
/// движков запускаются с `kill_on_drop`). Идущая параллельно полная
/// конверсия не затрагивается.
pub struct Preview {
    cancel_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<PathBuf>>,
}

impl Preview {
    /// Запустить превью выбранным движком
    pub fn start(
        engine: Arc<dyn SynthesisEngine>,
        text: String,
        options: ConversionOptions,
        out_file: PathBuf,
    ) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            tokio::select! {
                result = engine.synthesize(&text, &options, &out_file) => {
                    result.map(|_| out_file)
                }
                _ = cancel_rx => {
                    log::info!("preview cancelled");
                    Err(AppError::Cancelled)
                }
            }
        });
        Self {
            cancel_tx: Some(cancel_tx),
            handle,
        }
    }

    /// Отменить превью; безопасно после завершения
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Дождаться результата превью
    pub async fn wait(self) -> Result<PathBuf> {
        self.handle
            .await
            .map_err(|e| AppError::Other(format!("preview task panicked: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_limits() {
        assert_eq!(Backend::Silero.descriptor().max_chunk_len, 1000);
        assert_eq!(Backend::Xtts.descriptor().concurrency, 1);
        assert!(Backend::Xtts.descriptor().server_backed);
        assert!(!Backend::RemoteApi.descriptor().server_backed);
    }

    #[test]
    fn test_cyrillic_chunk_limit() {
        let descriptor = Backend::Xtts.descriptor();
        assert_eq!(descriptor.chunk_len_for(Language::Ru), 250);
        assert_eq!(descriptor.chunk_len_for(Language::En), 500);

        let descriptor = Backend::Silero.descriptor();
        assert_eq!(descriptor.chunk_len_for(Language::Ru), 1000);
    }

    #[test]
    fn test_missing_backend_rejected() {
        let installed = InstalledBackends::default();
        assert!(matches!(
            create_engine(Backend::Silero, &installed, None),
            Err(AppError::BackendUnavailable(_))
        ));
        assert!(matches!(
            create_engine(Backend::RemoteApi, &installed, None),
            Err(AppError::BackendUnavailable(_))
        ));
    }
}

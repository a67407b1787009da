//! Супервизор постоянного сервера моделей
//!
//! Владеет жизненным циклом рабочего процесса, который держит нейросетевые
//! модели тёплыми в памяти: запуск с ожиданием готовности, учёт загруженных
//! моделей, мягкое завершение с принудительным добиванием дерева процессов
//! и зачистка осиротевших процессов от предыдущих падений.

pub mod protocol;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex as TokioMutex;

use crate::config::Accelerator;
use crate::error::{AppError, Result};
use crate::progress::ProgressSink;
use self::protocol::ServerClient;

/// Имя скрипта сервера — сигнатура для поиска осиротевших процессов
pub const SERVER_SCRIPT_NAME: &str = "bookvox_server.py";

/// Порт локального протокола управления
pub const DEFAULT_SERVER_PORT: u16 = 7821;

/// Фаза жизненного цикла сервера
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    Stopped,
    Starting,
    Ready,
    Stopping,
}

/// Серверные движки, которым выгоден тёплый старт
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEngine {
    Silero,
    Xtts,
}

impl ServerEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Silero => "silero",
            Self::Xtts => "xtts",
        }
    }
}

/// Учёт резидентных моделей: у Silero независимо загружаются два языка,
/// у XTTS — одна модель.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelSlots {
    pub silero_ru: bool,
    pub silero_en: bool,
    pub xtts: bool,
}

impl ModelSlots {
    pub fn any_loaded(&self) -> bool {
        self.silero_ru || self.silero_en || self.xtts
    }
}

/// Конфигурация запуска серверного процесса
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Интерпретатор Python окружения серверных движков
    pub python: PathBuf,

    /// Скрипт сервера
    pub script: PathBuf,

    /// Порт протокола управления
    pub port: u16,

    /// Вычислительное устройство установки
    pub device: Accelerator,

    /// Бюджет опроса готовности
    pub startup_attempts: u32,

    /// Интервал опроса готовности
    pub poll_interval: Duration,

    /// Пауза между `/shutdown` и принудительным завершением
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    pub fn new(python: PathBuf, script: PathBuf, device: Accelerator) -> Self {
        Self {
            python,
            script,
            port: DEFAULT_SERVER_PORT,
            device,
            startup_attempts: 60,
            poll_interval: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Супервизор: ровно один экземпляр сервера на запуск приложения.
/// Все переходы состояния идут через его методы; одновременные
/// `start()`/`stop()` сериализуются блокировкой на дескрипторе процесса.
pub struct ServerSupervisor {
    config: ServerConfig,
    client: ServerClient,
    phase: StdMutex<ServerPhase>,
    slots: StdMutex<ModelSlots>,
    process: TokioMutex<Option<Child>>,
}

impl ServerSupervisor {
    pub fn new(config: ServerConfig) -> Self {
        let client = ServerClient::new(config.port);
        Self {
            config,
            client,
            phase: StdMutex::new(ServerPhase::Stopped),
            slots: StdMutex::new(ModelSlots::default()),
            process: TokioMutex::new(None),
        }
    }

    /// Текущая фаза; не блокируется на идущем запуске
    pub fn phase(&self) -> ServerPhase {
        *self.phase.lock().unwrap()
    }

    /// Снимок учёта резидентных моделей
    pub fn slots(&self) -> ModelSlots {
        *self.slots.lock().unwrap()
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == ServerPhase::Ready
    }

    pub fn client(&self) -> &ServerClient {
        &self.client
    }

    fn set_phase(&self, phase: ServerPhase) {
        *self.phase.lock().unwrap() = phase;
    }

    /// Принудительно завершить процессы сервера, оставшиеся от упавшего
    /// запуска приложения. Вызывается один раз при каждом старте приложения.
    pub fn reap_orphans(signature: &str) {
        log::info!("reaping orphaned server processes matching '{}'", signature);

        #[cfg(unix)]
        {
            let _ = std::process::Command::new("pkill")
                .args(["-9", "-f", signature])
                .output();
        }

        #[cfg(windows)]
        {
            let _ = std::process::Command::new("wmic")
                .args([
                    "process",
                    "where",
                    &format!("CommandLine like '%{}%'", signature),
                    "call",
                    "terminate",
                ])
                .output();
        }
    }

    /// Запустить сервер и дождаться готовности.
    ///
    /// Если сервер уже готов — ничего не делает. Одновременные вызовы
    /// сериализуются: второй ждёт завершения первого запуска и видит
    /// готовый сервер, не порождая второго процесса.
    pub async fn start(&self) -> Result<()> {
        let mut process = self.process.lock().await;

        if self.phase() == ServerPhase::Ready {
            return Ok(());
        }

        self.set_phase(ServerPhase::Starting);
        log::info!(
            "starting model server: {} {} (port {}, device {})",
            self.config.python.display(),
            self.config.script.display(),
            self.config.port,
            self.config.device.as_str()
        );

        let mut cmd = Command::new(&self.config.python);
        cmd.arg(&self.config.script)
            .args(["--port", &self.config.port.to_string()])
            .args(["--device", self.config.device.as_str()])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Сервер порождает собственные вспомогательные процессы; своя группа
        // позволяет потом завершить всё дерево одним сигналом
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setpgid(0, 0);
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| {
            self.set_phase(ServerPhase::Stopped);
            AppError::ServerLifecycle(format!("failed to spawn model server: {}", e))
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::info!("model server: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::warn!("model server: {}", line);
                }
            });
        }

        // Опрос статуса до готовности или исчерпания бюджета
        for attempt in 0..self.config.startup_attempts {
            if let Ok(Some(status)) = child.try_wait() {
                self.set_phase(ServerPhase::Stopped);
                return Err(AppError::ServerLifecycle(format!(
                    "model server exited during startup with {}",
                    status
                )));
            }

            if self.client.status().await.is_ok() {
                log::info!("model server ready after {} poll attempts", attempt + 1);
                *process = Some(child);
                self.set_phase(ServerPhase::Ready);
                return Ok(());
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        kill_process_tree(&mut child).await;
        self.set_phase(ServerPhase::Stopped);
        Err(AppError::ServerLifecycle(format!(
            "model server did not become ready within {:?}",
            self.config.poll_interval * self.config.startup_attempts
        )))
    }

    /// Остановить сервер: мягко через `/shutdown`, затем безусловно
    /// завершить всё дерево процессов. Выполняется и при зависшем сервере.
    pub async fn stop(&self) -> Result<()> {
        let mut process = self.process.lock().await;

        if process.is_none() && self.phase() == ServerPhase::Stopped {
            return Ok(());
        }

        self.set_phase(ServerPhase::Stopping);

        if let Err(e) = self.client.shutdown().await {
            log::warn!("graceful shutdown failed, will kill process tree: {}", e);
        }
        tokio::time::sleep(self.config.shutdown_grace).await;

        if let Some(mut child) = process.take() {
            kill_process_tree(&mut child).await;
        }

        *self.slots.lock().unwrap() = ModelSlots::default();
        self.set_phase(ServerPhase::Stopped);
        log::info!("model server stopped");
        Ok(())
    }

    /// Идемпотентно загрузить модель движка (для Silero — конкретного языка)
    pub async fn load_model(
        &self,
        engine: ServerEngine,
        language: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        {
            let slots = self.slots.lock().unwrap();
            let already = match (engine, language) {
                (ServerEngine::Silero, Some("en")) => slots.silero_en,
                (ServerEngine::Silero, _) => slots.silero_ru,
                (ServerEngine::Xtts, _) => slots.xtts,
            };
            if already {
                return Ok(());
            }
        }

        if !self.is_ready() {
            return Err(AppError::ServerLifecycle(
                "model server is not running".to_string(),
            ));
        }

        progress.on_progress(
            0.0,
            &format!("Loading {} model (may take minutes on first run)", engine.as_str()),
        );
        self.client.load(engine.as_str(), language).await?;

        {
            let mut slots = self.slots.lock().unwrap();
            match (engine, language) {
                (ServerEngine::Silero, Some("en")) => slots.silero_en = true,
                (ServerEngine::Silero, _) => slots.silero_ru = true,
                (ServerEngine::Xtts, _) => slots.xtts = true,
            }
        }
        progress.on_progress(100.0, &format!("{} model loaded", engine.as_str()));
        Ok(())
    }

    /// Выгрузить модель (или все модели движка при `language = "all"`).
    /// Когда резидентных моделей не остаётся, сервер останавливается.
    pub async fn unload_model(&self, engine: ServerEngine, language: Option<&str>) -> Result<()> {
        if !self.is_ready() {
            return Ok(());
        }

        self.client.unload(engine.as_str(), language).await?;

        let remaining = {
            let mut slots = self.slots.lock().unwrap();
            match (engine, language) {
                (ServerEngine::Silero, Some("all")) => {
                    slots.silero_ru = false;
                    slots.silero_en = false;
                }
                (ServerEngine::Silero, Some("en")) => slots.silero_en = false,
                (ServerEngine::Silero, _) => slots.silero_ru = false,
                (ServerEngine::Xtts, _) => slots.xtts = false,
            }
            *slots
        };

        if !remaining.any_loaded() {
            log::info!("no models resident, shutting model server down");
            self.stop().await?;
        }
        Ok(())
    }

    /// Синтез через серверный протокол; сразу отказывает, если сервер не готов
    pub async fn generate(&self, request: &protocol::GenerateRequest<'_>) -> Result<bytes::Bytes> {
        if !self.is_ready() {
            return Err(AppError::ServerLifecycle(
                "model server is not running".to_string(),
            ));
        }
        self.client.generate(request).await
    }
}

/// Завершить процесс вместе со всеми его потомками
async fn kill_process_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        #[cfg(unix)]
        unsafe {
            // Сервер запущен лидером собственной группы
            libc::killpg(pid as i32, libc::SIGKILL);
        }

        #[cfg(windows)]
        {
            let _ = std::process::Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/T", "/F"])
                .output();
        }
    }

    let _ = child.kill().await;
    let _ = child.wait().await;
}

//! Жизненный цикл супервизора сервера моделей против мок-сервера протокола
//!
//! Сам рабочий процесс заменён долгоживущим `sleep`, а протокол управления
//! обслуживает wiremock на том же порту, куда смотрит клиент супервизора.

#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use bookvox::config::Accelerator;
use bookvox::error::AppError;
use bookvox::progress::NullProgress;
use bookvox::server::{
    protocol::{GenerateRequest, ServerClient},
    ModelSlots, ServerConfig, ServerEngine, ServerPhase, ServerSupervisor,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    _dir: tempfile::TempDir,
    script: PathBuf,
    spawn_log: PathBuf,
}

/// Скрипт-заглушка: отмечает запуск в файле и висит, изображая сервер
fn fake_server_script() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let spawn_log = dir.path().join("spawns.log");
    let script = dir.path().join("bookvox_server.py");
    std::fs::write(
        &script,
        format!("echo spawned >> {}\nexec sleep 30\n", spawn_log.display()),
    )
    .unwrap();
    Fixture {
        _dir: dir,
        script,
        spawn_log,
    }
}

fn supervisor_config(script: PathBuf, port: u16) -> ServerConfig {
    let mut config = ServerConfig::new(PathBuf::from("/bin/sh"), script, Accelerator::Cpu);
    config.port = port;
    config.poll_interval = Duration::from_millis(20);
    config.startup_attempts = 50;
    config.shutdown_grace = Duration::from_millis(50);
    config
}

async fn mock_status(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ready",
            "loaded_models": [],
            "memory_mb": 512.0,
            "device": "cpu",
        })))
        .mount(server)
        .await;
}

fn spawn_count(fixture: &Fixture) -> usize {
    std::fs::read_to_string(&fixture.spawn_log)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

/// Скрипт пишет отметку о запуске асинхронно относительно готовности,
/// поэтому счётчик опрашивается с ожиданием.
async fn wait_spawn_count(fixture: &Fixture, expected: usize) {
    for _ in 0..100 {
        if spawn_count(fixture) == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(spawn_count(fixture), expected);
}

/// Два одновременных start() порождают ровно один процесс,
/// и оба вызывающих видят готовый сервер.
#[tokio::test]
async fn concurrent_start_is_single_flight() {
    let fixture = fake_server_script();
    let mock = MockServer::start().await;
    mock_status(&mock).await;

    let supervisor =
        ServerSupervisor::new(supervisor_config(fixture.script.clone(), mock.address().port()));

    let (first, second) = tokio::join!(supervisor.start(), supervisor.start());
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(supervisor.phase(), ServerPhase::Ready);
    wait_spawn_count(&fixture, 1).await;

    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.phase(), ServerPhase::Stopped);
}

/// stop() при недоступном /shutdown всё равно завершает дерево процессов
/// в пределах паузы, и состояние возвращается в Stopped; последующий
/// start() снова возможен.
#[tokio::test]
async fn stop_kills_process_tree_when_shutdown_unreachable() {
    let fixture = fake_server_script();
    let mock = MockServer::start().await;
    // /shutdown намеренно не замокан: клиент получает 404
    mock_status(&mock).await;

    let supervisor =
        ServerSupervisor::new(supervisor_config(fixture.script.clone(), mock.address().port()));

    supervisor.start().await.unwrap();
    assert_eq!(supervisor.phase(), ServerPhase::Ready);

    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.phase(), ServerPhase::Stopped);

    // Супервизор не сломан сбоем мягкого пути: сервер поднимается снова
    supervisor.start().await.unwrap();
    assert_eq!(supervisor.phase(), ServerPhase::Ready);
    wait_spawn_count(&fixture, 2).await;

    supervisor.stop().await.unwrap();
}

/// Провал готовности: бюджет опроса исчерпан, состояние Stopped,
/// ошибка описательная.
#[tokio::test]
async fn start_fails_cleanly_when_server_never_becomes_ready() {
    let fixture = fake_server_script();

    // Порт 1 закрыт: статус не ответит никогда
    let mut config = supervisor_config(fixture.script.clone(), 1);
    config.startup_attempts = 3;
    let supervisor = ServerSupervisor::new(config);

    let result = supervisor.start().await;
    match result {
        Err(AppError::ServerLifecycle(message)) => {
            assert!(message.contains("did not become ready"));
        }
        other => panic!("expected ServerLifecycle error, got {:?}", other.err()),
    }
    assert_eq!(supervisor.phase(), ServerPhase::Stopped);
}

/// Учёт моделей: независимые слоты Silero по языкам и слот XTTS;
/// выгрузка до нуля моделей останавливает сервер.
#[tokio::test]
async fn model_slots_track_load_and_unload_to_zero() {
    let fixture = fake_server_script();
    let mock = MockServer::start().await;
    mock_status(&mock).await;
    for endpoint in ["/load", "/unload", "/shutdown"] {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&mock)
            .await;
    }

    let supervisor =
        ServerSupervisor::new(supervisor_config(fixture.script.clone(), mock.address().port()));
    supervisor.start().await.unwrap();

    supervisor
        .load_model(ServerEngine::Silero, Some("ru"), &NullProgress)
        .await
        .unwrap();
    supervisor
        .load_model(ServerEngine::Xtts, None, &NullProgress)
        .await
        .unwrap();
    assert_eq!(
        supervisor.slots(),
        ModelSlots {
            silero_ru: true,
            silero_en: false,
            xtts: true,
        }
    );

    // Повторная загрузка идемпотентна
    supervisor
        .load_model(ServerEngine::Silero, Some("ru"), &NullProgress)
        .await
        .unwrap();

    supervisor
        .unload_model(ServerEngine::Silero, Some("ru"))
        .await
        .unwrap();
    assert_eq!(supervisor.phase(), ServerPhase::Ready);

    // Последняя модель выгружена — сервер останавливается
    supervisor.unload_model(ServerEngine::Xtts, None).await.unwrap();
    assert_eq!(supervisor.phase(), ServerPhase::Stopped);
    assert!(!supervisor.slots().any_loaded());
}

/// generate без работающего сервера отказывает сразу
#[tokio::test]
async fn generate_fails_fast_when_server_not_running() {
    let fixture = fake_server_script();
    let supervisor = ServerSupervisor::new(supervisor_config(fixture.script.clone(), 1));

    let request = GenerateRequest {
        engine: "silero",
        text: "test",
        speaker: "v5_ru/aidar",
        language: "ru",
        rate: None,
        pitch: None,
        time_stretch: None,
        speaker_wav: None,
    };
    let result = supervisor.generate(&request).await;
    assert!(matches!(result, Err(AppError::ServerLifecycle(_))));
}

/// Сервер обязан отказать, если модель не загружена: клиент протокола
/// доносит его сообщение как ошибку синтеза.
#[tokio::test]
async fn generate_surfaces_model_not_loaded_error() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(
            ResponseTemplate::new(409).set_body_string("model silero/ru is not loaded"),
        )
        .mount(&mock)
        .await;

    let client = ServerClient::new(mock.address().port());
    let request = GenerateRequest {
        engine: "silero",
        text: "test",
        speaker: "v5_ru/aidar",
        language: "ru",
        rate: None,
        pitch: None,
        time_stretch: None,
        speaker_wav: None,
    };
    match client.generate(&request).await {
        Err(AppError::Synthesis(message)) => {
            assert!(message.contains("model silero/ru is not loaded"));
        }
        other => panic!("expected Synthesis error, got {:?}", other.err()),
    }
}

//! Инициализация логирования для хост-приложения

use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

pub fn init_logger() {
    let env = Env::default().filter_or("RUST_LOG", "warn,bookvox=info");

    let mut builder = Builder::from_env(env);

    builder
        // Подавляем шумные HTTP-модули
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("mio", LevelFilter::Error)
        .filter_module("reqwest", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}

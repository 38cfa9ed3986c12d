use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

const DEFAULT_FILTER: &str = "info,tts_prep=info";

pub fn init_logger() {
    // Базовый фильтр можно переопределить через RUST_LOG
    let env = Env::default().filter_or("RUST_LOG", DEFAULT_FILTER);

    let mut builder = Builder::from_env(env);

    // Явно подавляем шумные модули
    builder
        .filter_module("hyper", LevelFilter::Warn)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("mio", LevelFilter::Error)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} {}: {}",
                chrono::Local::now().format("%m/%d %I:%M:%S %p"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stdout);

    // Повторная инициализация (например, из тестов) не является ошибкой
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}

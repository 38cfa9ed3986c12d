//! Вспомогательные модули: логирование, временные файлы, внешние утилиты

pub mod logger;
pub mod temp;
pub mod tools;

//! Модуль корпуса: записи датасета и загрузка метаданных

pub mod loader;

pub use loader::load_metadata;

/// Одна запись корпуса
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Абсолютный путь к аудиофайлу
    pub file_path: String,
    /// Исходный текст
    pub raw_text: String,
    /// Нормализованный текст
    pub normalized_text: String,
    /// Очищенный текст (результат групп очистки до токенизации)
    pub cleaned_text: String,
    /// Токены очищенного текста
    pub tokens: Vec<String>,
    /// Индексы токенов в словаре
    pub token_ids: Vec<u32>,
}

impl Record {
    /// Создать новую запись без результатов обработки
    pub fn new(file_path: String, raw_text: String, normalized_text: String) -> Self {
        Self {
            file_path,
            raw_text,
            normalized_text,
            ..Self::default()
        }
    }
}

//! Модуль обработки ошибок библиотеки tts-prep
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при подготовке
//! датасета и работе вспомогательных утилит обучения.

use thiserror::Error;

/// Ошибки библиотеки tts-prep
#[derive(Debug, Error)]
pub enum TtsPrepError {
    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка чтения таблицы метаданных
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Ошибка кодирования изображения
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Файл не найден
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Неверный формат
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Ошибка словаря
    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    /// Неизвестный токен после кодирования словарем
    #[error("Found unknown symbol in {file}:\n{text}\n{decoded}")]
    UnknownToken {
        /// Путь к аудиофайлу записи
        file: String,
        /// Очищенный текст записи
        text: String,
        /// Декодированная последовательность токенов
        decoded: String,
    },

    /// Ошибка фонемизатора
    #[error("Phonemizer error: {0}")]
    Phonemizer(String),

    /// Ошибка загрузки датасета
    #[error("Download error: {0}")]
    Download(String),

    /// Отсутствуют или неполные учетные данные
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Доступ запрещен
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Ошибка объектного хранилища
    #[error("Storage error: {0}")]
    Storage(String),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl From<&str> for TtsPrepError {
    fn from(s: &str) -> Self {
        TtsPrepError::Other(s.to_string())
    }
}

impl From<String> for TtsPrepError {
    fn from(s: String) -> Self {
        TtsPrepError::Other(s)
    }
}

/// Тип Result для библиотеки tts-prep
pub type Result<T> = std::result::Result<T, TtsPrepError>;

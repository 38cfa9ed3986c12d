//! Модуль конфигурации библиотеки tts-prep
//!
//! Этот модуль содержит структуры для настройки подготовки датасета.
//! Конфигурация хранится в JSON, все поля имеют значения по умолчанию.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TtsPrepError};
use crate::text::symbols::{PHONEMIZE_STAGE, TOKENIZE_STAGE};

/// Переменная окружения, переопределяющая путь к датасету
pub const DATASET_PATH_ENV: &str = "DATASET_PATH";

/// Порядок назначения индексов токенам словаря
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenOrder {
    /// В порядке первого появления в корпусе
    #[default]
    FirstSeen,
    /// По убыванию частоты, при равенстве - лексикографически
    Frequency,
}

/// Настройки очистки текста
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Упорядоченный список этапов очистки
    pub text_cleaners: Vec<String>,
    /// Язык фонемизатора (например, "en-us")
    pub language: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            text_cleaners: vec![
                "lowercase".to_string(),
                "expand_abbreviations".to_string(),
                "collapse_whitespace".to_string(),
                PHONEMIZE_STAGE.to_string(),
                TOKENIZE_STAGE.to_string(),
                "add_blank".to_string(),
            ],
            language: "en-us".to_string(),
        }
    }
}

/// Настройки разбиения на выборки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SplitConfig {
    /// Размер валидационной выборки
    pub n_val: usize,
    /// Размер тестовой выборки
    pub n_test: usize,
    /// Зерно генератора для воспроизводимого перемешивания
    pub seed: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            n_val: 100,
            n_test: 500,
            seed: None,
        }
    }
}

/// Настройки внешнего фонемизатора
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhonemizerConfig {
    /// Имя или путь исполняемого файла espeak-ng
    pub program: String,
}

impl Default for PhonemizerConfig {
    fn default() -> Self {
        Self {
            program: "espeak-ng".to_string(),
        }
    }
}

/// Конфигурация подготовки датасета
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Директория распакованного датасета
    pub dataset_path: PathBuf,
    /// Имя файла метаданных внутри `dataset_path`
    pub metadata_file: String,
    /// Корень аудиофайлов (обычно символическая ссылка на датасет)
    pub audio_root: PathBuf,
    /// Директория для train/val/test файлов
    pub output_dir: PathBuf,
    /// Путь к файлу словаря
    pub vocab_file: PathBuf,
    /// Разделитель полей в метаданных
    pub delimiter: String,
    /// Ограничение на количество читаемых строк метаданных
    pub max_rows: Option<usize>,
    /// Настройки очистки текста
    pub data: DataConfig,
    /// Настройки разбиения
    pub split: SplitConfig,
    /// Порядок индексов словаря
    pub vocab_order: TokenOrder,
    /// Настройки фонемизатора
    pub phonemizer: PhonemizerConfig,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("downloaded_datasets/LJSpeech-1.1"),
            metadata_file: "metadata_copy.csv".to_string(),
            audio_root: PathBuf::from("downloaded_datasets/DUMMY1"),
            output_dir: PathBuf::from("downloaded_datasets"),
            vocab_file: PathBuf::from("downloaded_datasets/vocab.txt"),
            delimiter: "|".to_string(),
            max_rows: None,
            data: DataConfig::default(),
            split: SplitConfig::default(),
            vocab_order: TokenOrder::default(),
            phonemizer: PhonemizerConfig::default(),
        }
    }
}

impl PrepConfig {
    /// Загрузить конфигурацию из JSON файла
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TtsPrepError::FileNotFound(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let json = fs::read_to_string(path)?;
        let config: PrepConfig = serde_json::from_str(&json)
            .map_err(|e| TtsPrepError::Configuration(format!("{}: {}", path.display(), e)))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Сохранить конфигурацию в JSON файл
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Применить переопределения из переменных окружения
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(DATASET_PATH_ENV) {
            if !path.trim().is_empty() {
                log::info!("Using dataset path from {}: {}", DATASET_PATH_ENV, path);
                self.dataset_path = PathBuf::from(path);
            }
        }
    }

    /// Путь к файлу метаданных
    pub fn metadata_path(&self) -> PathBuf {
        self.dataset_path.join(&self.metadata_file)
    }

    /// Разделитель полей в виде байта
    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ => Err(TtsPrepError::Configuration(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            ))),
        }
    }

    /// Проверить корректность конфигурации
    pub fn validate(&self) -> Result<()> {
        self.delimiter_byte()?;

        if self.data.text_cleaners.is_empty() {
            return Err(TtsPrepError::Configuration(
                "data.text_cleaners must not be empty".to_string(),
            ));
        }

        if self.data.language.trim().is_empty() {
            return Err(TtsPrepError::Configuration(
                "data.language must not be empty".to_string(),
            ));
        }

        if self.max_rows == Some(0) {
            return Err(TtsPrepError::Configuration(
                "max_rows must be greater than zero when set".to_string(),
            ));
        }

        Ok(())
    }
}

//! Модуль для работы с временными файлами
//!
//! Этот модуль содержит менеджер рабочей директории, которая живет ровно
//! столько, сколько владеющий ею объект (например, сессия фонемизатора).

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// Менеджер временных файлов
pub struct TempFileManager {
    /// Временная директория
    temp_dir: TempDir,
    /// Список созданных файлов
    files: Vec<PathBuf>,
}

impl TempFileManager {
    /// Создать новый экземпляр TempFileManager
    pub fn new(prefix: &str) -> Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix(prefix).tempdir()?;

        Ok(Self {
            temp_dir,
            files: Vec::new(),
        })
    }

    /// Создать пустой временный файл
    pub fn create_temp_file(&mut self, prefix: &str, extension: &str) -> Result<PathBuf> {
        let file_name = format!("{}_{}.{}", prefix, uuid::Uuid::new_v4(), extension);
        let file_path = self.temp_dir.path().join(file_name);

        fs::File::create(&file_path)?;
        self.files.push(file_path.clone());

        Ok(file_path)
    }

    /// Получить путь к временной директории
    pub fn temp_dir_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Количество созданных файлов
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Удалить созданные файлы, оставив директорию
    pub fn cleanup(&mut self) -> Result<()> {
        for file in &self.files {
            if file.exists() {
                fs::remove_file(file)?;
            }
        }
        self.files.clear();

        Ok(())
    }
}

impl Drop for TempFileManager {
    fn drop(&mut self) {
        // Директорию удалит TempDir, здесь только файлы
        if let Err(e) = self.cleanup() {
            log::warn!(
                "Failed to clean up temporary files in {}: {}",
                self.temp_dir.path().display(),
                e
            );
        }
    }
}

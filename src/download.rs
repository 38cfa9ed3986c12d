//! Загрузка и распаковка корпуса LJSpeech
//!
//! Архив скачивается потоком, при необходимости сверяется MD5, затем
//! распаковывается системным `tar`. Рядом создается символическая ссылка на
//! корень аудио и копия файла метаданных, с которой работает подготовка.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, TtsPrepError};
use crate::progress::{ProcessStep, ProgressTracker};

/// Адрес архива по умолчанию
pub const DEFAULT_DATASET_URL: &str = "https://data.keithito.com/data/speech/LJSpeech-1.1.tar.bz2";
/// Имя директории датасета после распаковки
pub const DEFAULT_DATASET_NAME: &str = "LJSpeech-1.1";
/// Имя символической ссылки на корень аудио
pub const AUDIO_ROOT_LINK: &str = "DUMMY1";

const METADATA_FILE: &str = "metadata.csv";
const METADATA_COPY_FILE: &str = "metadata_copy.csv";

/// Загрузчик датасета
#[derive(Debug, Clone)]
pub struct DatasetDownloader {
    url: String,
    download_dir: PathBuf,
    dataset_name: String,
    expected_md5: Option<String>,
}

impl DatasetDownloader {
    /// Загрузчик LJSpeech в указанную директорию
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: DEFAULT_DATASET_URL.to_string(),
            download_dir: download_dir.into(),
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
            expected_md5: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_dataset_name(mut self, name: impl Into<String>) -> Self {
        self.dataset_name = name.into();
        self
    }

    /// Проверять MD5 скачанного архива
    pub fn with_expected_md5(mut self, md5: impl Into<String>) -> Self {
        self.expected_md5 = Some(md5.into().to_lowercase());
        self
    }

    /// Путь к архиву
    pub fn archive_path(&self) -> PathBuf {
        self.download_dir.join(format!("{}.tar.bz2", self.dataset_name))
    }

    /// Путь к распакованному датасету
    pub fn dataset_dir(&self) -> PathBuf {
        self.download_dir.join(&self.dataset_name)
    }

    /// Путь к символической ссылке на корень аудио
    pub fn link_path(&self) -> PathBuf {
        self.download_dir.join(AUDIO_ROOT_LINK)
    }

    /// Скачать, распаковать и подготовить датасет
    ///
    /// Возвращает путь к директории датасета.
    pub async fn prepare_dataset(&self, tracker: Option<&ProgressTracker>) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let archive = self.archive_path();
        if let Some(t) = tracker {
            t.set_step(ProcessStep::Download);
        }
        if archive.exists() {
            log::info!("Archive {} already exists, skipping download", archive.display());
        } else {
            log::info!("Downloading {} dataset from {}", self.dataset_name, self.url);
            self.download_file(&archive, tracker).await?;
        }

        if let Some(t) = tracker {
            t.set_step(ProcessStep::Extract);
        }
        extract_tar_bz2(&archive, &self.download_dir).await?;

        let dataset_dir = absolute(&self.dataset_dir())?;
        link_audio_root(&dataset_dir, &self.link_path())?;
        copy_metadata(&dataset_dir)?;

        if let Some(t) = tracker {
            t.complete();
        }

        log::info!("Dataset location: {}", dataset_dir.display());
        log::info!("Audio root link: {}", absolute(&self.link_path())?.display());
        Ok(dataset_dir)
    }

    async fn download_file(&self, target: &Path, tracker: Option<&ProgressTracker>) -> Result<()> {
        let response = reqwest::get(&self.url).await?;
        if !response.status().is_success() {
            return Err(TtsPrepError::Download(format!(
                "GET {} returned {}",
                self.url,
                response.status()
            )));
        }

        let total_size = response.content_length();
        // Архив пишется во временный файл: прерванная загрузка не будет принята за готовую
        let partial = target.with_extension("bz2.part");
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut digest = md5::Context::new();
        let mut downloaded: u64 = 0;
        let mut last_percent: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            digest.consume(&chunk);
            downloaded += chunk.len() as u64;

            if let (Some(total), Some(t)) = (total_size, tracker) {
                let percent = downloaded * 100 / total.max(1);
                if percent > last_percent {
                    last_percent = percent;
                    t.update_step_progress(
                        percent as f32,
                        Some(format!("{} / {} MiB", downloaded >> 20, total >> 20)),
                    );
                }
            }
        }
        file.flush().await?;
        drop(file);

        if let Some(expected) = &self.expected_md5 {
            let actual = format!("{:x}", digest.compute());
            if &actual != expected {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(TtsPrepError::Download(format!(
                    "MD5 mismatch for {}: expected {}, got {}",
                    self.url, expected, actual
                )));
            }
            log::info!("MD5 verified: {}", actual);
        }

        tokio::fs::rename(&partial, target).await?;
        log::info!("Downloaded {} bytes to {}", downloaded, target.display());
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    crate::corpus::loader::absolute_path(path)
}

/// Распаковать архив `.tar.bz2` системным `tar`
pub async fn extract_tar_bz2(archive: &Path, target_dir: &Path) -> Result<()> {
    log::info!("Extracting {} ...", archive.display());

    let output = tokio::process::Command::new("tar")
        .arg("-xjf")
        .arg(archive)
        .arg("-C")
        .arg(target_dir)
        .output()
        .await
        .map_err(|e| TtsPrepError::Download(format!("Failed to run tar: {}", e)))?;

    if !output.status.success() {
        return Err(TtsPrepError::Download(format!(
            "tar failed to extract {}: {}",
            archive.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    log::info!("Extraction completed");
    Ok(())
}

/// Создать ссылку на корень аудио, если ее еще нет
pub fn link_audio_root(dataset_dir: &Path, link: &Path) -> Result<()> {
    // symlink_metadata: битая ссылка тоже считается существующей
    if link.symlink_metadata().is_ok() {
        log::info!("Symbolic link {} already exists", link.display());
        return Ok(());
    }

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(dataset_dir, link)?;
        log::info!("Created symbolic link {} -> {}", link.display(), dataset_dir.display());
    }

    #[cfg(not(unix))]
    log::warn!(
        "Symbolic links are not supported here, point audio_root at {} instead",
        dataset_dir.display()
    );

    Ok(())
}

/// Скопировать `metadata.csv` в `metadata_copy.csv`
///
/// Возвращает `false`, если исходного файла нет.
pub fn copy_metadata(dataset_dir: &Path) -> Result<bool> {
    let source = dataset_dir.join(METADATA_FILE);
    if !source.exists() {
        log::warn!("{} not found, metadata copy skipped", source.display());
        return Ok(false);
    }

    let target = dataset_dir.join(METADATA_COPY_FILE);
    std::fs::copy(&source, &target)?;
    log::info!("Copied {} to {}", source.display(), target.display());
    Ok(true)
}

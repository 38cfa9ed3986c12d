//! Наблюдатели прогресса подготовки датасета
//!
//! Консольный вывод, прогресс-бар, журнал в файле, история в памяти,
//! функция обратного вызова и их композиция.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::progress::{ProgressInfo, ProgressObserver};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn format_details(progress: &ProgressInfo) -> String {
    match progress.details.as_deref() {
        Some(details) if !details.is_empty() => format!(", {}", details),
        _ => String::new(),
    }
}

/// Наблюдатель, выводящий прогресс в консоль построчно
#[derive(Debug, Default)]
pub struct ConsoleProgressObserver {
    prefix: Option<String>,
}

impl ConsoleProgressObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Наблюдатель с префиксом строк
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn format_line(&self, progress: &ProgressInfo) -> String {
        format!(
            "{}[{:5.1}%] {} ({:.1}%){}",
            self.prefix.as_deref().unwrap_or(""),
            progress.total_progress,
            progress.step,
            progress.step_progress,
            format_details(progress)
        )
    }
}

impl ProgressObserver for ConsoleProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        println!("{}", self.format_line(&progress));
    }
}

/// Наблюдатель, сохраняющий историю в памяти
///
/// Клоны разделяют одну историю: один экземпляр отдается трекеру, другой
/// остается у вызывающего кода.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Копия истории обновлений
    pub fn history(&self) -> Vec<ProgressInfo> {
        lock(&self.history).clone()
    }

    /// Последнее обновление
    pub fn last(&self) -> Option<ProgressInfo> {
        lock(&self.history).last().cloned()
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        lock(&self.history).push(progress);
    }
}

/// Наблюдатель, дописывающий прогресс в файл журнала
#[derive(Debug)]
pub struct FileProgressObserver {
    file_path: PathBuf,
}

impl FileProgressObserver {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

impl ProgressObserver for FileProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let entry = format!(
            "[{}] {}: step {:.1}%, total {:.1}%{}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            progress.step,
            progress.step_progress,
            progress.total_progress,
            format_details(&progress)
        );

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));

        if let Err(e) = result {
            log::warn!("Failed to write progress to {}: {}", self.file_path.display(), e);
        }
    }
}

/// Наблюдатель, вызывающий функцию обратного вызова
pub struct CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    fn on_progress_update(&self, progress: ProgressInfo) {
        (self.callback)(progress);
    }
}

/// Прогресс-бар в одной строке консоли
#[derive(Debug)]
pub struct ProgressBarObserver {
    width: usize,
    last_progress: Mutex<f32>,
}

impl ProgressBarObserver {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            // Отрицательное значение гарантирует первую отрисовку
            last_progress: Mutex::new(-1.0),
        }
    }

    fn render(&self, progress: &ProgressInfo) -> String {
        let filled = ((progress.total_progress / 100.0) * self.width as f32) as usize;
        let filled = filled.min(self.width);
        format!(
            "[{}{}] {:.1}% - {}",
            "=".repeat(filled),
            " ".repeat(self.width - filled),
            progress.total_progress,
            progress.step
        )
    }
}

impl Default for ProgressBarObserver {
    fn default() -> Self {
        Self::new(50)
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let mut last_progress = lock(&self.last_progress);

        // Перерисовка только при изменении хотя бы на 1% или по завершении
        let finished = progress.total_progress >= 100.0;
        if *last_progress >= 0.0 && (*last_progress - progress.total_progress).abs() < 1.0 && !finished {
            return;
        }
        *last_progress = progress.total_progress;

        print!("\r{}", self.render(&progress));
        let _ = std::io::stdout().flush();
        if finished {
            println!();
        }
    }
}

/// Наблюдатель, рассылающий обновления нескольким наблюдателям
#[derive(Default)]
pub struct CompositeProgressObserver {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl CompositeProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ProgressObserver for CompositeProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        for observer in &self.observers {
            observer.on_progress_update(progress.clone());
        }
    }
}

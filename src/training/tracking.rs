//! Журналирование метрик и артефактов эксперимента
//!
//! Трекер не должен прерывать обучение: отсутствие сессии или ее ошибки
//! только записываются в лог.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, TtsPrepError};

/// Метрики шага: заголовок -> серия -> значение
pub type Metrics = BTreeMap<String, BTreeMap<String, f64>>;

/// Сессия системы учета экспериментов
pub trait TrackingSession: Send {
    /// Записать скалярное значение серии
    fn report_scalar(&mut self, title: &str, series: &str, value: f64, iteration: u64) -> Result<()>;

    /// Сохранить файл как артефакт эксперимента
    fn upload_artifact(&mut self, name: &str, path: &Path) -> Result<()>;
}

/// Трекер эксперимента с необязательной сессией
#[derive(Default)]
pub struct ExperimentTracker {
    session: Option<Box<dyn TrackingSession>>,
}

impl ExperimentTracker {
    pub fn new(session: Box<dyn TrackingSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Трекер без сессии: все вызовы ничего не делают
    pub fn disabled() -> Self {
        Self { session: None }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Записать все метрики шага
    pub fn log_metrics(&mut self, step: u64, metrics: &Metrics) {
        let Some(session) = self.session.as_mut() else {
            log::warn!("No active tracking session, skipping metrics for step {}", step);
            return;
        };

        for (title, series_values) in metrics {
            for (series, value) in series_values {
                if let Err(e) = session.report_scalar(title, series, *value, step) {
                    log::warn!("Failed to report {}/{} at step {}: {}", title, series, step, e);
                }
            }
        }
    }

    /// Сохранить контрольную точку как артефакт
    pub fn upload_checkpoint(&mut self, path: &Path, name: &str) {
        let Some(session) = self.session.as_mut() else {
            log::warn!("No active tracking session, skipping upload of {}", name);
            return;
        };

        if let Err(e) = session.upload_artifact(name, path) {
            log::warn!("Failed to upload {} ({}): {}", name, path.display(), e);
        }
    }
}

#[derive(Serialize)]
struct ScalarEvent<'a> {
    timestamp: String,
    title: &'a str,
    series: &'a str,
    value: f64,
    iteration: u64,
}

/// Сессия, хранящая эксперимент в локальной директории
///
/// `<root>/<project>/<task>/` содержит `hparams.json`, `scalars.jsonl` и
/// директорию `artifacts/`.
#[derive(Debug)]
pub struct LocalTrackingSession {
    task_dir: PathBuf,
}

impl LocalTrackingSession {
    /// Создать директорию задачи и сохранить гиперпараметры
    pub fn init<H: Serialize>(root: &Path, project: &str, task: &str, hparams: &H) -> Result<Self> {
        if project.trim().is_empty() || task.trim().is_empty() {
            return Err(TtsPrepError::Configuration(
                "project and task names must not be empty".to_string(),
            ));
        }

        let task_dir = root.join(project).join(task);
        fs::create_dir_all(task_dir.join("artifacts"))?;
        fs::write(task_dir.join("hparams.json"), serde_json::to_string_pretty(hparams)?)?;

        log::info!("Tracking experiment {}/{} in {}", project, task, task_dir.display());
        Ok(Self { task_dir })
    }

    pub fn task_dir(&self) -> &Path {
        &self.task_dir
    }

    pub fn scalars_path(&self) -> PathBuf {
        self.task_dir.join("scalars.jsonl")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.task_dir.join("artifacts")
    }
}

impl TrackingSession for LocalTrackingSession {
    fn report_scalar(&mut self, title: &str, series: &str, value: f64, iteration: u64) -> Result<()> {
        let event = ScalarEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            title,
            series,
            value,
            iteration,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.scalars_path())?;
        writeln!(file, "{}", serde_json::to_string(&event)?)?;
        Ok(())
    }

    fn upload_artifact(&mut self, name: &str, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(TtsPrepError::FileNotFound(format!(
                "Artifact not found: {}",
                path.display()
            )));
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(TtsPrepError::InvalidFormat(format!(
                    "artifact name must be a plain file name, got {:?}",
                    name
                )))
            }
        }

        let target = self.artifacts_dir().join(name);
        fs::copy(path, &target)?;
        log::info!("Stored artifact {} at {}", name, target.display());
        Ok(())
    }
}

//! Модуль для отслеживания прогресса выполнения операций
//!
//! Реализация паттерна Observer: трекер создается для плана этапов и
//! рассчитывает общий прогресс по весам этапов этого плана.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения операции
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Текущий этап операции
    pub step: String,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения плана (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация о текущем этапе
    pub details: Option<String>,
}

impl ProgressInfo {
    /// Создает новый экземпляр ProgressInfo
    pub fn new(step: impl Into<String>, step_progress: f32, total_progress: f32, details: Option<String>) -> Self {
        Self {
            step: step.into(),
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    /// Метод, вызываемый при обновлении прогресса
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Трейт для объекта, отправляющего уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя, вернуть его идентификатор
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей о прогрессе
    fn notify_progress(&self, progress: ProgressInfo);
}

// Паника наблюдателя не должна останавливать подготовку датасета
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Реализация ProgressReporter по умолчанию
pub struct DefaultProgressReporter {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Количество подписанных наблюдателей
    pub fn observer_count(&self) -> usize {
        read_lock(&self.observers).len()
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        write_lock(&self.observers).insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        write_lock(&self.observers).remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        for observer in read_lock(&self.observers).values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Этапы подготовки датасета
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStep {
    /// Загрузка архива датасета
    Download,
    /// Распаковка архива
    Extract,
    /// Чтение метаданных корпуса
    LoadMetadata,
    /// Очистка и фонемизация текста
    CleanText,
    /// Построение словаря
    BuildVocabulary,
    /// Кодирование записей словарем
    EncodeRecords,
    /// Разбиение на выборки и запись файлов
    SplitDataset,
}

impl ProcessStep {
    /// План загрузки датасета
    pub const DOWNLOAD_PLAN: &'static [ProcessStep] = &[Self::Download, Self::Extract];

    /// План подготовки файлов для обучения
    pub const PREPARE_PLAN: &'static [ProcessStep] = &[
        Self::LoadMetadata,
        Self::CleanText,
        Self::BuildVocabulary,
        Self::EncodeRecords,
        Self::SplitDataset,
    ];

    /// Получить название этапа в виде строки
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "Загрузка датасета",
            Self::Extract => "Распаковка архива",
            Self::LoadMetadata => "Чтение метаданных",
            Self::CleanText => "Очистка текста",
            Self::BuildVocabulary => "Построение словаря",
            Self::EncodeRecords => "Кодирование записей",
            Self::SplitDataset => "Разбиение на выборки",
        }
    }

    /// Получить весовой коэффициент этапа
    pub fn weight(&self) -> f32 {
        match self {
            Self::Download => 80.0,
            Self::Extract => 20.0,
            Self::LoadMetadata => 5.0,
            Self::CleanText => 60.0,
            Self::BuildVocabulary => 10.0,
            Self::EncodeRecords => 15.0,
            Self::SplitDataset => 10.0,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    current_step: Option<ProcessStep>,
    step_progress: f32,
    total_progress: f32,
    completed_steps: Vec<ProcessStep>,
}

/// Трекер прогресса для плана этапов
pub struct ProgressTracker {
    reporter: Option<Box<dyn ProgressReporter>>,
    plan: Vec<ProcessStep>,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    /// Создать трекер для плана этапов
    pub fn new(plan: &[ProcessStep]) -> Self {
        Self {
            reporter: None,
            plan: plan.to_vec(),
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Создать трекер с репортером
    pub fn with_reporter(plan: &[ProcessStep], reporter: Box<dyn ProgressReporter>) -> Self {
        let mut tracker = Self::new(plan);
        tracker.reporter = Some(reporter);
        tracker
    }

    /// Установить репортер прогресса
    pub fn set_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    /// Добавить наблюдателя
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Option<usize> {
        self.reporter.as_mut().map(|reporter| reporter.add_observer(observer))
    }

    /// План этапов трекера
    pub fn plan(&self) -> &[ProcessStep] {
        &self.plan
    }

    /// Текущий общий прогресс
    pub fn total_progress(&self) -> f32 {
        mutex_lock(&self.state).total_progress
    }

    /// Перейти к этапу; предыдущий этап считается завершенным
    pub fn set_step(&self, step: ProcessStep) {
        let mut state = mutex_lock(&self.state);
        if state.current_step == Some(step) {
            return;
        }

        if !self.plan.contains(&step) {
            log::warn!("Step '{}' is not part of the progress plan", step.as_str());
        }

        if let Some(previous) = state.current_step.replace(step) {
            if !state.completed_steps.contains(&previous) {
                state.completed_steps.push(previous);
            }
        }
        state.step_progress = 0.0;
        self.update_total_progress(&mut state);

        log::debug!("Progress step: {}", step.as_str());
        self.report_progress(&state, None);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        let mut state = mutex_lock(&self.state);
        state.step_progress = progress.clamp(0.0, 100.0);
        self.update_total_progress(&mut state);
        self.report_progress(&state, details);
    }

    /// Отметить завершение всего плана
    pub fn complete(&self) {
        let mut state = mutex_lock(&self.state);
        if let Some(current) = state.current_step {
            if !state.completed_steps.contains(&current) {
                state.completed_steps.push(current);
            }
        }
        state.step_progress = 100.0;
        state.total_progress = 100.0;
        self.report_progress(&state, Some("Процесс завершен".to_string()));
    }

    fn plan_weight(&self, step: ProcessStep) -> f32 {
        if self.plan.contains(&step) {
            step.weight()
        } else {
            0.0
        }
    }

    fn update_total_progress(&self, state: &mut TrackerState) {
        let total_weight: f32 = self.plan.iter().map(ProcessStep::weight).sum();
        if total_weight <= 0.0 {
            state.total_progress = 0.0;
            return;
        }

        let mut done: f32 = state
            .completed_steps
            .iter()
            .map(|step| self.plan_weight(*step))
            .sum();
        if let Some(current) = state.current_step {
            done += self.plan_weight(current) * state.step_progress / 100.0;
        }

        state.total_progress = (done / total_weight * 100.0).clamp(0.0, 100.0);
    }

    fn report_progress(&self, state: &TrackerState, details: Option<String>) {
        if let Some(reporter) = &self.reporter {
            let step = state.current_step.map(|s| s.as_str()).unwrap_or("");
            reporter.notify_progress(ProgressInfo::new(
                step,
                state.step_progress,
                state.total_progress,
                details,
            ));
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(ProcessStep::PREPARE_PLAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    type Updates = Arc<Mutex<Vec<ProgressInfo>>>;

    struct Recorder(Updates);

    impl ProgressObserver for Recorder {
        fn on_progress_update(&self, progress: ProgressInfo) {
            self.0.lock().unwrap().push(progress);
        }
    }

    fn recording_reporter() -> (DefaultProgressReporter, Updates) {
        let updates = Updates::default();
        let mut reporter = DefaultProgressReporter::new();
        reporter.add_observer(Box::new(Recorder(updates.clone())));
        (reporter, updates)
    }

    #[test]
    fn test_progress_tracker() {
        let (reporter, updates) = recording_reporter();
        let tracker = ProgressTracker::with_reporter(ProcessStep::DOWNLOAD_PLAN, Box::new(reporter));

        tracker.set_step(ProcessStep::Download);
        tracker.update_step_progress(50.0, Some("half".to_string()));

        {
            let updates = updates.lock().unwrap();
            assert_eq!(updates.len(), 2);
            assert_eq!(updates[1].step, ProcessStep::Download.as_str());
            assert_eq!(updates[1].step_progress, 50.0);
            // 80 * 0.5 из 100
            assert!((updates[1].total_progress - 40.0).abs() < 1e-3);
        }

        tracker.set_step(ProcessStep::Extract);
        assert!((tracker.total_progress() - 80.0).abs() < 1e-3);

        tracker.complete();
        {
            let updates = updates.lock().unwrap();
            let last = updates.last().unwrap();
            assert_eq!(last.total_progress, 100.0);
            assert_eq!(last.details, Some("Процесс завершен".to_string()));
        }
    }

    #[test]
    fn test_total_is_computed_over_plan_only() {
        let tracker = ProgressTracker::new(ProcessStep::PREPARE_PLAN);
        let total_weight: f32 = ProcessStep::PREPARE_PLAN.iter().map(ProcessStep::weight).sum();

        tracker.set_step(ProcessStep::LoadMetadata);
        tracker.set_step(ProcessStep::CleanText);
        let expected = ProcessStep::LoadMetadata.weight() / total_weight * 100.0;
        assert!((tracker.total_progress() - expected).abs() < 1e-3);

        // Этап вне плана не влияет на общий прогресс
        tracker.set_step(ProcessStep::Download);
        let expected =
            (ProcessStep::LoadMetadata.weight() + ProcessStep::CleanText.weight()) / total_weight * 100.0;
        assert!((tracker.total_progress() - expected).abs() < 1e-3);
    }

    #[test]
    fn test_repeated_set_step_is_ignored() {
        let (reporter, updates) = recording_reporter();
        let tracker = ProgressTracker::with_reporter(ProcessStep::PREPARE_PLAN, Box::new(reporter));

        tracker.set_step(ProcessStep::LoadMetadata);
        tracker.set_step(ProcessStep::LoadMetadata);
        assert_eq!(updates.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_observer() {
        let updates = Updates::default();
        let mut reporter = DefaultProgressReporter::new();
        let id = reporter.add_observer(Box::new(Recorder(updates.clone())));
        assert_eq!(reporter.observer_count(), 1);

        assert!(reporter.remove_observer(id).is_some());
        reporter.notify_progress(ProgressInfo::new("step", 10.0, 10.0, None));
        assert!(updates.lock().unwrap().is_empty());
    }
}

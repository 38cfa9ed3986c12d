//! Вспомогательные утилиты цикла обучения: контрольные точки, учет
//! экспериментов и графики

pub mod checkpoint;
pub mod plot;
pub mod tracking;

pub use checkpoint::{latest_checkpoint_path, load_checkpoint, save_checkpoint, Checkpoint, StateDict};
pub use tracking::{ExperimentTracker, LocalTrackingSession, TrackingSession};

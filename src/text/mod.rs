//! Модуль обработки текста: этапы очистки, группы, фонемизация и кодирование

pub mod cleaners;
pub mod partition;
pub mod phonemizer;
pub mod pipeline;
pub mod symbols;

pub use cleaners::{CleanerRegistry, CleanerStage};
pub use partition::{split_cleaner_groups, CleanerGroup, CleanerPlan};
pub use phonemizer::{EspeakBackend, PhonemizerBackend, PhonemizerSession};
pub use pipeline::{encode_records, run_pre_token_groups, PhonemizerScope};

//! Модуль разбиения датасета и файлов списков для обучения

pub mod filelist;
pub mod split;

pub use filelist::{load_filepaths_and_text, parse_token_ids, write_filelist};
pub use split::{split_dataset, DatasetSplits};

//! Файлы списков `train.txt`, `val.txt`, `test.txt`
//!
//! Строка файла: `<абсолютный путь к аудио>|<индексы токенов через TAB>`.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::corpus::Record;
use crate::error::{Result, TtsPrepError};

/// Разделитель полей в файлах списков
pub const FILELIST_SEPARATOR: char = '|';

/// Запись файла списка
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilelistEntry {
    pub file_path: PathBuf,
    pub token_ids: Vec<u32>,
}

/// Записать записи в файл списка
pub fn write_filelist<P: AsRef<Path>>(path: P, records: &[Record]) -> Result<()> {
    let path = path.as_ref();

    // Поля не экранируются: разделитель в пути сломал бы строку
    if let Some(record) = records.iter().find(|r| r.file_path.contains(FILELIST_SEPARATOR)) {
        return Err(TtsPrepError::InvalidFormat(format!(
            "audio path {:?} contains the filelist separator '{}'",
            record.file_path, FILELIST_SEPARATOR
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(FILELIST_SEPARATOR as u8)
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_path(path)?;

    for record in records {
        let ids = record
            .token_ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("\t");
        writer.write_record([record.file_path.as_str(), ids.as_str()])?;
    }
    writer.flush()?;

    log::info!("Wrote {} entries to {}", records.len(), path.display());
    Ok(())
}

/// Прочитать файл списка как строки, разбитые разделителем
pub fn load_filepaths_and_text<P: AsRef<Path>>(path: P, split: char) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        TtsPrepError::FileNotFound(format!("Failed to open filelist {}: {}", path.display(), e))
    })?;

    let mut rows = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rows.push(line.split(split).map(str::to_string).collect());
    }
    Ok(rows)
}

/// Разобрать поле индексов, разделенных табуляцией
pub fn parse_token_ids(field: &str) -> Result<Vec<u32>> {
    field
        .split('\t')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u32>()
                .map_err(|_| TtsPrepError::InvalidFormat(format!("invalid token id {:?}", id)))
        })
        .collect()
}

/// Прочитать файл списка в типизированные записи
pub fn load_filelist<P: AsRef<Path>>(path: P) -> Result<Vec<FilelistEntry>> {
    let path = path.as_ref();
    load_filepaths_and_text(path, FILELIST_SEPARATOR)?
        .into_iter()
        .enumerate()
        .map(|(idx, row)| match row.as_slice() {
            [file_path, ids] => Ok(FilelistEntry {
                file_path: PathBuf::from(file_path),
                token_ids: parse_token_ids(ids)?,
            }),
            _ => Err(TtsPrepError::InvalidFormat(format!(
                "{}: entry {} has {} fields, expected 2",
                path.display(),
                idx + 1,
                row.len()
            ))),
        })
        .collect()
}

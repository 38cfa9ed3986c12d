//! Загрузка таблицы метаданных корпуса
//!
//! Формат: `id|raw_text|normalized_text` без заголовка. Кавычки не
//! интерпретируются - в транскрипциях встречаются непарные кавычки.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::corpus::Record;
use crate::error::{Result, TtsPrepError};

const EXPECTED_FIELDS: usize = 3;

/// Сделать путь абсолютным без разрешения символических ссылок
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Прочитать метаданные и построить записи корпуса
///
/// `file_path` каждой записи - `<audio_root>/<id>.wav`, где `audio_root`
/// приводится к абсолютному пути. Строка с числом полей меньше трех -
/// фатальная ошибка формата.
pub fn load_metadata<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
    audio_root: &Path,
    max_rows: Option<usize>,
) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        TtsPrepError::FileNotFound(format!("Failed to open metadata {}: {}", path.display(), e))
    })?;

    let audio_root = absolute_path(audio_root)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .quoting(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut records = Vec::new();
    for result in reader.records() {
        if max_rows.map_or(false, |limit| records.len() >= limit) {
            break;
        }

        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if row.len() < EXPECTED_FIELDS {
            return Err(TtsPrepError::InvalidFormat(format!(
                "{}:{}: expected {} fields, found {}",
                path.display(),
                line,
                EXPECTED_FIELDS,
                row.len()
            )));
        }
        if row.len() > EXPECTED_FIELDS {
            log::debug!("{}:{}: ignoring {} extra fields", path.display(), line, row.len() - EXPECTED_FIELDS);
        }

        let id = row[0].trim();
        let file_path = audio_root.join(format!("{}.wav", id));

        records.push(Record::new(
            file_path.to_string_lossy().into_owned(),
            row[1].trim().to_string(),
            row[2].trim().to_string(),
        ));
    }

    log::info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

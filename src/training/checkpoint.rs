//! Сохранение и загрузка контрольных точек обучения
//!
//! Состояние модели - словарь именованных тензоров. При загрузке состояние
//! из файла сливается с текущей моделью по ключам: архитектура могла
//! измениться между запусками.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Result, TtsPrepError};

/// Плоский тензор параметров
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl ParamTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TtsPrepError::InvalidFormat(format!(
                "tensor of shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }
}

/// Состояние модели: имя параметра -> тензор
pub type StateDict = BTreeMap<String, ParamTensor>;

/// Контрольная точка
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub model: StateDict,
    pub optimizer: serde_json::Value,
    pub iteration: u64,
    pub learning_rate: f64,
}

/// Результат загрузки контрольной точки
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCheckpoint {
    /// Состояние модели после слияния с текущим
    pub model: StateDict,
    pub optimizer: serde_json::Value,
    pub iteration: u64,
    pub learning_rate: f64,
    /// Ключи модели, которых не было в файле
    pub missing_keys: Vec<String>,
}

/// Сохранить контрольную точку
pub fn save_checkpoint<P: AsRef<Path>>(checkpoint: &Checkpoint, path: P) -> Result<()> {
    let path = path.as_ref();
    log::info!(
        "Saving model and optimizer state at iteration {} to {}",
        checkpoint.iteration,
        path.display()
    );

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = fs::File::create(path)?;
    serde_json::to_writer(std::io::BufWriter::new(file), checkpoint)?;
    Ok(())
}

/// Загрузить контрольную точку и слить ее с текущим состоянием модели
pub fn load_checkpoint<P: AsRef<Path>>(path: P, live_model: &StateDict) -> Result<LoadedCheckpoint> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(TtsPrepError::FileNotFound(format!(
            "Checkpoint not found: {}",
            path.display()
        )));
    }

    let file = fs::File::open(path)?;
    let saved: Checkpoint = serde_json::from_reader(std::io::BufReader::new(file))?;

    let (model, missing_keys) = merge_state_dict(live_model, saved.model);

    log::info!("Loaded checkpoint '{}' (iteration {})", path.display(), saved.iteration);
    Ok(LoadedCheckpoint {
        model,
        optimizer: saved.optimizer,
        iteration: saved.iteration,
        learning_rate: saved.learning_rate,
        missing_keys,
    })
}

/// Слить сохраненное состояние с текущим
///
/// Каждый ключ текущей модели получает сохраненное значение, если оно есть,
/// иначе сохраняет текущее. Лишние ключи файла отбрасываются.
pub fn merge_state_dict(live: &StateDict, mut saved: StateDict) -> (StateDict, Vec<String>) {
    let mut merged = StateDict::new();
    let mut missing = Vec::new();

    for (key, current) in live {
        match saved.remove(key) {
            Some(value) => {
                if value.shape != current.shape {
                    log::warn!(
                        "{} has shape {:?} in the checkpoint but {:?} in the model",
                        key,
                        value.shape,
                        current.shape
                    );
                }
                merged.insert(key.clone(), value);
            }
            None => {
                log::info!("{} is not in the checkpoint, keeping current value", key);
                missing.push(key.clone());
                merged.insert(key.clone(), current.clone());
            }
        }
    }

    for key in saved.keys() {
        log::debug!("{} from the checkpoint is not used by the model", key);
    }

    (merged, missing)
}

fn numeric_key(name: &str) -> u128 {
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Найти последнюю контрольную точку `<prefix>*.pth` в директории
///
/// Порядок определяется числом, составленным из цифр имени файла.
pub fn latest_checkpoint_path<P: AsRef<Path>>(dir: P, prefix: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();

    let mut candidates: Vec<(u128, PathBuf)> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            TtsPrepError::FileNotFound(format!("Failed to read {}: {}", dir.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(".pth") {
            candidates.push((numeric_key(&name), entry.path().to_path_buf()));
        }
    }

    candidates.sort();
    let (_, latest) = candidates.pop().ok_or_else(|| {
        TtsPrepError::FileNotFound(format!(
            "No {}*.pth checkpoints in {}",
            prefix,
            dir.display()
        ))
    })?;

    log::info!("Latest checkpoint: {}", latest.display());
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(entries: &[(&str, f32)]) -> StateDict {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), ParamTensor::new(vec![1], vec![*v]).unwrap()))
            .collect()
    }

    #[test]
    fn test_merge_keeps_current_for_missing_keys() {
        let live = state(&[("enc.weight", 0.0), ("dec.weight", 0.0), ("new.bias", 7.0)]);
        let saved = state(&[("enc.weight", 1.0), ("dec.weight", 2.0), ("old.bias", 3.0)]);

        let (merged, missing) = merge_state_dict(&live, saved);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged["enc.weight"].data, vec![1.0]);
        assert_eq!(merged["dec.weight"].data, vec![2.0]);
        assert_eq!(merged["new.bias"].data, vec![7.0]);
        assert!(!merged.contains_key("old.bias"));
        assert_eq!(missing, vec!["new.bias".to_string()]);
    }

    #[test]
    fn test_save_and_load_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("G_100.pth");

        let checkpoint = Checkpoint {
            model: state(&[("w", 0.5)]),
            optimizer: serde_json::json!({ "step": 100, "betas": [0.8, 0.99] }),
            iteration: 100,
            learning_rate: 2e-4,
        };
        save_checkpoint(&checkpoint, &path).unwrap();

        let live = state(&[("w", 0.0), ("extra", 9.0)]);
        let loaded = load_checkpoint(&path, &live).unwrap();

        assert_eq!(loaded.iteration, 100);
        assert_eq!(loaded.learning_rate, 2e-4);
        assert_eq!(loaded.optimizer["step"], 100);
        assert_eq!(loaded.model["w"].data, vec![0.5]);
        assert_eq!(loaded.model["extra"].data, vec![9.0]);
        assert_eq!(loaded.missing_keys, vec!["extra".to_string()]);
    }

    #[test]
    fn test_load_missing_checkpoint() {
        let result = load_checkpoint("/definitely/not/here/G_1.pth", &StateDict::new());
        assert!(matches!(result, Err(TtsPrepError::FileNotFound(_))));
    }

    #[test]
    fn test_latest_checkpoint_uses_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["G_900.pth", "G_10000.pth", "G_2000.pth", "D_50000.pth", "G_99999.txt"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }

        let latest = latest_checkpoint_path(dir.path(), "G_").unwrap();
        assert_eq!(latest, dir.path().join("G_10000.pth"));
    }

    #[test]
    fn test_latest_checkpoint_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            latest_checkpoint_path(dir.path(), "G_"),
            Err(TtsPrepError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_param_tensor_shape_check() {
        assert!(ParamTensor::new(vec![2, 3], vec![0.0; 6]).is_ok());
        assert!(ParamTensor::new(vec![2, 3], vec![0.0; 5]).is_err());
        assert_eq!(ParamTensor::zeros(vec![2, 2]).data.len(), 4);
    }
}

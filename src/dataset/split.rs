//! Перемешивание и разбиение записей на выборки
//!
//! Валидационная выборка - первые `n_val` позиций после перемешивания,
//! тестовая - следующие `n_test`, обучающая - остаток.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{Result, TtsPrepError};

/// Результат разбиения
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSplits<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
    pub test: Vec<T>,
}

impl<T> DatasetSplits<T> {
    /// Общее число записей во всех выборках
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }
}

/// Генератор для перемешивания: детерминированный при заданном зерне
pub fn split_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Проверить, что `n_val + n_test` помещается в `total` записей
///
/// Возвращает число отложенных записей.
pub fn check_split_sizes(total: usize, n_val: usize, n_test: usize) -> Result<usize> {
    let held_out = n_val.checked_add(n_test).ok_or_else(|| {
        TtsPrepError::Configuration(format!("n_val ({}) + n_test ({}) overflows", n_val, n_test))
    })?;

    if held_out > total {
        return Err(TtsPrepError::Configuration(format!(
            "n_val ({}) + n_test ({}) exceeds the number of records ({})",
            n_val, n_test, total
        )));
    }
    Ok(held_out)
}

/// Перемешать записи и разбить на val/test/train
///
/// `n_val + n_test` больше числа записей - ошибка конфигурации, записи при
/// этом не трогаются.
pub fn split_dataset<T, R: Rng + ?Sized>(
    mut records: Vec<T>,
    n_val: usize,
    n_test: usize,
    rng: &mut R,
) -> Result<DatasetSplits<T>> {
    let held_out = check_split_sizes(records.len(), n_val, n_test)?;

    records.shuffle(rng);

    let train = records.split_off(held_out);
    let test = records.split_off(n_val);
    let val = records;

    log::info!(
        "Dataset split: {} train, {} val, {} test",
        train.len(),
        val.len(),
        test.len()
    );

    Ok(DatasetSplits { train, val, test })
}

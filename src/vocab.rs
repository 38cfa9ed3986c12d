//! Модуль словаря токенов
//!
//! Словарь - биекция между токенами и диапазоном `[0, N)`. Специальные
//! символы занимают младшие индексы в заданном порядке, неизвестные токены
//! отображаются в индекс по умолчанию (`UNK_ID`).
//!
//! Порядок остальных индексов задается явно через [`TokenOrder`]:
//! `FirstSeen` назначает индексы в порядке первого появления при одном
//! проходе по корпусу, `Frequency` - по убыванию частоты с лексикографическим
//! разрешением равенства. Один и тот же корпус всегда дает один и тот же
//! словарь.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::config::TokenOrder;
use crate::error::{Result, TtsPrepError};
use crate::text::symbols::UNK;

/// Словарь токенов
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    itos: Vec<String>,
    stoi: HashMap<String, u32>,
    default_index: Option<u32>,
}

impl Vocabulary {
    /// Построить словарь по последовательностям токенов
    pub fn build_from_iterator<I, S, T>(
        sequences: I,
        specials: &[&str],
        order: TokenOrder,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut itos: Vec<String> = Vec::new();
        let mut stoi: HashMap<String, u32> = HashMap::new();

        for special in specials {
            if stoi.contains_key(*special) {
                return Err(TtsPrepError::Vocabulary(format!(
                    "duplicate special symbol '{}'",
                    special
                )));
            }
            stoi.insert(special.to_string(), itos.len() as u32);
            itos.push(special.to_string());
        }

        // Счетчики в порядке первого появления
        let mut first_seen: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for sequence in sequences {
            for token in sequence {
                let token = token.as_ref();
                if stoi.contains_key(token) {
                    continue;
                }
                match counts.get_mut(token) {
                    Some(count) => *count += 1,
                    None => {
                        counts.insert(token.to_string(), 1);
                        first_seen.push(token.to_string());
                    }
                }
            }
        }

        if order == TokenOrder::Frequency {
            first_seen.sort_by(|a, b| counts[b].cmp(&counts[a]).then_with(|| a.cmp(b)));
        }

        for token in first_seen {
            stoi.insert(token.clone(), itos.len() as u32);
            itos.push(token);
        }

        Ok(Self {
            itos,
            stoi,
            default_index: None,
        })
    }

    /// Установить индекс по умолчанию для неизвестных токенов
    pub fn set_default_index(&mut self, index: u32) -> Result<()> {
        if index as usize >= self.itos.len() {
            return Err(TtsPrepError::Vocabulary(format!(
                "default index {} is out of range for vocabulary of size {}",
                index,
                self.itos.len()
            )));
        }
        self.default_index = Some(index);
        Ok(())
    }

    /// Индекс по умолчанию
    pub fn default_index(&self) -> Option<u32> {
        self.default_index
    }

    /// Размер словаря
    pub fn len(&self) -> usize {
        self.itos.len()
    }

    /// Пуст ли словарь
    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    /// Есть ли токен в словаре
    pub fn contains(&self, token: &str) -> bool {
        self.stoi.contains_key(token)
    }

    /// Индекс токена без учета индекса по умолчанию
    pub fn get(&self, token: &str) -> Option<u32> {
        self.stoi.get(token).copied()
    }

    /// Индекс токена; неизвестный токен получает индекс по умолчанию
    pub fn lookup_index(&self, token: &str) -> Result<u32> {
        self.get(token).or(self.default_index).ok_or_else(|| {
            TtsPrepError::Vocabulary(format!(
                "token '{}' is not in the vocabulary and no default index is set",
                token
            ))
        })
    }

    /// Индексы последовательности токенов
    pub fn lookup_indices<I, T>(&self, tokens: I) -> Result<Vec<u32>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        tokens
            .into_iter()
            .map(|token| self.lookup_index(token.as_ref()))
            .collect()
    }

    /// Токен по индексу
    pub fn lookup_token(&self, index: u32) -> Option<&str> {
        self.itos.get(index as usize).map(String::as_str)
    }

    /// Токены по индексам; индексы вне словаря дают `<unk>`
    pub fn lookup_tokens(&self, indices: &[u32]) -> Vec<&str> {
        indices
            .iter()
            .map(|&index| self.lookup_token(index).unwrap_or(UNK))
            .collect()
    }

    /// Декодировать индексы в строку токенов через пробел
    pub fn detokenize(&self, indices: &[u32]) -> String {
        self.lookup_tokens(indices).join(" ")
    }

    /// Токены в порядке индексов
    pub fn itos(&self) -> &[String] {
        &self.itos
    }

    /// Сохранить словарь как строки `token\tindex`, отсортированные по индексу
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(File::create(path)?);
        for (index, token) in self.itos.iter().enumerate() {
            writeln!(writer, "{}\t{}", token, index)?;
        }
        writer.flush()?;

        log::info!("Saved vocabulary of {} tokens to {}", self.len(), path.display());
        Ok(())
    }

    /// Загрузить словарь, сохраненный [`Vocabulary::save`]
    ///
    /// Специальные символы должны стоять на своих индексах, индексы должны
    /// образовывать непрерывный диапазон. Индекс по умолчанию - `unk_id`.
    pub fn load<P: AsRef<Path>>(path: P, specials: &[&str], unk_id: u32) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            TtsPrepError::FileNotFound(format!("Failed to open vocabulary {}: {}", path.display(), e))
        })?;

        let mut pairs: Vec<(String, u32)> = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split('\t');
            let (token, index) = match (fields.next(), fields.next(), fields.next()) {
                (Some(token), Some(index), None) if !token.is_empty() => (token, index),
                _ => {
                    return Err(TtsPrepError::Vocabulary(format!(
                        "{}:{}: expected 'token<TAB>index', got {:?}",
                        path.display(),
                        line_no + 1,
                        line
                    )))
                }
            };
            let index: u32 = index.trim().parse().map_err(|_| {
                TtsPrepError::Vocabulary(format!(
                    "{}:{}: invalid index {:?}",
                    path.display(),
                    line_no + 1,
                    index
                ))
            })?;
            pairs.push((token.to_string(), index));
        }

        pairs.sort_by_key(|(_, index)| *index);

        let mut itos = Vec::with_capacity(pairs.len());
        let mut stoi = HashMap::with_capacity(pairs.len());
        for (expected, (token, index)) in pairs.into_iter().enumerate() {
            if index as usize != expected {
                return Err(TtsPrepError::Vocabulary(format!(
                    "{}: indices are not contiguous (expected {}, found {} for '{}')",
                    path.display(),
                    expected,
                    index,
                    token
                )));
            }
            if stoi.insert(token.clone(), index).is_some() {
                return Err(TtsPrepError::Vocabulary(format!(
                    "{}: duplicate token '{}'",
                    path.display(),
                    token
                )));
            }
            itos.push(token);
        }

        for (index, special) in specials.iter().enumerate() {
            if itos.get(index).map(String::as_str) != Some(*special) {
                return Err(TtsPrepError::Vocabulary(format!(
                    "{}: special symbol '{}' must have index {}",
                    path.display(),
                    special,
                    index
                )));
            }
        }

        let mut vocab = Self {
            itos,
            stoi,
            default_index: None,
        };
        vocab.set_default_index(unk_id)?;

        log::debug!("Loaded vocabulary of {} tokens from {}", vocab.len(), path.display());
        Ok(vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::symbols::{SPECIAL_SYMBOLS, UNK_ID};
    use std::collections::HashSet;

    fn corpus() -> Vec<&'static str> {
        vec!["b a <space> c", "c c d", "a b"]
    }

    fn build(order: TokenOrder) -> Vocabulary {
        let mut vocab = Vocabulary::build_from_iterator(
            corpus().iter().map(|text| text.split_whitespace()),
            &SPECIAL_SYMBOLS,
            order,
        )
        .unwrap();
        vocab.set_default_index(UNK_ID).unwrap();
        vocab
    }

    #[test]
    fn test_specials_first_and_first_seen_order() {
        let vocab = build(TokenOrder::FirstSeen);
        let k = SPECIAL_SYMBOLS.len();

        for (i, special) in SPECIAL_SYMBOLS.iter().enumerate() {
            assert_eq!(vocab.get(special), Some(i as u32));
        }
        assert_eq!(&vocab.itos()[k..], &["b", "a", "c", "d"]);
        assert_eq!(vocab.len(), k + 4);

        let unique: HashSet<&String> = vocab.itos().iter().collect();
        assert_eq!(unique.len(), vocab.len());
    }

    #[test]
    fn test_frequency_order() {
        let vocab = build(TokenOrder::Frequency);
        let k = SPECIAL_SYMBOLS.len();
        // c: 3, a: 2, b: 2, d: 1
        assert_eq!(&vocab.itos()[k..], &["c", "a", "b", "d"]);
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(build(TokenOrder::FirstSeen), build(TokenOrder::FirstSeen));
        assert_eq!(build(TokenOrder::Frequency), build(TokenOrder::Frequency));
    }

    #[test]
    fn test_default_index_for_unseen_tokens() {
        let vocab = build(TokenOrder::FirstSeen);
        assert_eq!(vocab.lookup_index("zzz").unwrap(), UNK_ID);
        assert_eq!(vocab.lookup_indices(["a", "zzz"]).unwrap(), vec![7, UNK_ID]);
        assert_eq!(vocab.detokenize(&[7, UNK_ID, 999]), "a <unk> <unk>");
    }

    #[test]
    fn test_lookup_without_default_fails() {
        let vocab = Vocabulary::build_from_iterator(
            vec![vec!["a"]],
            &SPECIAL_SYMBOLS,
            TokenOrder::FirstSeen,
        )
        .unwrap();
        assert!(matches!(vocab.lookup_index("zzz"), Err(TtsPrepError::Vocabulary(_))));
    }

    #[test]
    fn test_duplicate_specials_rejected() {
        let result = Vocabulary::build_from_iterator(
            Vec::<Vec<&str>>::new(),
            &["<pad>", "<pad>"],
            TokenOrder::FirstSeen,
        );
        assert!(matches!(result, Err(TtsPrepError::Vocabulary(_))));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vocab.txt");

        let vocab = build(TokenOrder::FirstSeen);
        vocab.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let first_lines: Vec<&str> = content.lines().take(2).collect();
        assert_eq!(first_lines, vec!["<pad>\t0", "<unk>\t1"]);

        let loaded = Vocabulary::load(&path, &SPECIAL_SYMBOLS, UNK_ID).unwrap();
        assert_eq!(loaded, vocab);
        assert_eq!(loaded.default_index(), Some(UNK_ID));
        assert_eq!(loaded.lookup_index("never-seen").unwrap(), UNK_ID);
    }

    #[test]
    fn test_load_accepts_unsorted_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        std::fs::write(&path, "<unk>\t1\n<pad>\t0\nə\t2\n").unwrap();

        let vocab = Vocabulary::load(&path, &["<pad>", "<unk>"], 1).unwrap();
        assert_eq!(vocab.itos(), &["<pad>", "<unk>", "ə"]);
    }

    #[test]
    fn test_load_rejects_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            "<pad>\t0\n<unk>\t1\na\t3\n",
            "<pad>\t0\n<unk>\t1\na\t2\na\t3\n",
            "<pad>\t0\n<unk>\t1\na 2\n",
            "<unk>\t0\n<pad>\t1\n",
            "<pad>\t0\n<unk>\tone\n",
        ];

        for (i, content) in cases.iter().enumerate() {
            let path = dir.path().join(format!("vocab_{}.txt", i));
            std::fs::write(&path, content).unwrap();
            let result = Vocabulary::load(&path, &["<pad>", "<unk>"], 1);
            assert!(
                matches!(result, Err(TtsPrepError::Vocabulary(_))),
                "case {} should be rejected",
                i
            );
        }
    }

    #[test]
    fn test_load_missing_file() {
        let result = Vocabulary::load("/definitely/not/here/vocab.txt", &SPECIAL_SYMBOLS, UNK_ID);
        assert!(matches!(result, Err(TtsPrepError::FileNotFound(_))));
    }
}

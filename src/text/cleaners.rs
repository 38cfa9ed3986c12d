//! Модуль этапов очистки текста
//!
//! Каждый этап идентифицируется строковым именем из конфигурации и
//! разрешается через закрытый реестр [`CleanerRegistry`]. Неизвестное имя -
//! ошибка конфигурации, она обнаруживается при построении плана, а не при
//! первом применении.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, TtsPrepError};
use crate::text::symbols::{self, BLANK_ID, BOS_ID, EOS_ID, PHONEMIZE_STAGE, SPACE, TOKENIZE_STAGE};

/// Преобразование текста в текст
pub type TextFn = fn(&str) -> String;
/// Преобразование последовательности индексов
pub type IdsFn = fn(Vec<u32>) -> Vec<u32>;

/// Вид этапа очистки
#[derive(Clone, Copy)]
pub enum CleanerStage {
    /// Применяется к каждой записи независимо
    Text(TextFn),
    /// Применяется ко всему корпусу сразу через сессию фонемизатора
    Phonemize,
    /// Разбивает текст на токены и переводит их в индексы словаря
    Tokenize,
    /// Преобразует индексы после токенизации
    Ids(IdsFn),
}

impl CleanerStage {
    /// Название вида этапа для сообщений об ошибках
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Phonemize => "phonemize",
            Self::Tokenize => "tokenize",
            Self::Ids(_) => "ids",
        }
    }
}

impl std::fmt::Debug for CleanerStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Реестр этапов очистки по имени
#[derive(Debug, Clone)]
pub struct CleanerRegistry {
    stages: HashMap<String, CleanerStage>,
}

impl CleanerRegistry {
    /// Пустой реестр
    pub fn empty() -> Self {
        Self {
            stages: HashMap::new(),
        }
    }

    /// Реестр со всеми встроенными этапами
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("lowercase", CleanerStage::Text(lowercase));
        registry.register("collapse_whitespace", CleanerStage::Text(collapse_whitespace));
        registry.register("expand_abbreviations", CleanerStage::Text(expand_abbreviations));
        registry.register("strip_punct", CleanerStage::Text(strip_punct));
        registry.register("split_chars", CleanerStage::Text(split_chars));
        registry.register(PHONEMIZE_STAGE, CleanerStage::Phonemize);
        registry.register(TOKENIZE_STAGE, CleanerStage::Tokenize);
        registry.register("add_blank", CleanerStage::Ids(add_blank));
        registry.register("add_bos_eos", CleanerStage::Ids(add_bos_eos));
        registry
    }

    /// Зарегистрировать этап (перезаписывает существующий)
    pub fn register(&mut self, name: impl Into<String>, stage: CleanerStage) {
        self.stages.insert(name.into(), stage);
    }

    /// Найти этап по имени
    pub fn resolve(&self, name: &str) -> Result<CleanerStage> {
        self.stages.get(name).copied().ok_or_else(|| {
            let mut known: Vec<&str> = self.stages.keys().map(String::as_str).collect();
            known.sort_unstable();
            TtsPrepError::Configuration(format!(
                "unknown cleaner stage '{}' (known: {})",
                name,
                known.join(", ")
            ))
        })
    }

    /// Зарегистрирован ли этап
    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }
}

impl Default for CleanerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static ABBREVIATIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        ("mrs", "misess"),
        ("mr", "mister"),
        ("dr", "doctor"),
        ("st", "saint"),
        ("co", "company"),
        ("jr", "junior"),
        ("maj", "major"),
        ("gen", "general"),
        ("drs", "doctors"),
        ("rev", "reverend"),
        ("lt", "lieutenant"),
        ("hon", "honorable"),
        ("sgt", "sergeant"),
        ("capt", "captain"),
        ("esq", "esquire"),
        ("ltd", "limited"),
        ("col", "colonel"),
        ("ft", "fort"),
    ]
    .into_iter()
    .map(|(abbr, full)| (Regex::new(&format!(r"(?i)\b{}\.", abbr)).unwrap(), full))
    .collect()
});

const EXTRA_PUNCTUATION: &[char] = &['“', '”', '‘', '’', '«', '»', '—', '–', '…', '¡', '¿'];

/// Перевести текст в нижний регистр
pub fn lowercase(text: &str) -> String {
    text.to_lowercase()
}

/// Схлопнуть последовательности пробельных символов в один пробел
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Раскрыть английские сокращения ("Mr." -> "mister")
pub fn expand_abbreviations(text: &str) -> String {
    let mut text = text.to_string();
    for (re, full) in ABBREVIATIONS.iter() {
        text = re.replace_all(&text, *full).into_owned();
    }
    text
}

/// Удалить знаки препинания, сохраняя специальные символы словаря
pub fn strip_punct(text: &str) -> String {
    text.split_whitespace()
        .filter_map(|token| {
            if symbols::is_special(token) {
                return Some(token.to_string());
            }
            let stripped: String = token
                .chars()
                .filter(|c| !c.is_ascii_punctuation() && !EXTRA_PUNCTUATION.contains(c))
                .collect();
            (!stripped.is_empty()).then_some(stripped)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Разбить слова на символы, отделяя слова токеном `<space>`
pub fn split_chars(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            if symbols::is_special(word) {
                word.to_string()
            } else {
                word.chars().map(String::from).collect::<Vec<_>>().join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join(&format!(" {} ", SPACE))
}

/// Вставить `<blank>` между индексами и по краям
pub fn add_blank(ids: Vec<u32>) -> Vec<u32> {
    let mut result = Vec::with_capacity(ids.len() * 2 + 1);
    result.push(BLANK_ID);
    for id in ids {
        result.push(id);
        result.push(BLANK_ID);
    }
    result
}

/// Обрамить последовательность токенами `<bos>` и `<eos>`
pub fn add_bos_eos(ids: Vec<u32>) -> Vec<u32> {
    let mut result = Vec::with_capacity(ids.len() + 2);
    result.push(BOS_ID);
    result.extend(ids);
    result.push(EOS_ID);
    result
}

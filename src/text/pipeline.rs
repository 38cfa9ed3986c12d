//! Применение групп очистки к корпусу и кодирование словарем

use crate::corpus::Record;
use crate::error::{Result, TtsPrepError};
use crate::text::partition::{CleanerPlan, ResolvedGroup, TokenStage};
use crate::text::phonemizer::{PhonemizerBackend, PhonemizerSession};
use crate::text::symbols::UNK_ID;
use crate::vocab::Vocabulary;

/// Лениво открываемая сессия фонемизатора на время одного запуска
pub struct PhonemizerScope<'a> {
    backend: &'a dyn PhonemizerBackend,
    language: String,
    session: Option<Box<dyn PhonemizerSession>>,
}

impl<'a> PhonemizerScope<'a> {
    pub fn new(backend: &'a dyn PhonemizerBackend, language: impl Into<String>) -> Self {
        Self {
            backend,
            language: language.into(),
            session: None,
        }
    }

    /// Фонемизировать пакет, открыв сессию при первом обращении
    pub fn phonemize(&mut self, texts: &[String]) -> Result<Vec<String>> {
        let session = match self.session.take() {
            Some(session) => session,
            None => self.backend.open(&self.language)?,
        };
        let session = self.session.insert(session);

        let phonemes = session.phonemize(texts)?;
        if phonemes.len() != texts.len() {
            return Err(TtsPrepError::Phonemizer(format!(
                "phonemizer returned {} results for {} texts",
                phonemes.len(),
                texts.len()
            )));
        }
        Ok(phonemes)
    }

    /// Открыта ли сессия
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }
}

/// Применить группы до токенизации ко всем текстам
///
/// Текстовые группы применяются к каждой записи отдельно, группа
/// фонемизации - ко всему пакету одним вызовом. Порядок групп сохраняется.
pub fn run_pre_token_groups(
    texts: Vec<String>,
    plan: &CleanerPlan,
    phonemizer: &mut PhonemizerScope<'_>,
) -> Result<Vec<String>> {
    let mut texts = texts;

    for (group, resolved) in plan.pre_token_groups().iter().zip(plan.resolved_groups()) {
        log::info!("Cleaning with {:?} ...", group.names());
        texts = match resolved {
            ResolvedGroup::Phonemize => phonemizer.phonemize(&texts)?,
            ResolvedGroup::Text(stages) => texts
                .into_iter()
                .map(|text| stages.iter().fold(text, |text, (_, stage)| stage(&text)))
                .collect(),
        };
    }

    Ok(texts)
}

/// Применить этапы начиная с `tokenize_text` к очищенному тексту
///
/// Возвращает токены и их индексы после всех этапов над индексами.
pub fn apply_token_cleaners(
    text: &str,
    plan: &CleanerPlan,
    vocab: &Vocabulary,
) -> Result<(Vec<String>, Vec<u32>)> {
    let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    let mut ids = Vec::new();

    for stage in plan.token_stages() {
        ids = match stage {
            TokenStage::Tokenize => vocab.lookup_indices(&tokens)?,
            TokenStage::Ids(f) => f(ids),
        };
    }

    Ok((tokens, ids))
}

/// Закодировать записи итоговым словарем
///
/// Любой `UNK_ID` в результате - фатальная ошибка с контекстом записи:
/// неизвестный токен означает рассогласование словаря и корпуса.
pub fn encode_records(records: &mut [Record], plan: &CleanerPlan, vocab: &Vocabulary) -> Result<()> {
    for record in records.iter_mut() {
        let (tokens, ids) = apply_token_cleaners(&record.cleaned_text, plan, vocab)?;

        if ids.contains(&UNK_ID) {
            let decoded = vocab.detokenize(&ids);
            log::error!(
                "Found unknown symbol in {}: {:?} -> {:?}",
                record.file_path,
                record.cleaned_text,
                decoded
            );
            return Err(TtsPrepError::UnknownToken {
                file: record.file_path.clone(),
                text: record.cleaned_text.clone(),
                decoded,
            });
        }

        record.tokens = tokens;
        record.token_ids = ids;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenOrder;
    use crate::text::cleaners::CleanerRegistry;
    use crate::text::symbols::{BLANK_ID, SPECIAL_SYMBOLS};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Фонемизатор-заглушка: буквы через пробел, слова через `<space>`
    struct SpellingBackend {
        opened: Rc<Cell<usize>>,
    }

    struct SpellingSession;

    impl PhonemizerSession for SpellingSession {
        fn phonemize(&mut self, texts: &[String]) -> Result<Vec<String>> {
            Ok(texts.iter().map(|t| crate::text::cleaners::split_chars(t)).collect())
        }
    }

    impl PhonemizerBackend for SpellingBackend {
        fn open(&self, _language: &str) -> Result<Box<dyn PhonemizerSession>> {
            self.opened.set(self.opened.get() + 1);
            Ok(Box::new(SpellingSession))
        }
    }

    struct ShortBackend;

    impl PhonemizerBackend for ShortBackend {
        fn open(&self, _language: &str) -> Result<Box<dyn PhonemizerSession>> {
            struct Short;
            impl PhonemizerSession for Short {
                fn phonemize(&mut self, _texts: &[String]) -> Result<Vec<String>> {
                    Ok(Vec::new())
                }
            }
            Ok(Box::new(Short))
        }
    }

    fn plan(list: &[&str]) -> CleanerPlan {
        let names: Vec<String> = list.iter().map(|s| s.to_string()).collect();
        CleanerPlan::new(&names, &CleanerRegistry::builtin()).unwrap()
    }

    #[test]
    fn test_groups_applied_in_order() {
        let opened = Rc::new(Cell::new(0));
        let backend = SpellingBackend { opened: opened.clone() };
        let mut scope = PhonemizerScope::new(&backend, "en-us");

        let plan = plan(&["lowercase", "phonemize_text", "strip_punct", "phonemize_text", "tokenize_text"]);
        let texts = vec!["Hi, Bo!".to_string(), "OK".to_string()];

        let cleaned = run_pre_token_groups(texts, &plan, &mut scope).unwrap();

        // Вторая фонемизация снова разбивает токены на символы
        assert_eq!(cleaned[0], "h <space> i <space> <space> <space> b <space> o");
        assert_eq!(cleaned[1], "o <space> k");
        assert_eq!(opened.get(), 1);
        assert!(scope.is_open());
    }

    #[test]
    fn test_stage_order_within_group_is_preserved() {
        let backend = SpellingBackend { opened: Rc::new(Cell::new(0)) };
        let mut scope = PhonemizerScope::new(&backend, "en-us");
        let texts = vec!["Mr. Smith".to_string()];

        let expand_first = plan(&["expand_abbreviations", "strip_punct", "tokenize_text"]);
        let a = run_pre_token_groups(texts.clone(), &expand_first, &mut scope).unwrap();

        let strip_first = plan(&["strip_punct", "expand_abbreviations", "tokenize_text"]);
        let b = run_pre_token_groups(texts, &strip_first, &mut scope).unwrap();

        assert_eq!(a, vec!["mister Smith".to_string()]);
        assert_eq!(b, vec!["Mr Smith".to_string()]);
    }

    #[test]
    fn test_session_not_opened_without_phonemize_group() {
        let opened = Rc::new(Cell::new(0));
        let backend = SpellingBackend { opened: opened.clone() };
        let mut scope = PhonemizerScope::new(&backend, "en-us");

        let plan = plan(&["lowercase", "collapse_whitespace", "tokenize_text"]);
        let cleaned = run_pre_token_groups(vec!["  A   B ".to_string()], &plan, &mut scope).unwrap();

        assert_eq!(cleaned, vec!["a b".to_string()]);
        assert_eq!(opened.get(), 0);
        assert!(!scope.is_open());
    }

    #[test]
    fn test_phonemizer_length_mismatch() {
        let backend = ShortBackend;
        let mut scope = PhonemizerScope::new(&backend, "en-us");
        let plan = plan(&["phonemize_text", "tokenize_text"]);
        let result = run_pre_token_groups(vec!["a".to_string()], &plan, &mut scope);
        assert!(matches!(result, Err(TtsPrepError::Phonemizer(_))));
    }

    #[test]
    fn test_encode_records_with_blanks() {
        let plan = plan(&["tokenize_text", "add_blank"]);
        let vocab = {
            let mut v = Vocabulary::build_from_iterator(
                vec![vec!["a", "b"]],
                &SPECIAL_SYMBOLS,
                TokenOrder::FirstSeen,
            )
            .unwrap();
            v.set_default_index(UNK_ID).unwrap();
            v
        };

        let mut records = vec![Record {
            cleaned_text: "b a".to_string(),
            ..Record::default()
        }];
        encode_records(&mut records, &plan, &vocab).unwrap();

        assert_eq!(records[0].tokens, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(records[0].token_ids, vec![BLANK_ID, 7, BLANK_ID, 6, BLANK_ID]);
    }

    #[test]
    fn test_encode_records_rejects_unknown_tokens() {
        let plan = plan(&["tokenize_text"]);
        let mut vocab = Vocabulary::build_from_iterator(
            vec![vec!["a"]],
            &SPECIAL_SYMBOLS,
            TokenOrder::FirstSeen,
        )
        .unwrap();
        vocab.set_default_index(UNK_ID).unwrap();

        let mut records = vec![
            Record {
                file_path: "/data/ok.wav".to_string(),
                cleaned_text: "a".to_string(),
                ..Record::default()
            },
            Record {
                file_path: "/data/bad.wav".to_string(),
                cleaned_text: "a z".to_string(),
                ..Record::default()
            },
        ];

        match encode_records(&mut records, &plan, &vocab) {
            Err(TtsPrepError::UnknownToken { file, text, decoded }) => {
                assert_eq!(file, "/data/bad.wav");
                assert_eq!(text, "a z");
                assert_eq!(decoded, "a <unk>");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

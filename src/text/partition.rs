//! Разбиение списка этапов очистки на группы
//!
//! Префикс до `tokenize_text` делится на группы по вхождениям
//! `phonemize_text`: фонемизация всегда образует отдельную группу, соседние
//! остальные этапы объединяются. Суффикс начиная с `tokenize_text`
//! применяется позже, уже с итоговым словарем.

use crate::error::{Result, TtsPrepError};
use crate::text::cleaners::{CleanerRegistry, CleanerStage, IdsFn, TextFn};
use crate::text::symbols::{PHONEMIZE_STAGE, TOKENIZE_STAGE};

/// Группа этапов, применяемых вместе
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanerGroup {
    names: Vec<String>,
    phonemize: bool,
}

impl CleanerGroup {
    fn new(names: Vec<String>, phonemize: bool) -> Self {
        Self { names, phonemize }
    }

    /// Имена этапов группы в порядке применения
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Является ли группа фонемизацией всего корпуса
    pub fn is_phonemize(&self) -> bool {
        self.phonemize
    }
}

/// Разбить список этапов на группы по этапу `phonemize`
///
/// Этап `phonemize` всегда образует группу из одного элемента, серии
/// остальных этапов между вхождениями - одну группу. Пустых групп нет,
/// конкатенация групп воспроизводит исходный список.
pub fn split_cleaner_groups(names: &[String], phonemize: &str) -> Vec<CleanerGroup> {
    let mut groups = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for name in names {
        if name == phonemize {
            if !current.is_empty() {
                groups.push(CleanerGroup::new(std::mem::take(&mut current), false));
            }
            groups.push(CleanerGroup::new(vec![name.clone()], true));
        } else {
            current.push(name.clone());
        }
    }

    if !current.is_empty() {
        groups.push(CleanerGroup::new(current, false));
    }

    groups
}

/// Группа с разрешенными этапами
#[derive(Clone)]
pub enum ResolvedGroup {
    /// Этапы, применяемые к каждой записи
    Text(Vec<(String, TextFn)>),
    /// Фонемизация всего корпуса
    Phonemize,
}

impl std::fmt::Debug for ResolvedGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(stages) => f
                .debug_tuple("Text")
                .field(&stages.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>())
                .finish(),
            Self::Phonemize => f.write_str("Phonemize"),
        }
    }
}

/// Этап, применяемый после построения словаря
#[derive(Clone, Copy)]
pub enum TokenStage {
    /// Перевод токенов в индексы
    Tokenize,
    /// Преобразование индексов
    Ids(IdsFn),
}

impl std::fmt::Debug for TokenStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tokenize => f.write_str("Tokenize"),
            Self::Ids(_) => f.write_str("Ids"),
        }
    }
}

/// План очистки, проверенный по реестру
#[derive(Debug, Clone)]
pub struct CleanerPlan {
    pre_token_groups: Vec<CleanerGroup>,
    token_cleaners: Vec<String>,
    resolved_groups: Vec<ResolvedGroup>,
    token_stages: Vec<TokenStage>,
}

impl CleanerPlan {
    /// Построить план из списка этапов конфигурации
    ///
    /// Все имена разрешаются сразу: неизвестный этап, отсутствие
    /// `tokenize_text` или этап не на своем месте - ошибка конфигурации.
    pub fn new(names: &[String], registry: &CleanerRegistry) -> Result<Self> {
        let stages = names
            .iter()
            .map(|name| registry.resolve(name).map(|stage| (name.as_str(), stage)))
            .collect::<Result<Vec<_>>>()?;

        let token_idx = names.iter().position(|name| name == TOKENIZE_STAGE).ok_or_else(|| {
            TtsPrepError::Configuration(format!(
                "text_cleaners must contain '{}': {:?}",
                TOKENIZE_STAGE, names
            ))
        })?;

        let (prefix, suffix) = stages.split_at(token_idx);

        for (name, stage) in prefix {
            if !matches!(stage, CleanerStage::Text(_) | CleanerStage::Phonemize) {
                return Err(TtsPrepError::Configuration(format!(
                    "cleaner '{}' ({} stage) cannot run before '{}'",
                    name,
                    stage.kind(),
                    TOKENIZE_STAGE
                )));
            }
        }

        let mut token_stages = Vec::with_capacity(suffix.len());
        for (i, (name, stage)) in suffix.iter().enumerate() {
            match (i, stage) {
                (0, CleanerStage::Tokenize) => token_stages.push(TokenStage::Tokenize),
                (i, CleanerStage::Ids(f)) if i > 0 => token_stages.push(TokenStage::Ids(*f)),
                _ => {
                    return Err(TtsPrepError::Configuration(format!(
                        "cleaner '{}' ({} stage) cannot run after '{}'",
                        name,
                        stage.kind(),
                        TOKENIZE_STAGE
                    )))
                }
            }
        }

        let pre_token_groups = split_cleaner_groups(&names[..token_idx], PHONEMIZE_STAGE);
        let resolved_groups = pre_token_groups
            .iter()
            .map(|group| {
                if group.is_phonemize() {
                    return Ok(ResolvedGroup::Phonemize);
                }
                group
                    .names()
                    .iter()
                    .map(|name| match registry.resolve(name)? {
                        CleanerStage::Text(f) => Ok((name.clone(), f)),
                        other => Err(TtsPrepError::Configuration(format!(
                            "cleaner '{}' ({} stage) cannot be grouped with text stages",
                            name,
                            other.kind()
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(ResolvedGroup::Text)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            pre_token_groups,
            token_cleaners: names[token_idx..].to_vec(),
            resolved_groups,
            token_stages,
        })
    }

    /// Группы этапов до токенизации
    pub fn pre_token_groups(&self) -> &[CleanerGroup] {
        &self.pre_token_groups
    }

    /// Этапы начиная с `tokenize_text`
    pub fn token_cleaners(&self) -> &[String] {
        &self.token_cleaners
    }

    pub(crate) fn resolved_groups(&self) -> &[ResolvedGroup] {
        &self.resolved_groups
    }

    pub(crate) fn token_stages(&self) -> &[TokenStage] {
        &self.token_stages
    }

    /// Требуется ли сессия фонемизатора
    pub fn needs_phonemizer(&self) -> bool {
        self.pre_token_groups.iter().any(CleanerGroup::is_phonemize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn group_names(groups: &[CleanerGroup]) -> Vec<Vec<String>> {
        groups.iter().map(|g| g.names().to_vec()).collect()
    }

    #[test]
    fn test_plan_scenario() {
        let list = names(&["lowercase", "phonemize_text", "strip_punct", "tokenize_text", "add_blank"]);
        let plan = CleanerPlan::new(&list, &CleanerRegistry::builtin()).unwrap();

        assert_eq!(
            group_names(plan.pre_token_groups()),
            vec![names(&["lowercase"]), names(&["phonemize_text"]), names(&["strip_punct"])]
        );
        assert_eq!(plan.token_cleaners(), names(&["tokenize_text", "add_blank"]).as_slice());
        assert!(plan.needs_phonemizer());
        assert_eq!(plan.token_stages().len(), 2);
    }

    #[test]
    fn test_split_without_phonemize_is_single_group() {
        let list = names(&["lowercase", "collapse_whitespace"]);
        let groups = split_cleaner_groups(&list, PHONEMIZE_STAGE);
        assert_eq!(group_names(&groups), vec![list.clone()]);
        assert!(!groups[0].is_phonemize());
    }

    #[test]
    fn test_split_empty_prefix() {
        assert!(split_cleaner_groups(&[], PHONEMIZE_STAGE).is_empty());
    }

    #[test]
    fn test_split_concatenation_reproduces_prefix() {
        let list = names(&[
            "phonemize_text",
            "a",
            "b",
            "phonemize_text",
            "phonemize_text",
            "c",
        ]);
        let groups = split_cleaner_groups(&list, PHONEMIZE_STAGE);

        let flattened: Vec<String> = groups.iter().flat_map(|g| g.names().to_vec()).collect();
        assert_eq!(flattened, list);

        for group in &groups {
            assert!(!group.names().is_empty());
            if group.names().iter().any(|n| n == PHONEMIZE_STAGE) {
                assert!(group.is_phonemize());
                assert_eq!(group.names().len(), 1);
            }
        }
        assert_eq!(groups.len(), 5);
    }

    #[test]
    fn test_plan_requires_tokenize() {
        let list = names(&["lowercase", "phonemize_text"]);
        let result = CleanerPlan::new(&list, &CleanerRegistry::builtin());
        assert!(matches!(result, Err(TtsPrepError::Configuration(_))));
    }

    #[test]
    fn test_plan_rejects_unknown_stage_eagerly() {
        let list = names(&["lowercase", "tokenize_text", "add_sparkles"]);
        let result = CleanerPlan::new(&list, &CleanerRegistry::builtin());
        match result {
            Err(TtsPrepError::Configuration(message)) => assert!(message.contains("add_sparkles")),
            other => panic!("unexpected result: {:?}", other.map(|p| p.token_cleaners().to_vec())),
        }
    }

    #[test]
    fn test_plan_rejects_misplaced_stages() {
        let registry = CleanerRegistry::builtin();

        let text_after_tokenize = names(&["tokenize_text", "lowercase"]);
        assert!(CleanerPlan::new(&text_after_tokenize, &registry).is_err());

        let ids_before_tokenize = names(&["add_blank", "tokenize_text"]);
        assert!(CleanerPlan::new(&ids_before_tokenize, &registry).is_err());

        let tokenize_twice = names(&["tokenize_text", "tokenize_text"]);
        assert!(CleanerPlan::new(&tokenize_twice, &registry).is_err());
    }
}

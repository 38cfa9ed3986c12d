//! Основной файл библиотеки tts-prep
//!
//! Подготовка датасета для обучения TTS модели: чтение метаданных корпуса,
//! очистка и фонемизация текста, построение словаря, кодирование записей и
//! разбиение на выборки. Дополнительно - утилиты цикла обучения.

pub mod config;
pub mod corpus;
pub mod dataset;
pub mod download;
pub mod error;
pub mod notification;
pub mod progress;
pub mod storage;
pub mod text;
pub mod training;
pub mod utils;
pub mod vocab;

use std::path::PathBuf;

use crate::config::PrepConfig;
use crate::corpus::load_metadata;
use crate::dataset::split::{check_split_sizes, split_rng};
use crate::dataset::{split_dataset, write_filelist};
use crate::error::Result;
use crate::progress::{ProcessStep, ProgressObserver, ProgressReporter, ProgressTracker};
use crate::text::cleaners::CleanerRegistry;
use crate::text::partition::CleanerPlan;
use crate::text::phonemizer::{EspeakBackend, PhonemizerBackend};
use crate::text::pipeline::{encode_records, run_pre_token_groups, PhonemizerScope};
use crate::text::symbols::{SPECIAL_SYMBOLS, UNK_ID};
use crate::vocab::Vocabulary;

/// Итог подготовки датасета
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepSummary {
    /// Число прочитанных записей
    pub records: usize,
    /// Размер словаря
    pub vocab_size: usize,
    pub train: usize,
    pub val: usize,
    pub test: usize,
    pub vocab_file: PathBuf,
    pub train_file: PathBuf,
    pub val_file: PathBuf,
    pub test_file: PathBuf,
}

/// Основная структура подготовки датасета
pub struct TtsPrep {
    config: PrepConfig,
    plan: CleanerPlan,
    backend: Box<dyn PhonemizerBackend>,
    progress_tracker: Option<ProgressTracker>,
}

impl TtsPrep {
    /// Создать экземпляр со встроенным реестром этапов и espeak-ng
    ///
    /// Конфигурация и список этапов проверяются сразу.
    pub fn new(config: PrepConfig) -> Result<Self> {
        Self::with_registry(config, &CleanerRegistry::builtin())
    }

    /// Создать экземпляр с собственным реестром этапов
    pub fn with_registry(config: PrepConfig, registry: &CleanerRegistry) -> Result<Self> {
        config.validate()?;
        let plan = CleanerPlan::new(&config.data.text_cleaners, registry)?;
        let backend = Box::new(EspeakBackend::new(config.phonemizer.program.clone()));

        log::debug!(
            "Cleaner groups: {:?}, token cleaners: {:?}",
            plan.pre_token_groups().iter().map(|g| g.names()).collect::<Vec<_>>(),
            plan.token_cleaners()
        );

        Ok(Self {
            config,
            plan,
            backend,
            progress_tracker: None,
        })
    }

    /// Заменить бэкенд фонемизатора
    pub fn with_phonemizer_backend(mut self, backend: Box<dyn PhonemizerBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Установить репортер прогресса
    pub fn set_progress_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        match &mut self.progress_tracker {
            Some(tracker) => tracker.set_reporter(reporter),
            None => {
                self.progress_tracker = Some(ProgressTracker::with_reporter(ProcessStep::PREPARE_PLAN, reporter));
            }
        }
    }

    /// Добавить наблюдателя прогресса
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        if self.progress_tracker.is_none() {
            self.set_progress_reporter(Box::new(progress::DefaultProgressReporter::new()));
        }
        self.progress_tracker
            .as_mut()
            .and_then(|tracker| tracker.add_observer(observer))
            .unwrap_or(0)
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    pub fn plan(&self) -> &CleanerPlan {
        &self.plan
    }

    fn step(&self, step: ProcessStep, details: impl Into<String>) {
        if let Some(t) = &self.progress_tracker {
            t.set_step(step);
            t.update_step_progress(0.0, Some(details.into()));
        }
    }

    fn step_done(&self, details: impl Into<String>) {
        if let Some(t) = &self.progress_tracker {
            t.update_step_progress(100.0, Some(details.into()));
        }
    }

    /// Выполнить подготовку датасета целиком
    pub fn process(&self) -> Result<PrepSummary> {
        let config = &self.config;
        log::info!("Starting dataset preparation");

        // Сессия фонемизатора живет до конца запуска, в том числе при ошибке
        let mut phonemizer = PhonemizerScope::new(self.backend.as_ref(), config.data.language.clone());

        // 1. Метаданные
        log::info!("Step 1: Reading metadata");
        self.step(ProcessStep::LoadMetadata, config.metadata_path().display().to_string());
        let mut records = load_metadata(
            config.metadata_path(),
            config.delimiter_byte()?,
            &config.audio_root,
            config.max_rows,
        )?;

        check_split_sizes(records.len(), config.split.n_val, config.split.n_test)?;
        self.step_done(format!("{} records", records.len()));

        // 2. Очистка текста группами
        log::info!("Step 2: Cleaning text with {:?}", config.data.text_cleaners);
        self.step(ProcessStep::CleanText, format!("{} groups", self.plan.pre_token_groups().len()));
        let texts = records.iter().map(|r| r.normalized_text.clone()).collect();
        let cleaned = run_pre_token_groups(texts, &self.plan, &mut phonemizer)?;
        for (record, text) in records.iter_mut().zip(cleaned) {
            record.cleaned_text = text;
        }
        self.step_done("text cleaned");

        // 3. Словарь
        log::info!("Step 3: Building vocabulary");
        self.step(ProcessStep::BuildVocabulary, config.vocab_file.display().to_string());
        let mut vocab = Vocabulary::build_from_iterator(
            records.iter().map(|r| r.cleaned_text.split_whitespace()),
            &SPECIAL_SYMBOLS,
            config.vocab_order,
        )?;
        vocab.set_default_index(UNK_ID)?;
        vocab.save(&config.vocab_file)?;

        // Кодирование идет по словарю, прочитанному из файла
        let vocab = Vocabulary::load(&config.vocab_file, &SPECIAL_SYMBOLS, UNK_ID)?;
        log::info!("Size of vocabulary: {}", vocab.len());
        log::debug!("Vocabulary: {:?}", vocab.itos());
        self.step_done(format!("{} tokens", vocab.len()));

        // 4. Кодирование
        log::info!("Step 4: Encoding records with {:?}", self.plan.token_cleaners());
        self.step(ProcessStep::EncodeRecords, format!("{} records", records.len()));
        encode_records(&mut records, &self.plan, &vocab)?;
        self.step_done("records encoded");

        // 5. Разбиение
        log::info!("Step 5: Splitting dataset");
        self.step(ProcessStep::SplitDataset, config.output_dir.display().to_string());
        let total = records.len();
        let mut rng = split_rng(config.split.seed);
        let splits = split_dataset(records, config.split.n_val, config.split.n_test, &mut rng)?;

        let train_file = config.output_dir.join("train.txt");
        let val_file = config.output_dir.join("val.txt");
        let test_file = config.output_dir.join("test.txt");
        write_filelist(&train_file, &splits.train)?;
        write_filelist(&val_file, &splits.val)?;
        write_filelist(&test_file, &splits.test)?;

        if let Some(t) = &self.progress_tracker {
            t.complete();
        }

        log::info!("Dataset preparation completed");
        Ok(PrepSummary {
            records: total,
            vocab_size: vocab.len(),
            train: splits.train.len(),
            val: splits.val.len(),
            test: splits.test.len(),
            vocab_file: config.vocab_file.clone(),
            train_file,
            val_file,
            test_file,
        })
    }
}

/// Публичный API для удобного использования
pub fn prepare_filelists(config: PrepConfig) -> Result<PrepSummary> {
    TtsPrep::new(config)?.process()
}

/// Публичный API с поддержкой отслеживания прогресса
pub fn prepare_filelists_with_progress(
    config: PrepConfig,
    reporter: Box<dyn ProgressReporter>,
) -> Result<PrepSummary> {
    let mut prep = TtsPrep::new(config)?;
    prep.set_progress_reporter(reporter);
    prep.process()
}

//! Модуль фонемизации
//!
//! Фонемизация применяется ко всему корпусу за один вызов. Сессия бэкенда
//! открывается один раз за запуск подготовки и освобождается при уничтожении
//! (в том числе при ошибке).
//!
//! Сессия espeak-ng владеет только найденной утилитой и рабочим файлом:
//! каждый текст фонемизируется отдельным процессом `espeak-ng`, так что на
//! полном LJSpeech это около 13 тысяч запусков. Выход i соответствует
//! тексту i.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{Result, TtsPrepError};
use crate::text::symbols::SPACE;
use crate::utils::temp::TempFileManager;
use crate::utils::tools::{self, ExternalTool};

/// Открытая сессия фонемизатора
pub trait PhonemizerSession {
    /// Фонемизировать весь пакет текстов
    ///
    /// Возвращает по одной строке фонем на каждый входной текст: фонемы
    /// разделены пробелом, слова - токеном `<space>`.
    fn phonemize(&mut self, texts: &[String]) -> Result<Vec<String>>;
}

/// Бэкенд, открывающий сессии фонемизации
pub trait PhonemizerBackend {
    /// Открыть сессию для указанного языка
    fn open(&self, language: &str) -> Result<Box<dyn PhonemizerSession>>;
}

/// Бэкенд на основе утилиты espeak-ng
#[derive(Debug, Clone)]
pub struct EspeakBackend {
    program: String,
}

impl EspeakBackend {
    /// Создать бэкенд для исполняемого файла (имя в PATH или путь)
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for EspeakBackend {
    fn default() -> Self {
        Self::new("espeak-ng")
    }
}

impl PhonemizerBackend for EspeakBackend {
    fn open(&self, language: &str) -> Result<Box<dyn PhonemizerSession>> {
        let tool = tools::locate_tool(&self.program).map_err(|e| {
            TtsPrepError::Phonemizer(format!("espeak-ng is not available: {}", e))
        })?;

        let mut scratch = TempFileManager::new("tts-prep-espeak")?;
        let input_file = scratch.create_temp_file("utterance", "txt")?;

        log::info!(
            "Opened espeak-ng session ({}, version {}, language {})",
            tool.path.display(),
            tool.version.as_deref().unwrap_or("unknown"),
            language
        );

        Ok(Box::new(EspeakSession {
            tool,
            language: language.to_string(),
            input_file,
            _scratch: scratch,
        }))
    }
}

/// Сессия espeak-ng с рабочей директорией на время запуска
///
/// Процесс `espeak-ng` запускается заново на каждый текст.
struct EspeakSession {
    tool: ExternalTool,
    language: String,
    input_file: PathBuf,
    // Держит рабочую директорию до закрытия сессии
    _scratch: TempFileManager,
}

impl EspeakSession {
    fn phonemize_one(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        // Текст передается файлом, не аргументом командной строки
        fs::write(&self.input_file, text)?;

        let output = Command::new(&self.tool.path)
            .args(["-q", "--ipa=3", "-v", &self.language, "-f"])
            .arg(&self.input_file)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| TtsPrepError::Phonemizer(format!("Failed to run espeak-ng: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TtsPrepError::Phonemizer(format!(
                "espeak-ng exited with {} for {:?}: {}",
                output.status,
                text,
                stderr.trim()
            )));
        }

        Ok(parse_espeak_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl PhonemizerSession for EspeakSession {
    fn phonemize(&mut self, texts: &[String]) -> Result<Vec<String>> {
        let mut result = Vec::with_capacity(texts.len());
        for (idx, text) in texts.iter().enumerate() {
            result.push(self.phonemize_one(text)?);
            if (idx + 1) % 1000 == 0 {
                log::debug!("Phonemized {}/{} texts", idx + 1, texts.len());
            }
        }
        Ok(result)
    }
}

impl Drop for EspeakSession {
    fn drop(&mut self) {
        log::debug!("Closing espeak-ng session ({})", self.language);
    }
}

/// Привести вывод `espeak-ng --ipa=3` к токенам словаря
///
/// В выводе фонемы слова разделены '_', слова - пробелами, клаузы -
/// переводами строк.
pub fn parse_espeak_output(output: &str) -> String {
    let words: Vec<String> = output
        .split_whitespace()
        .map(|word| {
            word.split('_')
                .filter(|phone| !phone.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|word| !word.is_empty())
        .collect();

    words.join(&format!(" {} ", SPACE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_espeak_output() {
        let output = " h_ə_l_ˈoʊ w_ˈɜː_l_d\n ð_ɪs\n";
        assert_eq!(
            parse_espeak_output(output),
            "h ə l ˈoʊ <space> w ˈɜː l d <space> ð ɪs"
        );
    }

    #[test]
    fn test_parse_empty_output() {
        assert_eq!(parse_espeak_output("\n  \n"), "");
        assert_eq!(parse_espeak_output("_ __"), "");
    }

    #[test]
    fn test_missing_program_is_phonemizer_error() {
        let backend = EspeakBackend::new("/definitely/not/here/espeak-ng");
        let result = backend.open("en-us");
        assert!(matches!(result, Err(TtsPrepError::Phonemizer(_))));
    }
}

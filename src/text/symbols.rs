//! Специальные символы словаря и имена ключевых этапов очистки

/// Заполнитель
pub const PAD: &str = "<pad>";
/// Неизвестный токен
pub const UNK: &str = "<unk>";
/// Начало последовательности
pub const BOS: &str = "<bos>";
/// Конец последовательности
pub const EOS: &str = "<eos>";
/// Граница слова в потоке фонем или символов
pub const SPACE: &str = "<space>";
/// Пустой токен, вставляемый между символами
pub const BLANK: &str = "<blank>";

/// Специальные символы в порядке их индексов
pub const SPECIAL_SYMBOLS: [&str; 6] = [PAD, UNK, BOS, EOS, SPACE, BLANK];

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const BOS_ID: u32 = 2;
pub const EOS_ID: u32 = 3;
pub const SPACE_ID: u32 = 4;
pub const BLANK_ID: u32 = 5;

/// Этап фонемизации, разделяющий группы очистки
pub const PHONEMIZE_STAGE: &str = "phonemize_text";
/// Этап токенизации, с которого начинаются этапы, связанные со словарем
pub const TOKENIZE_STAGE: &str = "tokenize_text";

/// Является ли токен специальным символом
pub fn is_special(token: &str) -> bool {
    SPECIAL_SYMBOLS.contains(&token)
}

//! Подготовка текста к синтезу
//!
//! Конвейер: очистка сырого текста, разворачивание числительных,
//! транслитерация иноязычных слов, разбиение на фрагменты.

pub mod numbers;
pub mod segment;
pub mod translit;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Language;
use crate::dispatch::chunk::Chunk;
use crate::error::{AppError, Result};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Очистка сырого текста: управляющие символы, варианты кавычек и
/// пробелов, HTML-теги и сущности, лишние пустые строки.
pub fn clean_text(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());

    for c in raw.chars() {
        match c {
            '\r' => {}
            '\n' | '\t' => text.push(c),
            c if c.is_control() => {}
            '«' | '»' | '„' | '“' | '”' => text.push('"'),
            '‘' | '’' | '`' => text.push('\''),
            '\u{00a0}' | '\u{2000}'..='\u{200b}' | '\u{202f}' => text.push(' '),
            '…' => text.push_str("..."),
            c => text.push(c),
        }
    }

    let text = TAG_RE.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&apos;", "'");

    let text = SPACES_RE.replace_all(&text, " ");
    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");

    text.trim().to_string()
}

/// Полный конвейер нормализации: очистить, развернуть числа,
/// транслитерировать и разбить на фрагменты до `max_chunk_len` символов.
pub fn normalize(raw_text: &str, language: Language, max_chunk_len: usize) -> Result<Vec<Chunk>> {
    let cleaned = clean_text(raw_text);
    if cleaned.is_empty() {
        return Err(AppError::InvalidInput(
            "text is empty after cleaning".to_string(),
        ));
    }

    let expanded = numbers::expand_numbers(&cleaned, language);
    let transliterated = translit::transliterate_foreign(&expanded, language);

    let chunks = segment::split_into_chunks(&transliterated, max_chunk_len)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk::root(index, text))
        .collect::<Vec<_>>();

    if chunks.is_empty() {
        return Err(AppError::InvalidInput(
            "no speakable text found".to_string(),
        ));
    }

    log::debug!(
        "normalized {} chars into {} chunks (max {})",
        raw_text.len(),
        chunks.len(),
        max_chunk_len
    );

    Ok(chunks)
}

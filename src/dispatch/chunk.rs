//! Фрагменты текста, планируемые как единицы синтеза

use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;

/// Ограниченный по длине отрезок текста с устойчивым номером и
/// идентификатором родословной (`0007`, `0007_a`, `0007_a_b`).
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Порядковый номер исходного фрагмента, с нуля
    pub index: usize,

    /// Идентификатор родословной — растёт при рекурсивном делении
    pub id: String,

    /// Текст фрагмента
    pub text: String,
}

impl Chunk {
    /// Корневой фрагмент с идентификатором из номера
    pub fn root(index: usize, text: String) -> Self {
        Self {
            index,
            id: format!("{:04}", index),
            text,
        }
    }

    /// Разделить фрагмент пополам: по границе предложения ближе к середине,
    /// иначе по ближайшему пробелу, иначе жёстко посередине.
    /// Дети наследуют номер и получают суффиксы `_a` / `_b`.
    pub fn split(&self) -> (Chunk, Chunk) {
        let at = split_point(&self.text);
        let (left, right) = self.text.split_at(at);
        (
            Chunk {
                index: self.index,
                id: format!("{}_a", self.id),
                text: left.trim().to_string(),
            },
            Chunk {
                index: self.index,
                id: format!("{}_b", self.id),
                text: right.trim().to_string(),
            },
        )
    }
}

/// Результат синтеза одного фрагмента
#[derive(Debug, Clone)]
pub struct ChunkResult {
    /// Номер исходного фрагмента
    pub index: usize,

    /// Идентификатор родословной
    pub id: String,

    /// Удался ли синтез хотя бы частично
    pub success: bool,

    /// Аудиофайлы в порядке родословной (несколько — после деления)
    pub fragments: Vec<PathBuf>,

    /// Сообщение об ошибке при неудаче
    pub error: Option<String>,
}

impl ChunkResult {
    pub fn ok(chunk: &Chunk, fragments: Vec<PathBuf>) -> Self {
        Self {
            index: chunk.index,
            id: chunk.id.clone(),
            success: true,
            fragments,
            error: None,
        }
    }

    pub fn failed(chunk: &Chunk, error: String) -> Self {
        Self {
            index: chunk.index,
            id: chunk.id.clone(),
            success: false,
            fragments: Vec::new(),
            error: Some(error),
        }
    }
}

lazy_static! {
    static ref SENTENCE_END: Regex = Regex::new(r"[.!?]+\s*").unwrap();
}

/// Точка деления текста: граница предложения, ближайшая к середине;
/// запасной вариант — ближайший пробел; крайний — жёсткий разрез.
/// Возвращаемое смещение всегда лежит на границе символа.
pub fn split_point(text: &str) -> usize {
    let mid = text.len() / 2;

    let mut best: Option<usize> = None;
    for m in SENTENCE_END.find_iter(text) {
        let end = m.end();
        // Деление строго внутри текста, иначе половина окажется пустой
        if end == 0 || end >= text.len() {
            continue;
        }
        match best {
            Some(b) if b.abs_diff(mid) <= end.abs_diff(mid) => {}
            _ => best = Some(end),
        }
    }
    if let Some(at) = best {
        return at;
    }

    let mut best_ws: Option<usize> = None;
    for (pos, ch) in text.char_indices() {
        if ch.is_whitespace() && pos > 0 && pos < text.len() {
            match best_ws {
                Some(b) if b.abs_diff(mid) <= pos.abs_diff(mid) => {}
                _ => best_ws = Some(pos),
            }
        }
    }
    if let Some(at) = best_ws {
        return at;
    }

    let mut at = mid.max(1).min(text.len().saturating_sub(1));
    while at > 0 && !text.is_char_boundary(at) {
        at -= 1;
    }
    at.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lineage_ids() {
        let chunk = Chunk::root(7, "First sentence. Second sentence.".to_string());
        assert_eq!(chunk.id, "0007");

        let (a, b) = chunk.split();
        assert_eq!(a.id, "0007_a");
        assert_eq!(b.id, "0007_b");
        assert_eq!(a.index, 7);
        assert_eq!(b.index, 7);

        let (aa, _ab) = a.split();
        assert_eq!(aa.id, "0007_a_a");
    }

    #[test]
    fn test_split_at_sentence_boundary() {
        let text = "One two three. Four five six.";
        let at = split_point(text);
        assert_eq!(&text[..at], "One two three. ");
    }

    #[test]
    fn test_split_falls_back_to_whitespace() {
        let text = "alpha beta gamma delta";
        let at = split_point(text);
        assert!(text.as_bytes()[at].is_ascii_alphabetic() || text.as_bytes()[at] == b' ');
        let (left, right) = text.split_at(at);
        assert!(!left.trim().is_empty());
        assert!(!right.trim().is_empty());
    }

    #[test]
    fn test_split_hard_cut() {
        let text = "abcdefghij";
        let at = split_point(text);
        assert!(at > 0 && at < text.len());
    }

    #[test]
    fn test_split_multibyte_safe() {
        let text = "абвгдежзик";
        let at = split_point(text);
        assert!(text.is_char_boundary(at));
    }
}

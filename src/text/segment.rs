//! Разбиение очищенного текста на фрагменты ограниченной длины
//!
//! Абзацы упаковываются в фрагменты до максимальной длины; абзац длиннее
//! максимума делится по границам предложений, предложение длиннее
//! максимума — по пробелам. Порядок фрагментов совпадает с порядком
//! исходного текста.

use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]*[.!?]+\s*").unwrap());

/// Разделить абзац на предложения, сохраняя знаки конца предложения
fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut consumed = 0;

    for m in SENTENCE_RE.find_iter(paragraph) {
        sentences.push(m.as_str().to_string());
        consumed = m.end();
    }
    if consumed < paragraph.len() {
        let tail = &paragraph[consumed..];
        if !tail.trim().is_empty() {
            sentences.push(tail.to_string());
        }
    }

    sentences
}

/// Жадно упаковать слова предложения, которое само длиннее максимума
fn split_words(sentence: &str, max_len: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for word in sentence.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_len {
            parts.push(current.clone());
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        // Слово длиннее максимума режется жёстко
        if word.chars().count() > max_len {
            let mut buf = String::new();
            for c in word.chars() {
                if buf.chars().count() == max_len {
                    if current.is_empty() {
                        parts.push(buf.clone());
                    } else {
                        current.push_str(&buf);
                        parts.push(current.clone());
                        current.clear();
                    }
                    buf.clear();
                }
                buf.push(c);
            }
            current.push_str(&buf);
        } else {
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Упаковать абзацы в фрагменты длиной до `max_len` символов
pub fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    assert!(max_len > 0);
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String, chunks: &mut Vec<String>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        current.clear();
    };

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if paragraph.chars().count() <= max_len {
            if !current.is_empty()
                && current.chars().count() + 1 + paragraph.chars().count() > max_len
            {
                flush(&mut current, &mut chunks);
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(paragraph);
            continue;
        }

        // Абзац длиннее максимума: делим по предложениям,
        // внутри предложения — только если оно само не помещается
        flush(&mut current, &mut chunks);
        for sentence in split_sentences(paragraph) {
            let sentence_len = sentence.trim_end().chars().count();
            if sentence_len > max_len {
                flush(&mut current, &mut chunks);
                for part in split_words(&sentence, max_len) {
                    chunks.push(part.trim().to_string());
                }
                continue;
            }
            if !current.is_empty() && current.chars().count() + sentence_len > max_len {
                flush(&mut current, &mut chunks);
            }
            current.push_str(&sentence);
        }
        flush(&mut current, &mut chunks);
    }
    flush(&mut current, &mut chunks);

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_paragraphs_packed() {
        let text = "One.\nTwo.\nThree.";
        let chunks = split_into_chunks(text, 100);
        assert_eq!(chunks, vec!["One.\nTwo.\nThree."]);
    }

    #[test]
    fn test_packing_respects_limit() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = split_into_chunks(text, 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_long_paragraph_split_at_sentences() {
        let text = "First sentence here. Second sentence here. Third sentence here.";
        let chunks = split_into_chunks(text, 45);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 45, "chunk too long: {:?}", chunk);
            assert!(chunk.ends_with('.'));
        }
    }

    #[test]
    fn test_oversized_sentence_split_at_whitespace() {
        let text = "word ".repeat(50);
        let chunks = split_into_chunks(text.trim(), 30);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30);
            assert!(!chunk.contains("wordword"));
        }
    }

    #[test]
    fn test_order_is_stable_and_text_preserved() {
        let text = "Alpha beta. Gamma delta! Epsilon zeta?\nEta theta.";
        let chunks = split_into_chunks(text, 20);

        let rejoined: String = chunks.join(" ");
        let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(squash(&rejoined), squash(text));

        // Порядок сохранён
        let alpha = rejoined.find("Alpha").unwrap();
        let eta = rejoined.find("Eta").unwrap();
        assert!(alpha < eta);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let text = "One.\n\n\nTwo.";
        let chunks = split_into_chunks(text, 4);
        assert_eq!(chunks, vec!["One.", "Two."]);
    }
}

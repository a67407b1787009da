//! Транслитерация иноязычных слов между латиницей и кириллицей
//!
//! Бэкенды, читающие кириллицу, спотыкаются на вкраплениях латиницы
//! (и наоборот), поэтому слова чужого письма переводятся в целевое
//! подстановкой по таблице: сначала диграфы, затем одиночные символы.

use crate::config::Language;

/// Латиница → кириллица, длинные образцы раньше коротких
const LAT_TO_CYR: &[(&str, &str)] = &[
    ("shch", "щ"),
    ("sch", "щ"),
    ("zh", "ж"),
    ("kh", "х"),
    ("ts", "ц"),
    ("ch", "ч"),
    ("sh", "ш"),
    ("yo", "ё"),
    ("yu", "ю"),
    ("ya", "я"),
    ("ye", "е"),
    ("a", "а"),
    ("b", "б"),
    ("c", "к"),
    ("d", "д"),
    ("e", "е"),
    ("f", "ф"),
    ("g", "г"),
    ("h", "х"),
    ("i", "и"),
    ("j", "дж"),
    ("k", "к"),
    ("l", "л"),
    ("m", "м"),
    ("n", "н"),
    ("o", "о"),
    ("p", "п"),
    ("q", "к"),
    ("r", "р"),
    ("s", "с"),
    ("t", "т"),
    ("u", "у"),
    ("v", "в"),
    ("w", "в"),
    ("x", "кс"),
    ("y", "й"),
    ("z", "з"),
];

/// Кириллица → латиница, длинные образцы раньше коротких
const CYR_TO_LAT: &[(&str, &str)] = &[
    ("щ", "shch"),
    ("ж", "zh"),
    ("х", "kh"),
    ("ц", "ts"),
    ("ч", "ch"),
    ("ш", "sh"),
    ("ё", "yo"),
    ("ю", "yu"),
    ("я", "ya"),
    ("а", "a"),
    ("б", "b"),
    ("в", "v"),
    ("г", "g"),
    ("д", "d"),
    ("е", "e"),
    ("з", "z"),
    ("и", "i"),
    ("й", "y"),
    ("к", "k"),
    ("л", "l"),
    ("м", "m"),
    ("н", "n"),
    ("о", "o"),
    ("п", "p"),
    ("р", "r"),
    ("с", "s"),
    ("т", "t"),
    ("у", "u"),
    ("ф", "f"),
    ("ъ", ""),
    ("ы", "y"),
    ("ь", ""),
    ("э", "e"),
];

fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}')
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// Подстановка по таблице: на каждой позиции пробуется самый длинный
/// образец; непокрытые символы проходят без изменений.
fn substitute(word: &str, table: &[(&str, &str)]) -> String {
    let lower = word.to_lowercase();
    let mut out = String::with_capacity(word.len() * 2);
    let mut rest = lower.as_str();

    'outer: while !rest.is_empty() {
        for (pattern, replacement) in table {
            if rest.starts_with(pattern) {
                out.push_str(replacement);
                rest = &rest[pattern.len()..];
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        out.push(chars.next().unwrap());
        rest = chars.as_str();
    }

    out
}

/// Восстановить заглавную первую букву исходного слова
fn restore_capitalization(original: &str, converted: String) -> String {
    let capitalized = original.chars().next().map(char::is_uppercase).unwrap_or(false);
    if !capitalized {
        return converted;
    }
    let mut chars = converted.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => converted,
    }
}

/// Транслитерировать одно слово, если большинство его букв принадлежит
/// чужому для целевого языка письму.
fn transliterate_word(word: &str, target: Language) -> String {
    let latin = word.chars().filter(|c| is_latin(*c)).count();
    let cyrillic = word.chars().filter(|c| is_cyrillic(*c)).count();
    let letters = latin + cyrillic;
    if letters == 0 {
        return word.to_string();
    }

    match target {
        Language::Ru if latin * 2 > letters => {
            restore_capitalization(word, substitute(word, LAT_TO_CYR))
        }
        Language::En if cyrillic * 2 > letters => {
            restore_capitalization(word, substitute(word, CYR_TO_LAT))
        }
        _ => word.to_string(),
    }
}

/// Транслитерировать все иноязычные слова текста в письмо целевого языка
pub fn transliterate_foreign(text: &str, target: Language) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();

    for c in text.chars() {
        if c.is_alphanumeric() || c == '\'' {
            word.push(c);
        } else {
            if !word.is_empty() {
                out.push_str(&transliterate_word(&word, target));
                word.clear();
            }
            out.push(c);
        }
    }
    if !word.is_empty() {
        out.push_str(&transliterate_word(&word, target));
    }

    out
}

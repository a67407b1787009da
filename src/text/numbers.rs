//! Разворачивание числительных в слова для русского и английского

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::Language;

const RU_ONES: [&str; 20] = [
    "",
    "один",
    "два",
    "три",
    "четыре",
    "пять",
    "шесть",
    "семь",
    "восемь",
    "девять",
    "десять",
    "одиннадцать",
    "двенадцать",
    "тринадцать",
    "четырнадцать",
    "пятнадцать",
    "шестнадцать",
    "семнадцать",
    "восемнадцать",
    "девятнадцать",
];

const RU_ONES_FEM: [&str; 3] = ["", "одна", "две"];

const RU_TENS: [&str; 10] = [
    "",
    "",
    "двадцать",
    "тридцать",
    "сорок",
    "пятьдесят",
    "шестьдесят",
    "семьдесят",
    "восемьдесят",
    "девяносто",
];

const RU_HUNDREDS: [&str; 10] = [
    "",
    "сто",
    "двести",
    "триста",
    "четыреста",
    "пятьсот",
    "шестьсот",
    "семьсот",
    "восемьсот",
    "девятьсот",
];

const EN_ONES: [&str; 20] = [
    "",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const EN_TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Фраза-замена для нечитаемых чисел: сплошные нули и цепочки от 16 цифр
fn too_large_phrase(lang: Language) -> &'static str {
    match lang {
        Language::Ru => "слишком большое число",
        Language::En => "number too large",
    }
}

/// Склонение слова-разряда по стандартному славянскому правилу:
/// последние две цифры 11–19 — всегда форма "много"; иначе последняя
/// цифра 1 — форма "один", 2–4 — форма "несколько", остальное — "много".
fn ru_scale(n: u64, one: &'static str, few: &'static str, many: &'static str) -> &'static str {
    let last_two = n % 100;
    if (11..=19).contains(&last_two) {
        return many;
    }
    match n % 10 {
        1 => one,
        2..=4 => few,
        _ => many,
    }
}

/// Сотенная часть (0–999) русскими словами; тысячи требуют женского рода
fn hundreds_ru(n: u64, feminine: bool) -> String {
    let n = n as usize;
    let mut parts = Vec::new();

    if n / 100 > 0 {
        parts.push(RU_HUNDREDS[n / 100]);
    }

    let rem = n % 100;
    if rem > 0 {
        if rem < 20 {
            if feminine && rem <= 2 {
                parts.push(RU_ONES_FEM[rem]);
            } else {
                parts.push(RU_ONES[rem]);
            }
        } else {
            parts.push(RU_TENS[rem / 10]);
            let ones = rem % 10;
            if ones > 0 {
                if feminine && ones <= 2 {
                    parts.push(RU_ONES_FEM[ones]);
                } else {
                    parts.push(RU_ONES[ones]);
                }
            }
        }
    }

    parts.join(" ")
}

fn hundreds_en(n: u64) -> String {
    let n = n as usize;
    let mut parts = Vec::new();

    if n / 100 > 0 {
        parts.push(format!("{} hundred", EN_ONES[n / 100]));
    }

    let rem = n % 100;
    if rem > 0 {
        if rem < 20 {
            parts.push(EN_ONES[rem].to_string());
        } else {
            let ones = rem % 10;
            if ones > 0 {
                parts.push(format!("{}-{}", EN_TENS[rem / 10], EN_ONES[ones]));
            } else {
                parts.push(EN_TENS[rem / 10].to_string());
            }
        }
    }

    parts.join(" ")
}

/// Целое число русскими словами: разложение на триллионы/миллиарды/
/// миллионы/тысячи/остаток с грамматическим согласованием
pub fn num_to_words_ru(num: u64) -> String {
    if num == 0 {
        return "ноль".to_string();
    }

    let mut parts: Vec<String> = Vec::new();
    let mut n = num;

    let trillions = n / 1_000_000_000_000;
    if trillions > 0 {
        parts.push(hundreds_ru(trillions, false));
        parts.push(ru_scale(trillions, "триллион", "триллиона", "триллионов").to_string());
    }
    n %= 1_000_000_000_000;

    let billions = n / 1_000_000_000;
    if billions > 0 {
        parts.push(hundreds_ru(billions, false));
        parts.push(ru_scale(billions, "миллиард", "миллиарда", "миллиардов").to_string());
    }
    n %= 1_000_000_000;

    let millions = n / 1_000_000;
    if millions > 0 {
        parts.push(hundreds_ru(millions, false));
        parts.push(ru_scale(millions, "миллион", "миллиона", "миллионов").to_string());
    }
    n %= 1_000_000;

    // Тысячи в русском — женского рода
    let thousands = n / 1_000;
    if thousands > 0 {
        parts.push(hundreds_ru(thousands, true));
        parts.push(ru_scale(thousands, "тысяча", "тысячи", "тысяч").to_string());
    }
    n %= 1_000;

    if n > 0 {
        parts.push(hundreds_ru(n, false));
    }

    parts
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Целое число английскими словами
pub fn num_to_words_en(num: u64) -> String {
    if num == 0 {
        return "zero".to_string();
    }

    let mut parts: Vec<String> = Vec::new();
    let mut n = num;

    for (scale, word) in [
        (1_000_000_000_000u64, "trillion"),
        (1_000_000_000, "billion"),
        (1_000_000, "million"),
        (1_000, "thousand"),
    ] {
        let count = n / scale;
        if count > 0 {
            parts.push(hundreds_en(count));
            parts.push(word.to_string());
        }
        n %= scale;
    }

    if n > 0 {
        parts.push(hundreds_en(n));
    }

    parts
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn num_to_words(num: u64, lang: Language) -> String {
    match lang {
        Language::Ru => num_to_words_ru(num),
        Language::En => num_to_words_en(num),
    }
}

/// Развернуть цепочку цифр в слова. Ведущие нули отбрасываются; сплошные
/// нули и цепочки от 16 цифр заменяются фиксированной фразой.
pub fn expand_digit_run(run: &str, lang: Language) -> String {
    if run.bytes().all(|b| b == b'0') {
        return too_large_phrase(lang).to_string();
    }

    let stripped = run.trim_start_matches('0');
    if stripped.len() >= 16 {
        return too_large_phrase(lang).to_string();
    }

    match stripped.parse::<u64>() {
        Ok(n) => num_to_words(n, lang),
        Err(_) => too_large_phrase(lang).to_string(),
    }
}

/// Фраза для цепочки нулей после десятичной точки: до шести нулей —
/// повторённое слово "ноль"/"zero", дальше — замкнутая форма
/// "точка N нулей" / "point N zeros".
fn zero_run_phrase(count: usize, lang: Language) -> String {
    match lang {
        Language::Ru => {
            if count <= 6 {
                vec!["ноль"; count].join(" ")
            } else {
                format!("{} нулей", num_to_words_ru(count as u64))
            }
        }
        Language::En => {
            if count <= 6 {
                vec!["zero"; count].join(" ")
            } else {
                format!("{} zeros", num_to_words_en(count as u64))
            }
        }
    }
}

static DECIMAL_ZEROS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.(0+)\b").unwrap());
static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Заменить все числа в тексте их словесным представлением.
/// Сначала обрабатываются десятичные цепочки нулей (`3.000` и т.п.),
/// затем оставшиеся целые.
pub fn expand_numbers(text: &str, lang: Language) -> String {
    let point_word = match lang {
        Language::Ru => "точка",
        Language::En => "point",
    };

    let text = DECIMAL_ZEROS_RE.replace_all(text, |caps: &Captures| {
        let int_part = expand_digit_run(&caps[1], lang);
        let zeros = zero_run_phrase(caps[2].len(), lang);
        format!("{} {} {}", int_part, point_word, zeros)
    });

    DIGIT_RUN_RE
        .replace_all(&text, |caps: &Captures| expand_digit_run(&caps[0], lang))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_russian_basic() {
        assert_eq!(num_to_words_ru(0), "ноль");
        assert_eq!(num_to_words_ru(1), "один");
        assert_eq!(num_to_words_ru(10), "десять");
        assert_eq!(num_to_words_ru(11), "одиннадцать");
        assert_eq!(num_to_words_ru(19), "девятнадцать");
        assert_eq!(num_to_words_ru(21), "двадцать один");
        assert_eq!(num_to_words_ru(100), "сто");
        assert_eq!(num_to_words_ru(347), "триста сорок семь");
    }

    #[test]
    fn test_russian_feminine_thousands() {
        assert_eq!(num_to_words_ru(1000), "одна тысяча");
        assert_eq!(num_to_words_ru(2000), "две тысячи");
        assert_eq!(num_to_words_ru(21000), "двадцать одна тысяча");
        assert_eq!(num_to_words_ru(2345), "две тысячи триста сорок пять");
    }

    #[test]
    fn test_russian_scale_pluralization() {
        // 1 — форма "один", 2–4 — "несколько", 5+ — "много", 11–19 — всегда "много"
        assert_eq!(num_to_words_ru(1_000_000), "один миллион");
        assert_eq!(num_to_words_ru(2_000_000), "два миллиона");
        assert_eq!(num_to_words_ru(5_000_000), "пять миллионов");
        assert_eq!(num_to_words_ru(11_000), "одиннадцать тысяч");
        assert_eq!(num_to_words_ru(12_000_000), "двенадцать миллионов");
        assert_eq!(num_to_words_ru(111_000), "сто одиннадцать тысяч");
        assert_eq!(
            num_to_words_ru(1_000_000_000_000),
            "один триллион"
        );
        assert_eq!(num_to_words_ru(3_000_000_000), "три миллиарда");
    }

    #[test]
    fn test_slavic_rule_sampled() {
        for (n, expected) in [
            (1u64, "тысяча"),
            (2, "тысячи"),
            (4, "тысячи"),
            (5, "тысяч"),
            (11, "тысяч"),
            (14, "тысяч"),
            (19, "тысяч"),
            (21, "тысяча"),
            (22, "тысячи"),
            (25, "тысяч"),
            (111, "тысяч"),
            (121, "тысяча"),
        ] {
            assert_eq!(
                ru_scale(n, "тысяча", "тысячи", "тысяч"),
                expected,
                "wrong form for {}",
                n
            );
        }
    }

    #[test]
    fn test_english_basic() {
        assert_eq!(num_to_words_en(0), "zero");
        assert_eq!(num_to_words_en(21), "twenty-one");
        assert_eq!(num_to_words_en(100), "one hundred");
        assert_eq!(
            num_to_words_en(2345),
            "two thousand three hundred forty-five"
        );
        assert_eq!(num_to_words_en(1_000_000), "one million");
    }

    #[test]
    fn test_digit_run_rules() {
        // Ведущие нули
        assert_eq!(expand_digit_run("007", Language::Ru), "семь");
        // Сплошные нули читаются фиксированной фразой
        assert_eq!(expand_digit_run("0", Language::Ru), "слишком большое число");
        assert_eq!(
            expand_digit_run("0000", Language::En),
            "number too large"
        );
        // 16 цифр и больше
        assert_eq!(
            expand_digit_run("1234567890123456", Language::Ru),
            "слишком большое число"
        );
        // 15 цифр ещё раскладываются
        assert!(expand_digit_run("999999999999999", Language::Ru).contains("триллион"));
    }

    #[test]
    fn test_decimal_zero_runs() {
        assert_eq!(
            expand_numbers("версия 3.0", Language::Ru),
            "версия три точка ноль"
        );
        assert_eq!(
            expand_numbers("v2.00 released", Language::En),
            "vtwo point zero zero released"
        );
        // Больше шести нулей — замкнутая форма
        assert_eq!(
            expand_numbers("1.0000000", Language::Ru),
            "один точка семь нулей"
        );
        assert_eq!(
            expand_numbers("1.0000000", Language::En),
            "one point seven zeros"
        );
    }

    #[test]
    fn test_expand_numbers_in_text() {
        assert_eq!(
            expand_numbers("Глава 12 из 347", Language::Ru),
            "Глава двенадцать из триста сорок семь"
        );
    }
}

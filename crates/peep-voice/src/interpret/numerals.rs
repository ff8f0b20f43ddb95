//! Korean numeral parsing.
//!
//! Recognizers transcribe small counts inconsistently: as digits ("2"), as
//! native Korean words ("두", "다섯") or as Sino-Korean syllables ("이", "십이").
//! Everything here normalizes those to `u32`.

/// Native Korean numbers, longest spelling first so prefix matching is greedy.
/// Includes the misspellings recognizers commonly produce.
const NATIVE: &[(&str, u32)] = &[
    ("스물네", 24),
    ("스물세", 23),
    ("스물두", 22),
    ("스물한", 21),
    ("열아홉", 19),
    ("열여덟", 18),
    ("열일곱", 17),
    ("열여섯", 16),
    ("열다섯", 15),
    ("열하나", 11),
    ("스물", 20),
    ("열네", 14),
    ("열세", 13),
    ("열두", 12),
    ("열둘", 12),
    ("열한", 11),
    ("아홉", 9),
    ("여덟", 8),
    ("여덜", 8),
    ("일곱", 7),
    ("여섯", 6),
    ("여서", 6),
    ("녀서", 6),
    ("다섯", 5),
    ("다서", 5),
    ("하나", 1),
    ("열", 10),
    ("넷", 4),
    ("네", 4),
    ("내", 4),
    ("셋", 3),
    ("세", 3),
    ("둘", 2),
    ("두", 2),
    ("한", 1),
];

/// Suffixes accepted after a pill count ("두 알", "세개요", "2정씩").
const COUNTERS: &[&str] = &["캡슐", "알", "개", "계", "게", "활", "정", "씩"];

fn sino_digit(c: char) -> Option<u32> {
    match c {
        '영' | '공' => Some(0),
        '일' => Some(1),
        '이' => Some(2),
        '삼' => Some(3),
        '사' => Some(4),
        '오' => Some(5),
        '육' => Some(6),
        '칠' => Some(7),
        '팔' => Some(8),
        '구' => Some(9),
        _ => None,
    }
}

pub(crate) fn is_sino_char(c: char) -> bool {
    c == '십' || sino_digit(c).is_some()
}

/// Parse a Sino-Korean number below 100 ("삼" = 3, "십이" = 12, "이십삼" = 23).
pub fn sino_korean(word: &str) -> Option<u32> {
    if word.is_empty() {
        return None;
    }
    let mut total = 0;
    let mut digit: Option<u32> = None;
    let mut seen_ten = false;
    for c in word.chars() {
        if c == '십' {
            if seen_ten {
                return None;
            }
            seen_ten = true;
            total += digit.take().unwrap_or(1) * 10;
        } else {
            let d = sino_digit(c)?;
            if digit.is_some() {
                return None;
            }
            digit = Some(d);
        }
    }
    Some(total + digit.unwrap_or(0))
}

/// Look up a native Korean number word ("다섯" = 5, "열두" = 12).
pub fn native_korean(word: &str) -> Option<u32> {
    NATIVE.iter().find(|(w, _)| *w == word).map(|(_, n)| *n)
}

/// Parse a number written as digits, a native Korean word or Sino-Korean syllables.
pub fn korean_number(word: &str) -> Option<u32> {
    let word = word.trim();
    if !word.is_empty() && word.chars().all(|c| c.is_ascii_digit()) {
        return word.parse().ok();
    }
    native_korean(word).or_else(|| sino_korean(word))
}

/// Native modifiers that double as everyday words (네 "yes", 내 "my", 세요).
/// On their own they only count when a counter follows.
const NEEDS_COUNTER: &[&str] = &["한", "두", "세", "네", "내"];

fn starts_with_counter(text: &str) -> bool {
    COUNTERS.iter().any(|c| text.starts_with(c))
}

fn is_count_suffix(rest: &str) -> bool {
    rest.is_empty() || starts_with_counter(rest)
}

/// Read a leading count from one token, requiring the rest to be a counter.
fn leading_count(token: &str) -> Option<u32> {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        let rest = &token[digits.len()..];
        return if is_count_suffix(rest) {
            digits.parse().ok()
        } else {
            None
        };
    }

    for (word, n) in NATIVE {
        if let Some(rest) = token.strip_prefix(word) {
            if is_count_suffix(rest) {
                return Some(*n);
            }
        }
    }

    let sino_len: usize = token
        .chars()
        .take_while(|c| is_sino_char(*c))
        .map(char::len_utf8)
        .sum();
    if sino_len > 0 && is_count_suffix(&token[sino_len..]) {
        return sino_korean(&token[..sino_len]);
    }
    None
}

/// Extract the number of pills per intake from an utterance.
///
/// Returns the first positive count found, e.g. "두 알이요" → 2, "1회 3정" → 3.
/// Tokens followed by a frequency or time unit ("1회", "한번에") are skipped.
/// A bare 한/두/세/네 needs a counter in the next token ("네, 두 알이요" → 2).
pub fn parse_dosage(utterance: &str) -> Option<u32> {
    let tokens: Vec<String> = utterance
        .split_whitespace()
        .map(|t| {
            t.chars()
                .filter(|c| c.is_ascii_digit() || ('가'..='힣').contains(c))
                .collect::<String>()
        })
        .filter(|t| !t.is_empty())
        .collect();

    tokens.iter().enumerate().find_map(|(i, token)| {
        if NEEDS_COUNTER.contains(&token.as_str()) {
            let counted = tokens.get(i + 1).is_some_and(|next| starts_with_counter(next));
            if !counted {
                return None;
            }
        }
        leading_count(token).filter(|n| *n > 0)
    })
}

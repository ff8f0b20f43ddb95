//! Utterance interpretation.
//!
//! Turns recognizer text into step answers: keyword classification for the
//! menu-like steps, Korean numeral and day/time scanning for the data steps,
//! and echo detection for our own prompts picked up by the microphone.

pub mod days;
pub mod numerals;
pub mod time_parser;

pub use days::parse_days;
pub use numerals::parse_dosage;
pub use time_parser::parse_times;

/// Minimum length of a prompt fragment treated as an echo.
const ECHO_FRAGMENT_MIN_CHARS: usize = 8;

const CANCEL: &str = "취소";
const VOICE: &[&str] = &["음성", "1"];
const TEXT: &[&str] = &["텍스트", "2"];
const ADD_TIME: &[&str] = &["추가"];
const NO_MORE_TIMES: &[&str] = &["다음", "아니", "없"];
const REJECT: &[&str] = &["아니", "노"];
const ACCEPT: &[&str] = &["저장", "자장", "저자", "예", "네", "맞아요"];
const NONE: &str = "없";

/// Answer to the input-method question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMethodChoice {
    Voice,
    Text,
    Cancel,
}

/// Answer to "add another time?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoreTimes {
    Add,
    Done,
}

/// Answer to the save confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Save,
    Reject,
}

/// Trim and lower-case an utterance for keyword matching.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Keep only letters and digits, lower-cased.
pub fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Whether an utterance is our own speech picked up by the recognizer.
///
/// Matches the configured markers, the whole last prompt, or a fragment of
/// the last prompt at least [`ECHO_FRAGMENT_MIN_CHARS`] long. Comparison
/// ignores whitespace and punctuation.
pub fn is_echo(utterance: &str, last_prompt: Option<&str>, markers: &[String]) -> bool {
    let heard = compact(utterance);
    if heard.is_empty() {
        return false;
    }

    if markers
        .iter()
        .map(|m| compact(m))
        .any(|m| !m.is_empty() && heard.contains(&m))
    {
        return true;
    }

    match last_prompt.map(compact) {
        Some(prompt) if !prompt.is_empty() => {
            heard.contains(&prompt)
                || (heard.chars().count() >= ECHO_FRAGMENT_MIN_CHARS && prompt.contains(&heard))
        }
        _ => false,
    }
}

/// Whether the user asked to cancel.
///
/// Free-text answers (drug name, notes) only cancel on an exact "취소" so a
/// note that merely mentions the word is kept.
pub fn is_cancel(text: &str, free_text: bool) -> bool {
    let text = normalize(text);
    if free_text {
        text == CANCEL
    } else {
        text.contains(CANCEL)
    }
}

pub fn input_method(text: &str) -> Option<InputMethodChoice> {
    let text = normalize(text);
    if contains_any(&text, VOICE) {
        Some(InputMethodChoice::Voice)
    } else if contains_any(&text, TEXT) {
        Some(InputMethodChoice::Text)
    } else if text.contains(CANCEL) {
        Some(InputMethodChoice::Cancel)
    } else {
        None
    }
}

pub fn additional_time(text: &str) -> Option<MoreTimes> {
    let text = normalize(text);
    if contains_any(&text, ADD_TIME) {
        Some(MoreTimes::Add)
    } else if contains_any(&text, NO_MORE_TIMES) {
        Some(MoreTimes::Done)
    } else {
        None
    }
}

/// Negative answers are checked first ("아니오, 저장하지 마세요").
pub fn confirmation(text: &str) -> Option<Confirmation> {
    let text = normalize(text);
    if contains_any(&text, REJECT) {
        Some(Confirmation::Reject)
    } else if contains_any(&text, ACCEPT) {
        Some(Confirmation::Save)
    } else {
        None
    }
}

/// "없어요" and friends: nothing to add.
pub fn is_none_answer(text: &str) -> bool {
    normalize(text).contains(NONE)
}

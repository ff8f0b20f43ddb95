//! Spoken dose-time extraction.
//!
//! Scans an utterance for every `[period] <hour>시 [반 | <minute>분]` phrase
//! ("저녁 7시", "오후 세시 반", "23시", "여덟시 십오분") and for bare meal words
//! (아침, 점심, 저녁). All matches are returned in the order spoken.

use std::sync::OnceLock;

use regex::Regex;

use peep_core::types::DoseTime;

use super::numerals::korean_number;

/// Default times for meal words spoken without an hour.
const MEAL_TIMES: &[(&str, u32, u32)] = &[("아침", 8, 0), ("점심", 12, 0), ("저녁", 19, 0)];

fn clock_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?:(아침|점심|저녁|오전|오후|밤|새벽)\s*)?",
            r"(\d{1,2}|스물네|스물세|스물두|스물한|스물|열아홉|열여덟|열일곱|열여섯|열다섯|열네|열세|열두|열한|열",
            r"|아홉|여덟|일곱|여섯|다섯|네|세|두|한|[일이삼사오육칠팔구십]+)\s*시",
            r"(?:\s*(?:(반)|(\d{1,2})\s*분|([일이삼사오육칠팔구십]+)\s*분))?",
        ))
        .expect("Invalid clock regex")
    })
}

fn meal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"아침|점심|저녁").expect("Invalid meal regex"))
}

/// Shift an hour into 24-hour time according to the spoken period.
fn apply_period(hour: u32, period: Option<&str>) -> u32 {
    match period {
        Some("오후" | "저녁" | "밤") if hour < 12 => hour + 12,
        Some("점심") if hour < 6 => hour + 12,
        Some("오전" | "아침" | "새벽") if hour == 12 => 0,
        _ => hour,
    }
}

/// Extract all dose times mentioned in an utterance, without duplicates.
pub fn parse_times(utterance: &str) -> Vec<DoseTime> {
    let text = utterance.to_lowercase();
    let mut found: Vec<(usize, DoseTime)> = Vec::new();
    let mut covered: Vec<(usize, usize)> = Vec::new();

    for caps in clock_regex().captures_iter(&text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        covered.push((whole.start(), whole.end()));

        let Some(hour) = caps.get(2).and_then(|m| korean_number(m.as_str())) else {
            continue;
        };
        let minute = if caps.get(3).is_some() {
            Some(30)
        } else if let Some(m) = caps.get(4).or_else(|| caps.get(5)) {
            korean_number(m.as_str())
        } else {
            Some(0)
        };
        let Some(minute) = minute else {
            continue;
        };

        let hour = apply_period(hour, caps.get(1).map(|m| m.as_str()));
        let hour = if hour == 24 { 0 } else { hour };
        match DoseTime::new(hour, minute) {
            Some(time) => found.push((whole.start(), time)),
            None => tracing::debug!(hour, minute, "Ignoring out-of-range time"),
        }
    }

    for m in meal_regex().find_iter(&text) {
        let inside_clock = covered
            .iter()
            .any(|(start, end)| m.start() >= *start && m.end() <= *end);
        if inside_clock {
            continue;
        }
        if let Some((_, h, min)) = MEAL_TIMES.iter().find(|(w, _, _)| *w == m.as_str()) {
            if let Some(time) = DoseTime::new(*h, *min) {
                found.push((m.start(), time));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    let mut times: Vec<DoseTime> = Vec::with_capacity(found.len());
    for (_, time) in found {
        if !times.contains(&time) {
            times.push(time);
        }
    }
    times
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> DoseTime {
        DoseTime::new(h, m).unwrap()
    }

    #[test]
    fn test_digit_hours() {
        assert_eq!(parse_times("23시"), vec![t(23, 0)]);
        assert_eq!(parse_times("8시 30분에 먹어요"), vec![t(8, 30)]);
    }

    #[test]
    fn test_period_shifts() {
        assert_eq!(parse_times("저녁 7시"), vec![t(19, 0)]);
        assert_eq!(parse_times("오후 1시"), vec![t(13, 0)]);
        assert_eq!(parse_times("오전 12시"), vec![t(0, 0)]);
        assert_eq!(parse_times("밤 11시"), vec![t(23, 0)]);
        assert_eq!(parse_times("점심 1시"), vec![t(13, 0)]);
        assert_eq!(parse_times("오후 12시"), vec![t(12, 0)]);
    }

    #[test]
    fn test_korean_numerals() {
        assert_eq!(parse_times("오후 세시 반"), vec![t(15, 30)]);
        assert_eq!(parse_times("여덟시 십오분"), vec![t(8, 15)]);
        assert_eq!(parse_times("열두시"), vec![t(12, 0)]);
        assert_eq!(parse_times("이십일시"), vec![t(21, 0)]);
    }

    #[test]
    fn test_multiple_times_in_one_utterance() {
        assert_eq!(
            parse_times("아침 8시, 저녁 7시"),
            vec![t(8, 0), t(19, 0)]
        );
        assert_eq!(
            parse_times("9시 그리고 21시"),
            vec![t(9, 0), t(21, 0)]
        );
    }

    #[test]
    fn test_meal_words_alone() {
        assert_eq!(parse_times("아침 저녁"), vec![t(8, 0), t(19, 0)]);
        assert_eq!(parse_times("점심에요"), vec![t(12, 0)]);
    }

    #[test]
    fn test_meal_word_consumed_as_period() {
        // "저녁" belongs to the clock phrase, not a separate 19:00 entry
        assert_eq!(parse_times("저녁 9시"), vec![t(21, 0)]);
    }

    #[test]
    fn test_duplicates_removed() {
        assert_eq!(parse_times("7시 7시"), vec![t(7, 0)]);
        assert_eq!(parse_times("저녁 7시 저녁"), vec![t(19, 0)]);
    }

    #[test]
    fn test_midnight_and_out_of_range() {
        assert_eq!(parse_times("24시"), vec![t(0, 0)]);
        assert!(parse_times("30시").is_empty());
        assert!(parse_times("7시 75분").is_empty());
    }

    #[test]
    fn test_no_time() {
        assert!(parse_times("잘 모르겠어요").is_empty());
        assert!(parse_times("").is_empty());
    }
}

//! Day-of-week extraction.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use peep_core::types::DayOfWeek;

/// Phrases meaning "every day".
const EVERY_DAY: &[&str] = &["일주일", "매일"];

fn day_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([일월화수목금토])요일").expect("Invalid day regex"))
}

/// Collect every day of the week mentioned in an utterance.
///
/// Accepts full names anywhere in the sentence ("월요일 수요일 금요일에 먹어요"),
/// runs of day syllables with or without a closing 요일 ("월수금", "월수금요일에")
/// and the every-day phrases. An empty set
/// means nothing was recognized.
pub fn parse_days(utterance: &str) -> BTreeSet<DayOfWeek> {
    let text = utterance.to_lowercase();
    if EVERY_DAY.iter().any(|p| text.contains(p)) {
        return DayOfWeek::ALL.into_iter().collect();
    }

    let mut days: BTreeSet<DayOfWeek> = day_name_regex()
        .captures_iter(&text)
        .filter_map(|caps| caps[1].chars().next())
        .filter_map(DayOfWeek::from_label)
        .collect();

    for token in text.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim_end_matches('에');
        // "월수금요일": the run before a single trailing 요일.
        let token = token.strip_suffix("요일").unwrap_or(token);
        if token.is_empty() || token.contains("요일") {
            continue;
        }
        let labels: Option<Vec<DayOfWeek>> = token.chars().map(DayOfWeek::from_label).collect();
        if let Some(labels) = labels {
            days.extend(labels);
        }
    }

    days
}

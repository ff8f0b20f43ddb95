//! Weekly dose notification planning.
//!
//! Every (day, time) pair of a reminder becomes one weekly-repeating local
//! notification. Ids are derived from the drug name, day and time so the same
//! pair always maps to the same notification, which is what lets an edited
//! reminder cancel its old notifications.

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::Serialize;

use peep_core::config::ScheduleConfig;
use peep_core::types::{DayOfWeek, DoseTime, ReminderRecord};

/// Upper bound (exclusive) for notification ids.
const ID_MODULUS: u32 = 1_000_000;

/// How a notification repeats after its first firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    Weekly,
}

/// A local notification ready to hand to the platform scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedNotification {
    pub id: u32,
    pub channel_id: String,
    pub title: String,
    pub message: String,
    /// First firing, local time.
    pub fire_at: NaiveDateTime,
    pub repeat: Repeat,
    /// "오늘" when the first firing is today, otherwise "다음 <day>".
    pub label: String,
    pub drug_name: String,
    pub dosage: u32,
    pub day: DayOfWeek,
    pub time: DoseTime,
}

/// 32-bit string hash over UTF-16 code units (`h = 31 * h + unit`, wrapping).
fn string_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Stable notification id for one dose slot, in `0..1_000_000`.
pub fn notification_id(name: &str, day: DayOfWeek, time: DoseTime) -> u32 {
    let key = format!("{}-{}-{}", name, day, time);
    string_hash(&key).unsigned_abs() % ID_MODULUS
}

/// First moment at or after `now` when `day` at `time` comes around.
///
/// A slot later today fires today; a slot earlier today (or exactly now)
/// fires a week from today.
pub fn next_occurrence(now: NaiveDateTime, day: DayOfWeek, time: DoseTime) -> NaiveDateTime {
    let today = DayOfWeek::from_chrono(now.weekday());
    let Some(slot_today) = now.date().and_hms_opt(time.hour(), time.minute(), 0) else {
        return now;
    };

    if day == today {
        if slot_today > now {
            slot_today
        } else {
            slot_today + Duration::days(7)
        }
    } else {
        let ahead = (day.index() + 7 - today.index()) % 7;
        slot_today + Duration::days(i64::from(ahead))
    }
}

/// Plan one weekly notification per (day, time) of `record`.
pub fn plan_notifications(
    record: &ReminderRecord,
    now: NaiveDateTime,
    config: &ScheduleConfig,
) -> Vec<PlannedNotification> {
    let mut planned = Vec::with_capacity(record.times.len() * record.days.len());
    for time in &record.times {
        for day in &record.days {
            let fire_at = next_occurrence(now, *day, *time);
            let label = if fire_at.date() == now.date() {
                "오늘".to_string()
            } else {
                format!("다음 {}", day)
            };
            let id = notification_id(&record.name, *day, *time);
            tracing::debug!(id, name = %record.name, %fire_at, label = %label, "Planned notification");
            planned.push(PlannedNotification {
                id,
                channel_id: config.channel_id.clone(),
                title: config.title.clone(),
                message: format!("{} 복용 시간입니다!", record.name),
                fire_at,
                repeat: Repeat::Weekly,
                label,
                drug_name: record.name.clone(),
                dosage: record.dosage,
                day: *day,
                time: *time,
            });
        }
    }
    planned
}

/// Ids of every notification planned for `record`, for cancelling on edit.
pub fn cancelled_ids(record: &ReminderRecord) -> Vec<u32> {
    record
        .times
        .iter()
        .flat_map(|time| {
            record
                .days
                .iter()
                .map(move |day| notification_id(&record.name, *day, *time))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    fn t(h: u32, m: u32) -> DoseTime {
        DoseTime::new(h, m).unwrap()
    }

    fn record() -> ReminderRecord {
        ReminderRecord {
            name: "타이레놀".to_string(),
            dosage: 2,
            days: [DayOfWeek::Mon, DayOfWeek::Wed].into_iter().collect(),
            times: vec![t(8, 0), t(19, 0)],
            notes: String::new(),
        }
    }

    #[test]
    fn test_string_hash_matches_reference_values() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("hello"), 99162322);
        // Wraps past i32::MAX
        assert_eq!(string_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_notification_id_is_stable_and_bounded() {
        let a = notification_id("타이레놀", DayOfWeek::Mon, t(8, 0));
        let b = notification_id("타이레놀", DayOfWeek::Mon, t(8, 0));
        assert_eq!(a, b);
        assert!(a < ID_MODULUS);
        assert_ne!(a, notification_id("타이레놀", DayOfWeek::Tue, t(8, 0)));
        assert!(notification_id("polygenelubricants", DayOfWeek::Sun, t(0, 0)) < ID_MODULUS);
    }

    #[test]
    fn test_next_occurrence_later_today() {
        // 2024-06-03 is a Monday
        let now = at(2024, 6, 3, 7, 30);
        assert_eq!(next_occurrence(now, DayOfWeek::Mon, t(8, 0)), at(2024, 6, 3, 8, 0));
    }

    #[test]
    fn test_next_occurrence_passed_today_rolls_a_week() {
        let now = at(2024, 6, 3, 9, 0);
        assert_eq!(next_occurrence(now, DayOfWeek::Mon, t(8, 0)), at(2024, 6, 10, 8, 0));
        // Exactly now also rolls over
        let now = at(2024, 6, 3, 8, 0);
        assert_eq!(next_occurrence(now, DayOfWeek::Mon, t(8, 0)), at(2024, 6, 10, 8, 0));
    }

    #[test]
    fn test_next_occurrence_other_weekday() {
        let now = at(2024, 6, 3, 9, 0);
        assert_eq!(next_occurrence(now, DayOfWeek::Wed, t(8, 0)), at(2024, 6, 5, 8, 0));
        // Sunday wraps forward to the coming Sunday
        assert_eq!(next_occurrence(now, DayOfWeek::Sun, t(21, 0)), at(2024, 6, 9, 21, 0));
    }

    #[test]
    fn test_plan_notifications() {
        let now = at(2024, 6, 3, 7, 30);
        let planned = plan_notifications(&record(), now, &ScheduleConfig::default());
        assert_eq!(planned.len(), 4);

        let first = &planned[0];
        assert_eq!(first.day, DayOfWeek::Mon);
        assert_eq!(first.time, t(8, 0));
        assert_eq!(first.label, "오늘");
        assert_eq!(first.title, "삐약삐약");
        assert_eq!(first.channel_id, "schedule-channel");
        assert_eq!(first.message, "타이레놀 복용 시간입니다!");
        assert_eq!(first.repeat, Repeat::Weekly);

        let wed = &planned[1];
        assert_eq!(wed.day, DayOfWeek::Wed);
        assert_eq!(wed.label, "다음 수");
        assert_eq!(wed.fire_at, at(2024, 6, 5, 8, 0));
    }

    #[test]
    fn test_cancelled_ids_match_plan() {
        let now = at(2024, 6, 3, 7, 30);
        let rec = record();
        let planned: Vec<u32> = plan_notifications(&rec, now, &ScheduleConfig::default())
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(cancelled_ids(&rec), planned);
    }
}

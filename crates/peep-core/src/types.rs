use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PeepError;

// =============================================================================
// Days
// =============================================================================

/// Day of the week a dose is taken, ordered Sunday first.
///
/// Serialized with its single-syllable Korean label so stored lists read the
/// same way they are spoken ("월", "수", "금").
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    #[serde(rename = "일")]
    Sun,
    #[serde(rename = "월")]
    Mon,
    #[serde(rename = "화")]
    Tue,
    #[serde(rename = "수")]
    Wed,
    #[serde(rename = "목")]
    Thu,
    #[serde(rename = "금")]
    Fri,
    #[serde(rename = "토")]
    Sat,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sun,
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
    ];

    /// Korean single-syllable label.
    pub fn label(&self) -> char {
        match self {
            DayOfWeek::Sun => '일',
            DayOfWeek::Mon => '월',
            DayOfWeek::Tue => '화',
            DayOfWeek::Wed => '수',
            DayOfWeek::Thu => '목',
            DayOfWeek::Fri => '금',
            DayOfWeek::Sat => '토',
        }
    }

    pub fn from_label(label: char) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.label() == label)
    }

    /// Days since Sunday (0..=6).
    pub fn index(&self) -> u32 {
        *self as u32
    }

    pub fn from_chrono(weekday: chrono::Weekday) -> Self {
        Self::ALL[weekday.num_days_from_sunday() as usize]
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// =============================================================================
// Dose time
// =============================================================================

/// Wall-clock time of a dose, stored and displayed as `HH:MM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DoseTime {
    hour: u8,
    minute: u8,
}

impl DoseTime {
    /// Build a dose time, rejecting hours above 23 and minutes above 59.
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self {
                hour: hour as u8,
                minute: minute as u8,
            })
        } else {
            None
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour as u32
    }

    pub fn minute(&self) -> u32 {
        self.minute as u32
    }
}

impl fmt::Display for DoseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for DoseTime {
    type Err = PeepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeepError::Schedule(format!("Invalid dose time: {}", s));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        DoseTime::new(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for DoseTime {
    type Error = PeepError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DoseTime> for String {
    fn from(value: DoseTime) -> Self {
        value.to_string()
    }
}

// =============================================================================
// Reminder record
// =============================================================================

/// A medication reminder as handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRecord {
    /// Drug name as the user said or typed it.
    pub name: String,
    /// Pills per intake.
    pub dosage: u32,
    /// Days of the week, Sunday first.
    pub days: BTreeSet<DayOfWeek>,
    /// Dose times in the order they were given.
    pub times: Vec<DoseTime>,
    /// Free-text notes (allergies, cautions, cycle).
    #[serde(default)]
    pub notes: String,
}

impl ReminderRecord {
    /// Human-readable dosage, e.g. `1회 2알`.
    pub fn dosage_label(&self) -> String {
        format!("1회 {}알", self.dosage)
    }

    /// Days joined for read-back, e.g. `월, 수, 금`.
    pub fn days_label(&self) -> String {
        self.days
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Times joined for read-back, e.g. `08:00, 19:00`.
    pub fn times_label(&self) -> String {
        self.times
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

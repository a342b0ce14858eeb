use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Guardian,
    Child,
}

text_enum!(MemberRole, "member role", { Guardian => "guardian", Child => "child" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Daily,
    Weekdays,
    Date,
}

text_enum!(ScheduleType, "schedule type", {
    Daily => "daily",
    Weekdays => "weekdays",
    Date => "date",
});

/// Lifecycle of one occurrence. `Completed` and `Missed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Pending,
    Completed,
    Missed,
}

text_enum!(LogStatus, "log status", {
    Pending => "pending",
    Completed => "completed",
    Missed => "missed",
});

impl LogStatus {
    /// Completed and missed logs never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LogStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("weekday index out of range (0..=6): {0}")]
pub struct InvalidWeekday(pub i64);

/// Set of weekday indices where 0 is Sunday and 6 is Saturday.
///
/// Serialized as a sorted array of indices, stored as `"1,2,3"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const WORKWEEK: WeekdaySet = WeekdaySet(0b0011_1110);

    pub fn from_indices<I>(indices: I) -> Result<Self, InvalidWeekday>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut bits = 0u8;
        for idx in indices {
            if !(0..=6).contains(&idx) {
                return Err(InvalidWeekday(idx));
            }
            bits |= 1 << idx;
        }
        Ok(WeekdaySet(bits))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.contains(date.weekday())
    }

    pub fn indices(&self) -> Vec<i64> {
        (0..7).filter(|i| self.0 & (1 << i) != 0).collect()
    }

    pub fn to_db_string(&self) -> String {
        self.indices()
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn parse_db(text: &str) -> Result<Self, InvalidWeekday> {
        let mut indices = Vec::new();
        for part in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let idx = part.parse::<i64>().map_err(|_| InvalidWeekday(-1))?;
            indices.push(idx);
        }
        Self::from_indices(indices)
    }
}

impl TryFrom<Vec<i64>> for WeekdaySet {
    type Error = InvalidWeekday;
    fn try_from(value: Vec<i64>) -> Result<Self, Self::Error> {
        WeekdaySet::from_indices(value)
    }
}

impl From<WeekdaySet> for Vec<i64> {
    fn from(value: WeekdaySet) -> Self {
        value.indices()
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_db_string())
    }
}

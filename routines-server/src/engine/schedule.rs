//! Recurrence rules attached to a task.

use chrono::{Days, NaiveDate, NaiveTime};
use routines_shared::domain::{ScheduleType, WeekdaySet};

use super::EngineError;

pub const DEFAULT_DURATION_MINUTES: i32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleRule {
    Daily,
    Weekdays(WeekdaySet),
    Date(NaiveDate),
}

/// A validated schedule: exactly one recurrence field is populated, chosen by
/// the schedule type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDef {
    pub rule: ScheduleRule,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
}

impl ScheduleDef {
    pub fn from_parts(
        schedule_type: ScheduleType,
        weekdays: Option<WeekdaySet>,
        scheduled_date: Option<NaiveDate>,
        scheduled_time: NaiveTime,
        duration_minutes: i32,
    ) -> Result<Self, EngineError> {
        if duration_minutes <= 0 {
            return Err(EngineError::validation(format!(
                "duration_minutes must be positive, got {duration_minutes}"
            )));
        }
        let rule = match (schedule_type, weekdays, scheduled_date) {
            (ScheduleType::Daily, None, None) => ScheduleRule::Daily,
            (ScheduleType::Weekdays, Some(set), None) => {
                if set.is_empty() {
                    return Err(EngineError::validation(
                        "weekdays schedule needs at least one weekday",
                    ));
                }
                ScheduleRule::Weekdays(set)
            }
            (ScheduleType::Date, None, Some(date)) => ScheduleRule::Date(date),
            (ty, w, d) => {
                return Err(EngineError::validation(format!(
                    "schedule_type {ty} does not match fields (weekdays: {}, scheduled_date: {})",
                    if w.is_some() { "set" } else { "null" },
                    if d.is_some() { "set" } else { "null" },
                )));
            }
        };
        Ok(ScheduleDef {
            rule,
            scheduled_time,
            duration_minutes,
        })
    }

    /// Weekday indices arrive from clients and the database as plain integers.
    pub fn from_raw(
        schedule_type: ScheduleType,
        weekdays: Option<&[i64]>,
        scheduled_date: Option<NaiveDate>,
        scheduled_time: NaiveTime,
        duration_minutes: i32,
    ) -> Result<Self, EngineError> {
        let set = weekdays
            .map(|w| WeekdaySet::from_indices(w.iter().copied()))
            .transpose()
            .map_err(|e| EngineError::validation(e.to_string()))?;
        Self::from_parts(
            schedule_type,
            set,
            scheduled_date,
            scheduled_time,
            duration_minutes,
        )
    }

    pub fn schedule_type(&self) -> ScheduleType {
        match self.rule {
            ScheduleRule::Daily => ScheduleType::Daily,
            ScheduleRule::Weekdays(_) => ScheduleType::Weekdays,
            ScheduleRule::Date(_) => ScheduleType::Date,
        }
    }

    pub fn weekdays(&self) -> Option<WeekdaySet> {
        match self.rule {
            ScheduleRule::Weekdays(set) => Some(set),
            _ => None,
        }
    }

    pub fn scheduled_date(&self) -> Option<NaiveDate> {
        match self.rule {
            ScheduleRule::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        match self.rule {
            ScheduleRule::Daily => true,
            ScheduleRule::Weekdays(set) => set.contains_date(date),
            ScheduleRule::Date(d) => d == date,
        }
    }

    /// The expected date one recurrence unit before `date`. A one-off date
    /// schedule has no predecessor.
    pub fn previous_occurrence(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self.rule {
            ScheduleRule::Daily => date.checked_sub_days(Days::new(1)),
            ScheduleRule::Weekdays(set) => {
                if set.is_empty() {
                    return None;
                }
                let mut d = date;
                for _ in 0..7 {
                    d = d.checked_sub_days(Days::new(1))?;
                    if set.contains_date(d) {
                        return Some(d);
                    }
                }
                None
            }
            ScheduleRule::Date(_) => None,
        }
    }
}

/// Accepts `HH:MM` (dashboard form) and `HH:MM:SS` (stored form).
pub fn parse_time(text: &str) -> Result<NaiveTime, EngineError> {
    let t = text.trim();
    NaiveTime::parse_from_str(t, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
        .map_err(|_| EngineError::validation(format!("invalid time of day: {text:?}")))
}

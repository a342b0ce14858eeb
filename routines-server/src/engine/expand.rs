use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveTime};
use routines_shared::domain::LogStatus;

use super::EngineError;
use super::schedule::ScheduleDef;

/// Longest window a single expansion request may cover.
pub const MAX_WINDOW_DAYS: i64 = 366;

/// Inclusive date range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if start > end {
            return Err(EngineError::validation(format!(
                "window start {start} is after end {end}"
            )));
        }
        let len = (end - start).num_days() + 1;
        if len > MAX_WINDOW_DAYS {
            return Err(EngineError::validation(format!(
                "window of {len} days exceeds {MAX_WINDOW_DAYS}"
            )));
        }
        Ok(DateWindow { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        DateWindow {
            start: day,
            end: day,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(|d| *d <= self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAssignment {
    pub assignment_id: i32,
    pub member_id: String,
    pub is_active: bool,
}

/// One expected instance of a task for one member on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub assignment_id: i32,
    pub member_id: String,
    pub due_date: NaiveDate,
    pub due_time: NaiveTime,
    pub status: LogStatus,
}

/// Produces the pending occurrences a schedule implies inside `window`, one
/// per `(assignment, date)`, ordered by date then assignment id. Inactive
/// assignments produce nothing.
pub fn expand(
    def: &ScheduleDef,
    assignments: &[ActiveAssignment],
    window: DateWindow,
) -> Vec<Occurrence> {
    let mut active: Vec<&ActiveAssignment> = assignments.iter().filter(|a| a.is_active).collect();
    active.sort_by_key(|a| a.assignment_id);
    active.dedup_by_key(|a| a.assignment_id);
    if active.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    for day in window.days().filter(|d| def.occurs_on(*d)) {
        for a in &active {
            out.push(Occurrence {
                assignment_id: a.assignment_id,
                member_id: a.member_id.clone(),
                due_date: day,
                due_time: def.scheduled_time,
                status: LogStatus::Pending,
            });
        }
    }
    out
}

/// Difference between the assignment rows a task has and the member set a
/// guardian asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentDiff {
    /// Existing rows that stay; `true` when the row must be re-activated.
    pub keep: Vec<(i32, bool)>,
    /// Members without any row yet.
    pub add: Vec<String>,
    /// Active rows whose member is no longer wanted.
    pub retract: Vec<i32>,
}

impl AssignmentDiff {
    /// `current` holds `(assignment_id, member_id, is_active)` rows.
    pub fn compute(current: &[(i32, String, bool)], desired: &[String]) -> Self {
        let wanted: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
        let by_member: HashMap<&str, (i32, bool)> = current
            .iter()
            .map(|(id, member, active)| (member.as_str(), (*id, *active)))
            .collect();

        let mut diff = AssignmentDiff::default();
        for (id, member, active) in current {
            if wanted.contains(member.as_str()) {
                diff.keep.push((*id, !*active));
            } else if *active {
                diff.retract.push(*id);
            }
        }
        for member in wanted {
            if !by_member.contains_key(member) {
                diff.add.push(member.to_string());
            }
        }
        diff.keep.sort_unstable();
        diff.retract.sort_unstable();
        diff
    }

    pub fn is_noop(&self) -> bool {
        self.add.is_empty() && self.retract.is_empty() && self.keep.iter().all(|(_, r)| !r)
    }
}

/// Which already generated pending logs of a schedule survive an edit:
/// returns `(to_retime, to_retract)` log ids.
pub fn reconcile_pending(
    def: &ScheduleDef,
    pending: &[(i32, NaiveDate, NaiveTime)],
) -> (Vec<i32>, Vec<i32>) {
    let mut retime = Vec::new();
    let mut retract = Vec::new();
    for (id, date, time) in pending {
        if !def.occurs_on(*date) {
            retract.push(*id);
        } else if *time != def.scheduled_time {
            retime.push(*id);
        }
    }
    (retime, retract)
}

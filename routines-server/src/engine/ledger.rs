use chrono::NaiveDate;
use routines_shared::domain::LogStatus;

/// Per member and task streak aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakState {
    pub current: i32,
    pub longest: i32,
    pub last_completed_date: Option<NaiveDate>,
}

impl StreakState {
    /// Applies a completion of the occurrence due on `due_date`.
    ///
    /// `previous_expected` is the date one recurrence unit earlier. The
    /// streak continues only when the last completion landed exactly there.
    /// Completing an occurrence that is not newer than the last completed
    /// one leaves the streak as it is.
    pub fn completed(self, due_date: NaiveDate, previous_expected: Option<NaiveDate>) -> Self {
        if let Some(last) = self.last_completed_date
            && due_date <= last
        {
            return self;
        }
        let current = match (self.last_completed_date, previous_expected) {
            (Some(last), Some(prev)) if last == prev => self.current + 1,
            _ => 1,
        };
        StreakState {
            current,
            longest: self.longest.max(current),
            last_completed_date: Some(due_date),
        }
    }

    /// Applies a miss of the occurrence due on `due_date`. A miss older than
    /// the last completion does not break the run that followed it.
    pub fn missed(self, due_date: NaiveDate) -> Self {
        if let Some(last) = self.last_completed_date
            && due_date < last
        {
            return self;
        }
        StreakState {
            current: 0,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Complete,
    Miss,
}

impl Transition {
    pub fn target(&self) -> LogStatus {
        match self {
            Transition::Complete => LogStatus::Completed,
            Transition::Miss => LogStatus::Missed,
        }
    }

    pub fn apply(&self, streak: StreakState, ctx: &TransitionCtx) -> StreakState {
        match self {
            Transition::Complete => streak.completed(ctx.due_date, ctx.previous_expected),
            Transition::Miss => streak.missed(ctx.due_date),
        }
    }
}

/// Everything the ledger needs to know about the occurrence being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionCtx {
    pub due_date: NaiveDate,
    pub previous_expected: Option<NaiveDate>,
    pub points_value: i32,
}

/// Result of a guarded `pending -> completed|missed` update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied {
        status: LogStatus,
        points_awarded: i32,
        streak: StreakState,
    },
    /// The log had already left `pending`; nothing was changed.
    AlreadyFinal(LogStatus),
}

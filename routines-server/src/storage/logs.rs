//! Task logs: insert-if-absent expansion target and the guarded
//! `pending -> completed | missed` transition.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use routines_shared::domain::LogStatus;
use tracing::{debug, trace};

use super::models::{
    Member, NewPoint, NewStreak, NewTaskLog, Task, TaskAssignment, TaskLog, TaskSchedule,
};
use super::{Store, StorageError, schema};
use crate::engine::expand::{ActiveAssignment, Occurrence};
use crate::engine::ledger::{StreakState, Transition, TransitionCtx, TransitionOutcome};

/// `task_logs` joined to the member and task it belongs to.
macro_rules! log_view_join {
    () => {
        schema::task_logs::table
            .inner_join(
                schema::task_assignments::table
                    .on(schema::task_assignments::id.eq(schema::task_logs::assignment_id)),
            )
            .inner_join(
                schema::members::table
                    .on(schema::members::id.eq(schema::task_assignments::member_id)),
            )
            .inner_join(
                schema::tasks::table.on(schema::tasks::id.eq(schema::task_assignments::task_id)),
            )
    };
}

/// A log with the member and task it refers to.
#[derive(Debug, Clone)]
pub struct LogView {
    pub log: TaskLog,
    pub member: Member,
    pub task: Task,
}

impl From<(TaskLog, Member, Task)> for LogView {
    fn from((log, member, task): (TaskLog, Member, Task)) -> Self {
        LogView { log, member, task }
    }
}

impl LogView {
    pub fn status(&self) -> Result<LogStatus, StorageError> {
        self.log
            .status
            .parse()
            .map_err(|e: routines_shared::domain::ParseEnumError| {
                StorageError::InvalidInput(e.to_string())
            })
    }
}

/// Everything needed to expand one schedule.
#[derive(Debug, Clone)]
pub struct ExpansionContext {
    pub schedule: TaskSchedule,
    pub task: Task,
    pub assignments: Vec<(TaskAssignment, Member)>,
}

impl ExpansionContext {
    /// Assignments only count while both the row and the member are active.
    pub fn active_assignments(&self) -> Vec<ActiveAssignment> {
        self.assignments
            .iter()
            .map(|(a, m)| ActiveAssignment {
                assignment_id: a.id,
                member_id: a.member_id.clone(),
                is_active: a.is_active && m.is_active,
            })
            .collect()
    }

    pub fn member_for(&self, assignment_id: i32) -> Option<&Member> {
        self.assignments
            .iter()
            .find(|(a, _)| a.id == assignment_id)
            .map(|(_, m)| m)
    }
}

impl Store {
    pub async fn expansion_context(
        &self,
        family: &str,
        schedule: &str,
    ) -> Result<Option<ExpansionContext>, StorageError> {
        let fid = family.to_string();
        let sid = schedule.to_string();
        self.with_conn(move |conn| {
            use schema::{members as m, task_assignments as ta, task_schedules as ts, tasks as t};
            let found = ts::table
                .inner_join(t::table.on(t::id.eq(ts::task_id)))
                .filter(t::family_id.eq(&fid))
                .filter(ts::id.eq(&sid))
                .select((TaskSchedule::as_select(), Task::as_select()))
                .first::<(TaskSchedule, Task)>(conn)
                .optional()?;
            let Some((schedule, task)) = found else {
                return Ok(None);
            };
            let assignments = ta::table
                .inner_join(m::table.on(m::id.eq(ta::member_id)))
                .filter(ta::task_id.eq(&task.id))
                .filter(m::family_id.eq(&fid))
                .order(ta::id.asc())
                .select((TaskAssignment::as_select(), Member::as_select()))
                .load::<(TaskAssignment, Member)>(conn)?;
            Ok(Some(ExpansionContext {
                schedule,
                task,
                assignments,
            }))
        })
        .await
    }

    /// Inserts one pending log per occurrence unless a log for the same
    /// `(assignment, due_date)` already exists. Returns only the rows this
    /// call created; existing logs keep their status and time.
    pub async fn insert_logs_if_absent(
        &self,
        schedule: &str,
        occurrences: Vec<Occurrence>,
    ) -> Result<Vec<TaskLog>, StorageError> {
        if occurrences.is_empty() {
            return Ok(Vec::new());
        }
        let sid = schedule.to_string();
        self.with_conn(move |conn| {
            conn.immediate_transaction(|conn| -> Result<Vec<TaskLog>, StorageError> {
                use schema::task_logs as tl;
                let mut created = Vec::new();
                for occ in &occurrences {
                    let row = NewTaskLog {
                        assignment_id: occ.assignment_id,
                        schedule_id: Some(sid.clone()),
                        due_date: occ.due_date,
                        due_time: occ.due_time,
                        status: occ.status.as_str().to_string(),
                    };
                    let inserted = diesel::insert_into(tl::table)
                        .values(&row)
                        .on_conflict((tl::assignment_id, tl::due_date))
                        .do_nothing()
                        .returning(TaskLog::as_returning())
                        .get_result::<TaskLog>(conn)
                        .optional()?;
                    if let Some(log) = inserted {
                        created.push(log);
                    }
                }
                trace!(
                    schedule_id = %sid,
                    requested = occurrences.len(),
                    created = created.len(),
                    "insert_logs_if_absent"
                );
                Ok(created)
            })
        })
        .await
    }

    pub async fn get_log(&self, family: &str, log_id: i32) -> Result<Option<LogView>, StorageError> {
        let fid = family.to_string();
        self.with_conn(move |conn| {
            Ok(log_view_join!()
                .filter(schema::tasks::family_id.eq(&fid))
                .filter(schema::task_logs::id.eq(log_id))
                .select((TaskLog::as_select(), Member::as_select(), Task::as_select()))
                .first::<(TaskLog, Member, Task)>(conn)
                .optional()?
                .map(LogView::from))
        })
        .await
    }

    /// Logs due on `date`, optionally narrowed to one status, ordered by due
    /// time then member name.
    pub async fn list_logs(
        &self,
        family: &str,
        date: NaiveDate,
        status: Option<LogStatus>,
    ) -> Result<Vec<LogView>, StorageError> {
        let fid = family.to_string();
        self.with_conn(move |conn| {
            use schema::{members as m, task_logs as tl, tasks as t};
            let mut query = log_view_join!()
                .filter(t::family_id.eq(&fid))
                .filter(tl::due_date.eq(date))
                .select((TaskLog::as_select(), Member::as_select(), Task::as_select()))
                .order((tl::due_time.asc(), m::name.asc(), tl::id.asc()))
                .into_boxed();
            if let Some(s) = status {
                query = query.filter(tl::status.eq(s.as_str()));
            }
            Ok(query
                .load::<(TaskLog, Member, Task)>(conn)?
                .into_iter()
                .map(LogView::from)
                .collect())
        })
        .await
    }

    /// Ids of pending logs whose due moment is at or before `cutoff`
    /// (family-local wall time).
    pub async fn overdue_pending(
        &self,
        family: &str,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<i32>, StorageError> {
        let fid = family.to_string();
        self.with_conn(move |conn| {
            use schema::{task_logs as tl, tasks as t};
            let day = cutoff.date();
            let time = cutoff.time();
            Ok(log_view_join!()
                .filter(t::family_id.eq(&fid))
                .filter(tl::status.eq(LogStatus::Pending.as_str()))
                .filter(
                    tl::due_date
                        .lt(day)
                        .or(tl::due_date.eq(day).and(tl::due_time.le(time))),
                )
                .order((tl::due_date.asc(), tl::due_time.asc(), tl::id.asc()))
                .select(tl::id)
                .load::<i32>(conn)?)
        })
        .await
    }

    /// Moves a pending log to the transition's target status and applies the
    /// side effects in the same IMMEDIATE transaction: a completion writes
    /// the points row and advances the streak, a miss resets an existing streak.
    ///
    /// The status change is a compare-and-swap on `status = 'pending'`; a log
    /// that already left `pending` yields [`TransitionOutcome::AlreadyFinal`]
    /// and nothing is written.
    pub async fn transition_log(
        &self,
        family: &str,
        log_id: i32,
        transition: Transition,
        at: NaiveDateTime,
        notes: Option<String>,
    ) -> Result<(TransitionOutcome, LogView), StorageError> {
        let fid = family.to_string();
        self.with_conn(move |conn| {
            conn.immediate_transaction(
                |conn| -> Result<(TransitionOutcome, LogView), StorageError> {
                    use schema::{points as p, streaks as st, task_logs as tl, task_schedules as ts};

                    let mut view: LogView = log_view_join!()
                        .filter(schema::tasks::family_id.eq(&fid))
                        .filter(tl::id.eq(log_id))
                        .select((TaskLog::as_select(), Member::as_select(), Task::as_select()))
                        .first::<(TaskLog, Member, Task)>(conn)
                        .optional()?
                        .map(LogView::from)
                        .ok_or_else(|| StorageError::NotFound(format!("log {log_id}")))?;

                    let loaded = view.status()?;
                    if loaded.is_terminal() {
                        debug!(log_id, status = %loaded, "transition skipped, log not pending");
                        return Ok((TransitionOutcome::AlreadyFinal(loaded), view));
                    }

                    let target = transition.target();
                    let guarded =
                        tl::table.filter(tl::id.eq(log_id)).filter(tl::status.eq(LogStatus::Pending.as_str()));
                    let changed = match transition {
                        Transition::Complete => diesel::update(guarded)
                            .set((
                                tl::status.eq(target.as_str()),
                                tl::completed_at.eq(Some(at)),
                                tl::notes.eq(notes.as_deref()),
                            ))
                            .execute(conn)?,
                        Transition::Miss => diesel::update(guarded)
                            .set(tl::status.eq(target.as_str()))
                            .execute(conn)?,
                    };
                    if changed == 0 {
                        let current = view.status()?;
                        debug!(log_id, status = %current, "transition skipped, log not pending");
                        return Ok((TransitionOutcome::AlreadyFinal(current), view));
                    }

                    let schedule = match view.log.schedule_id.as_deref() {
                        Some(sid) => ts::table
                            .filter(ts::id.eq(sid))
                            .first::<TaskSchedule>(conn)
                            .optional()?,
                        None => None,
                    };
                    let previous_expected = match schedule {
                        Some(s) => s.to_def()?.previous_occurrence(view.log.due_date),
                        None => None,
                    };
                    let ctx = TransitionCtx {
                        due_date: view.log.due_date,
                        previous_expected,
                        points_value: view.task.points_value,
                    };

                    let stored = st::table
                        .filter(st::member_id.eq(&view.member.id))
                        .filter(st::task_id.eq(&view.task.id))
                        .select((st::current_streak, st::longest_streak, st::last_completed_date))
                        .first::<(i32, i32, Option<NaiveDate>)>(conn)
                        .optional()?;
                    let had_row = stored.is_some();
                    let before = stored
                        .map(|(current, longest, last_completed_date)| StreakState {
                            current,
                            longest,
                            last_completed_date,
                        })
                        .unwrap_or_default();
                    let after = transition.apply(before, &ctx);
                    // A miss never creates the streak row; only completions do.
                    if transition == Transition::Complete || had_row {
                        diesel::insert_into(st::table)
                            .values(&NewStreak {
                                member_id: &view.member.id,
                                task_id: &view.task.id,
                                current_streak: after.current,
                                longest_streak: after.longest,
                                last_completed_date: after.last_completed_date,
                            })
                            .on_conflict((st::member_id, st::task_id))
                            .do_update()
                            .set((
                                st::current_streak.eq(after.current),
                                st::longest_streak.eq(after.longest),
                                st::last_completed_date.eq(after.last_completed_date),
                            ))
                            .execute(conn)?;
                    }

                    let points_awarded = match transition {
                        Transition::Complete => {
                            diesel::insert_into(p::table)
                                .values(&NewPoint {
                                    member_id: &view.member.id,
                                    task_log_id: log_id,
                                    points_awarded: ctx.points_value,
                                })
                                .execute(conn)?;
                            ctx.points_value
                        }
                        Transition::Miss => 0,
                    };

                    view.log.status = target.as_str().to_string();
                    if transition == Transition::Complete {
                        view.log.completed_at = Some(at);
                        view.log.notes = notes;
                    }
                    Ok((
                        TransitionOutcome::Applied {
                            status: target,
                            points_awarded,
                            streak: after,
                        },
                        view,
                    ))
                },
            )
        })
        .await
    }
}

//! Schedules and the task assignments they are expanded for.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use routines_shared::domain::{LogStatus, ScheduleType, WeekdaySet};
use tracing::debug;

use super::models::{
    NewTaskAssignment, NewTaskSchedule, ScheduleChanges, Task, TaskSchedule,
};
use super::{Store, StorageError, schema};
use crate::engine::expand::{AssignmentDiff, reconcile_pending};
use crate::engine::schedule::ScheduleDef;

impl TaskSchedule {
    /// Rebuilds the validated definition from a stored row.
    pub fn to_def(&self) -> Result<ScheduleDef, StorageError> {
        let ty = self
            .schedule_type
            .parse::<ScheduleType>()
            .map_err(|e| StorageError::InvalidInput(e.to_string()))?;
        let weekdays = self
            .weekdays
            .as_deref()
            .map(WeekdaySet::parse_db)
            .transpose()
            .map_err(|e| StorageError::InvalidInput(e.to_string()))?;
        ScheduleDef::from_parts(
            ty,
            weekdays,
            self.scheduled_date,
            self.scheduled_time,
            self.duration_minutes,
        )
        .map_err(|e| StorageError::InvalidInput(format!("schedule {}: {e}", self.id)))
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleWrite {
    pub task_id: String,
    pub def: ScheduleDef,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SavedSchedule {
    pub schedule: TaskSchedule,
    pub task: Task,
    pub member_ids: Vec<String>,
    /// Pending future logs removed because their member or date no longer applies.
    pub retracted_logs: Vec<i32>,
    /// Pending future logs whose due time moved.
    pub retimed_logs: Vec<i32>,
}

impl Store {
    pub async fn list_schedules(
        &self,
        family: &str,
    ) -> Result<Vec<(TaskSchedule, Task, Vec<String>)>, StorageError> {
        let fid = family.to_string();
        self.with_conn(move |conn| {
            use schema::{task_assignments as ta, task_schedules as ts, tasks as t};
            let rows = ts::table
                .inner_join(t::table.on(t::id.eq(ts::task_id)))
                .filter(t::family_id.eq(&fid))
                .order((ts::scheduled_time.asc(), t::name.asc()))
                .select((TaskSchedule::as_select(), Task::as_select()))
                .load::<(TaskSchedule, Task)>(conn)?;
            let assigned: Vec<(String, String)> = ta::table
                .inner_join(t::table.on(t::id.eq(ta::task_id)))
                .filter(t::family_id.eq(&fid))
                .filter(ta::is_active.eq(true))
                .order(ta::id.asc())
                .select((ta::task_id, ta::member_id))
                .load(conn)?;
            let mut by_task: HashMap<String, Vec<String>> = HashMap::new();
            for (task_id, member_id) in assigned {
                by_task.entry(task_id).or_default().push(member_id);
            }
            Ok(rows
                .into_iter()
                .map(|(s, t)| {
                    let members = by_task.get(&t.id).cloned().unwrap_or_default();
                    (s, t, members)
                })
                .collect())
        })
        .await
    }

    pub async fn get_schedule(
        &self,
        family: &str,
        schedule: &str,
    ) -> Result<Option<(TaskSchedule, Task, Vec<String>)>, StorageError> {
        let fid = family.to_string();
        let sid = schedule.to_string();
        self.with_conn(move |conn| {
            let Some((s, t)) = load_schedule(conn, &fid, &sid)? else {
                return Ok(None);
            };
            let members = active_member_ids(conn, &t.id)?;
            Ok(Some((s, t, members)))
        })
        .await
    }

    /// Ids of every schedule in the family.
    pub async fn schedule_ids(&self, family: &str) -> Result<Vec<String>, StorageError> {
        let fid = family.to_string();
        self.with_conn(move |conn| {
            use schema::{task_schedules as ts, tasks as t};
            Ok(ts::table
                .inner_join(t::table.on(t::id.eq(ts::task_id)))
                .filter(t::family_id.eq(&fid))
                .order(ts::created_at.asc())
                .select(ts::id)
                .load::<String>(conn)?)
        })
        .await
    }

    /// Creates (`schedule_id = None`) or replaces a schedule and reconciles the
    /// task's assignments against `write.member_ids`. Assignments belong to
    /// the task, so the member set applies to every schedule of that task;
    /// members left out lose their pending logs from `today` on. Already generated
    /// pending logs from `today` on are retracted or re-timed when they no
    /// longer match; completed and missed logs are never touched.
    pub async fn save_schedule(
        &self,
        family: &str,
        schedule_id: Option<&str>,
        write: ScheduleWrite,
        today: NaiveDate,
    ) -> Result<SavedSchedule, StorageError> {
        let fid = family.to_string();
        let existing_id = schedule_id.map(|s| s.to_string());
        self.with_conn(move |conn| {
            conn.immediate_transaction(|conn| -> Result<SavedSchedule, StorageError> {
                use schema::{members as m, task_schedules as ts, tasks as t};

                let task = t::table
                    .filter(t::family_id.eq(&fid))
                    .filter(t::id.eq(&write.task_id))
                    .first::<Task>(conn)
                    .optional()?
                    .ok_or_else(|| StorageError::NotFound(format!("task {}", write.task_id)))?;

                let desired: BTreeSet<String> = write.member_ids.iter().cloned().collect();
                let known: i64 = m::table
                    .filter(m::family_id.eq(&fid))
                    .filter(m::id.eq_any(desired.iter()))
                    .count()
                    .get_result(conn)?;
                if known as usize != desired.len() {
                    return Err(StorageError::InvalidInput(
                        "member_ids contains members outside this family".into(),
                    ));
                }

                let def = write.def;
                let weekdays = def.weekdays().map(|w| w.to_db_string());
                let schedule_type = def.schedule_type();

                let sid = match existing_id {
                    Some(sid) => {
                        let Some((current, _)) = load_schedule(conn, &fid, &sid)? else {
                            return Err(StorageError::NotFound(format!("schedule {sid}")));
                        };
                        if current.task_id != task.id {
                            return Err(StorageError::InvalidInput(
                                "a schedule cannot move to another task".into(),
                            ));
                        }
                        diesel::update(ts::table.filter(ts::id.eq(&sid)))
                            .set(&ScheduleChanges {
                                task_id: &task.id,
                                schedule_type: schedule_type.as_str(),
                                scheduled_time: def.scheduled_time,
                                duration_minutes: def.duration_minutes,
                                weekdays: weekdays.as_deref(),
                                scheduled_date: def.scheduled_date(),
                            })
                            .execute(conn)?;
                        sid
                    }
                    None => {
                        let sid = uuid::Uuid::new_v4().to_string();
                        diesel::insert_into(ts::table)
                            .values(&NewTaskSchedule {
                                id: &sid,
                                task_id: &task.id,
                                schedule_type: schedule_type.as_str(),
                                scheduled_time: def.scheduled_time,
                                duration_minutes: def.duration_minutes,
                                weekdays: weekdays.as_deref(),
                                scheduled_date: def.scheduled_date(),
                            })
                            .execute(conn)?;
                        sid
                    }
                };

                let desired_vec: Vec<String> = desired.into_iter().collect();
                let mut retracted_logs = sync_assignments(conn, &task.id, &desired_vec, today)?;

                let pending = pending_future_logs_of_schedule(conn, &sid, today)?;
                let (retime, retract) = reconcile_pending(&def, &pending);
                if !retime.is_empty() {
                    use schema::task_logs as tl;
                    diesel::update(tl::table.filter(tl::id.eq_any(&retime)))
                        .set(tl::due_time.eq(def.scheduled_time))
                        .execute(conn)?;
                }
                if !retract.is_empty() {
                    use schema::task_logs as tl;
                    diesel::delete(tl::table.filter(tl::id.eq_any(&retract))).execute(conn)?;
                    retracted_logs.extend(retract);
                }
                retracted_logs.sort_unstable();
                retracted_logs.dedup();

                let schedule = ts::table.filter(ts::id.eq(&sid)).first::<TaskSchedule>(conn)?;
                let member_ids = active_member_ids(conn, &task.id)?;
                debug!(
                    schedule_id = %sid,
                    retracted = retracted_logs.len(),
                    retimed = retime.len(),
                    "save_schedule applied"
                );
                Ok(SavedSchedule {
                    schedule,
                    task,
                    member_ids,
                    retracted_logs,
                    retimed_logs: retime,
                })
            })
        })
        .await
    }

    /// Deletes a schedule and retracts its pending logs from `today` on.
    /// Returns `None` when the schedule is not in the family.
    pub async fn delete_schedule(
        &self,
        family: &str,
        schedule: &str,
        today: NaiveDate,
    ) -> Result<Option<Vec<i32>>, StorageError> {
        let fid = family.to_string();
        let sid = schedule.to_string();
        self.with_conn(move |conn| {
            conn.immediate_transaction(|conn| -> Result<Option<Vec<i32>>, StorageError> {
                use schema::{task_logs as tl, task_schedules as ts};
                if load_schedule(conn, &fid, &sid)?.is_none() {
                    return Ok(None);
                }
                let retract: Vec<i32> = pending_future_logs_of_schedule(conn, &sid, today)?
                    .into_iter()
                    .map(|(id, _, _)| id)
                    .collect();
                if !retract.is_empty() {
                    diesel::delete(tl::table.filter(tl::id.eq_any(&retract))).execute(conn)?;
                }
                diesel::delete(ts::table.filter(ts::id.eq(&sid))).execute(conn)?;
                Ok(Some(retract))
            })
        })
        .await
    }
}

fn load_schedule(
    conn: &mut SqliteConnection,
    family: &str,
    schedule: &str,
) -> Result<Option<(TaskSchedule, Task)>, StorageError> {
    use schema::{task_schedules as ts, tasks as t};
    Ok(ts::table
        .inner_join(t::table.on(t::id.eq(ts::task_id)))
        .filter(t::family_id.eq(family))
        .filter(ts::id.eq(schedule))
        .select((TaskSchedule::as_select(), Task::as_select()))
        .first::<(TaskSchedule, Task)>(conn)
        .optional()?)
}

fn active_member_ids(
    conn: &mut SqliteConnection,
    task: &str,
) -> Result<Vec<String>, StorageError> {
    use schema::task_assignments as ta;
    Ok(ta::table
        .filter(ta::task_id.eq(task))
        .filter(ta::is_active.eq(true))
        .order(ta::id.asc())
        .select(ta::member_id)
        .load::<String>(conn)?)
}

fn pending_future_logs_of_schedule(
    conn: &mut SqliteConnection,
    schedule: &str,
    today: NaiveDate,
) -> Result<Vec<(i32, NaiveDate, NaiveTime)>, StorageError> {
    use schema::task_logs as tl;
    Ok(tl::table
        .filter(tl::schedule_id.eq(schedule))
        .filter(tl::status.eq(LogStatus::Pending.as_str()))
        .filter(tl::due_date.ge(today))
        .select((tl::id, tl::due_date, tl::due_time))
        .load::<(i32, NaiveDate, NaiveTime)>(conn)?)
}

/// Applies an [`AssignmentDiff`] for `task`. Retracted assignments are
/// deactivated, not deleted, so historical logs keep their link. Returns the
/// ids of pending logs from `today` on that were removed with them.
fn sync_assignments(
    conn: &mut SqliteConnection,
    task: &str,
    desired: &[String],
    today: NaiveDate,
) -> Result<Vec<i32>, StorageError> {
    use schema::{task_assignments as ta, task_logs as tl};

    let current: Vec<(i32, String, bool)> = ta::table
        .filter(ta::task_id.eq(task))
        .select((ta::id, ta::member_id, ta::is_active))
        .load(conn)?;
    let diff = AssignmentDiff::compute(&current, desired);
    if diff.is_noop() {
        return Ok(Vec::new());
    }

    for member in &diff.add {
        diesel::insert_into(ta::table)
            .values(&NewTaskAssignment {
                task_id: task,
                member_id: member,
                is_active: true,
            })
            .execute(conn)?;
    }
    let reactivate: Vec<i32> = diff
        .keep
        .iter()
        .filter(|(_, reactivate)| *reactivate)
        .map(|(id, _)| *id)
        .collect();
    if !reactivate.is_empty() {
        diesel::update(ta::table.filter(ta::id.eq_any(&reactivate)))
            .set(ta::is_active.eq(true))
            .execute(conn)?;
    }

    let mut retracted_logs = Vec::new();
    if !diff.retract.is_empty() {
        diesel::update(ta::table.filter(ta::id.eq_any(&diff.retract)))
            .set(ta::is_active.eq(false))
            .execute(conn)?;
        retracted_logs = tl::table
            .filter(tl::assignment_id.eq_any(&diff.retract))
            .filter(tl::status.eq(LogStatus::Pending.as_str()))
            .filter(tl::due_date.ge(today))
            .select(tl::id)
            .load::<i32>(conn)?;
        if !retracted_logs.is_empty() {
            diesel::delete(tl::table.filter(tl::id.eq_any(&retracted_logs))).execute(conn)?;
        }
    }
    Ok(retracted_logs)
}

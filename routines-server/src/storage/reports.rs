//! Aggregated read views for the dashboard.

use std::collections::HashMap;

use chrono::NaiveDate;
use diesel::dsl::{count, sum};
use diesel::prelude::*;
use routines_shared::domain::LogStatus;

use super::models::{Member, Streak, Task};
use super::{Store, StorageError, schema};

#[derive(Debug, Clone)]
pub struct MemberPoints {
    pub member: Member,
    pub total_points: i64,
    pub tasks_completed: i64,
    pub tasks_missed: i64,
}

#[derive(Debug, Clone)]
pub struct MemberStreak {
    pub streak: Streak,
    pub member: Member,
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReportRow {
    pub due_date: NaiveDate,
    pub member_name: String,
    pub task_name: String,
    pub status: String,
    pub points_earned: i32,
}

/// Streaks shown on the dashboard leaderboard.
pub const STREAK_LEADERBOARD_LIMIT: i64 = 10;

impl Store {
    /// Points and completion counts per member, highest total first.
    pub async fn member_points(&self, family: &str) -> Result<Vec<MemberPoints>, StorageError> {
        let fid = family.to_string();
        self.with_conn(move |conn| {
            use schema::{members as m, points as p, task_assignments as ta, task_logs as tl};

            let members = m::table
                .filter(m::family_id.eq(&fid))
                .order(m::name.asc())
                .load::<Member>(conn)?;

            let totals: HashMap<String, i64> = p::table
                .inner_join(m::table.on(m::id.eq(p::member_id)))
                .filter(m::family_id.eq(&fid))
                .group_by(p::member_id)
                .select((p::member_id, sum(p::points_awarded)))
                .load::<(String, Option<i64>)>(conn)?
                .into_iter()
                .map(|(member, total)| (member, total.unwrap_or(0)))
                .collect();

            let counts: Vec<(String, String, i64)> = tl::table
                .inner_join(ta::table.on(ta::id.eq(tl::assignment_id)))
                .inner_join(m::table.on(m::id.eq(ta::member_id)))
                .filter(m::family_id.eq(&fid))
                .group_by((ta::member_id, tl::status))
                .select((ta::member_id, tl::status, count(tl::id)))
                .load(conn)?;
            let mut completed: HashMap<String, i64> = HashMap::new();
            let mut missed: HashMap<String, i64> = HashMap::new();
            for (member, status, n) in counts {
                match status.parse::<LogStatus>() {
                    Ok(LogStatus::Completed) => {
                        completed.insert(member, n);
                    }
                    Ok(LogStatus::Missed) => {
                        missed.insert(member, n);
                    }
                    _ => {}
                }
            }

            let mut out: Vec<MemberPoints> = members
                .into_iter()
                .map(|member| MemberPoints {
                    total_points: totals.get(&member.id).copied().unwrap_or(0),
                    tasks_completed: completed.get(&member.id).copied().unwrap_or(0),
                    tasks_missed: missed.get(&member.id).copied().unwrap_or(0),
                    member,
                })
                .collect();
            out.sort_by(|a, b| b.total_points.cmp(&a.total_points));
            Ok(out)
        })
        .await
    }

    /// Top streaks by current length.
    pub async fn member_streaks(&self, family: &str) -> Result<Vec<MemberStreak>, StorageError> {
        let fid = family.to_string();
        self.with_conn(move |conn| {
            use schema::{members as m, streaks as st, tasks as t};
            Ok(st::table
                .inner_join(m::table.on(m::id.eq(st::member_id)))
                .inner_join(t::table.on(t::id.eq(st::task_id)))
                .filter(m::family_id.eq(&fid))
                .order((
                    st::current_streak.desc(),
                    st::longest_streak.desc(),
                    m::name.asc(),
                ))
                .limit(STREAK_LEADERBOARD_LIMIT)
                .select((Streak::as_select(), Member::as_select(), Task::as_select()))
                .load::<(Streak, Member, Task)>(conn)?
                .into_iter()
                .map(|(streak, member, task)| MemberStreak {
                    streak,
                    member,
                    task,
                })
                .collect())
        })
        .await
    }

    /// Every log due in `[from, to]`, newest day first, with the points it
    /// earned (0 unless completed).
    pub async fn daily_report(
        &self,
        family: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyReportRow>, StorageError> {
        let fid = family.to_string();
        self.with_conn(move |conn| {
            use schema::{members as m, points as p, task_assignments as ta, task_logs as tl, tasks as t};
            let rows = tl::table
                .inner_join(ta::table.on(ta::id.eq(tl::assignment_id)))
                .inner_join(m::table.on(m::id.eq(ta::member_id)))
                .inner_join(t::table.on(t::id.eq(ta::task_id)))
                .left_join(p::table.on(p::task_log_id.eq(tl::id)))
                .filter(t::family_id.eq(&fid))
                .filter(tl::due_date.ge(from))
                .filter(tl::due_date.le(to))
                .order((tl::due_date.desc(), tl::due_time.asc(), m::name.asc()))
                .select((
                    tl::due_date,
                    m::name,
                    t::name,
                    tl::status,
                    p::points_awarded.nullable(),
                ))
                .load::<(NaiveDate, String, String, String, Option<i32>)>(conn)?;
            Ok(rows
                .into_iter()
                .map(
                    |(due_date, member_name, task_name, status, points)| DailyReportRow {
                        due_date,
                        member_name,
                        task_name,
                        status,
                        points_earned: points.unwrap_or(0),
                    },
                )
                .collect())
        })
        .await
    }
}

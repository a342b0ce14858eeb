use crate::storage::schema::{
    accounts, families, members, points, predefined_tasks, streaks, task_assignments, task_logs,
    task_schedules, tasks,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = families)]
pub struct Family {
    pub id: String,
    pub name: String,
    pub timezone: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = families)]
pub struct NewFamily<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub timezone: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = accounts)]
#[diesel(primary_key(username))]
pub struct Account {
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub family_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = accounts)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
    pub family_id: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = members)]
#[diesel(belongs_to(Family, foreign_key = family_id))]
pub struct Member {
    pub id: String,
    pub family_id: String,
    pub account: Option<String>,
    pub name: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = members)]
pub struct NewMember<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub account: Option<&'a str>,
    pub name: &'a str,
    pub role: &'a str,
    pub avatar_url: Option<&'a str>,
    pub is_active: bool,
}

#[derive(AsChangeset)]
#[diesel(table_name = members)]
#[diesel(treat_none_as_null = true)]
pub struct MemberChanges<'a> {
    pub name: &'a str,
    pub role: &'a str,
    pub avatar_url: Option<&'a str>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = predefined_tasks)]
pub struct PredefinedTask {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub default_points: i32,
}

#[derive(Insertable)]
#[diesel(table_name = predefined_tasks)]
pub struct NewPredefinedTask<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub default_points: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(belongs_to(Family, foreign_key = family_id))]
pub struct Task {
    pub id: String,
    pub family_id: String,
    pub predefined_task_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub points_value: i32,
    pub image_url: Option<String>,
    pub voice_text: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTask<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub predefined_task_id: Option<&'a str>,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub points_value: i32,
    pub image_url: Option<&'a str>,
    pub voice_text: Option<&'a str>,
}

#[derive(AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(treat_none_as_null = true)]
pub struct TaskChanges<'a> {
    pub predefined_task_id: Option<&'a str>,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub points_value: i32,
    pub image_url: Option<&'a str>,
    pub voice_text: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = task_schedules)]
#[diesel(belongs_to(Task, foreign_key = task_id))]
pub struct TaskSchedule {
    pub id: String,
    pub task_id: String,
    pub schedule_type: String,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub weekdays: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = task_schedules)]
pub struct NewTaskSchedule<'a> {
    pub id: &'a str,
    pub task_id: &'a str,
    pub schedule_type: &'a str,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub weekdays: Option<&'a str>,
    pub scheduled_date: Option<NaiveDate>,
}

#[derive(AsChangeset)]
#[diesel(table_name = task_schedules)]
#[diesel(treat_none_as_null = true)]
pub struct ScheduleChanges<'a> {
    pub task_id: &'a str,
    pub schedule_type: &'a str,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub weekdays: Option<&'a str>,
    pub scheduled_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = task_assignments)]
#[diesel(belongs_to(Task, foreign_key = task_id))]
#[diesel(belongs_to(Member, foreign_key = member_id))]
pub struct TaskAssignment {
    pub id: i32,
    pub task_id: String,
    pub member_id: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = task_assignments)]
pub struct NewTaskAssignment<'a> {
    pub task_id: &'a str,
    pub member_id: &'a str,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = task_logs)]
#[diesel(belongs_to(TaskAssignment, foreign_key = assignment_id))]
pub struct TaskLog {
    pub id: i32,
    pub assignment_id: i32,
    pub schedule_id: Option<String>,
    pub due_date: NaiveDate,
    pub due_time: NaiveTime,
    pub status: String,
    pub completed_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_logs)]
pub struct NewTaskLog {
    pub assignment_id: i32,
    pub schedule_id: Option<String>,
    pub due_date: NaiveDate,
    pub due_time: NaiveTime,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = points)]
pub struct Point {
    pub id: i32,
    pub member_id: String,
    pub task_log_id: i32,
    pub points_awarded: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = points)]
pub struct NewPoint<'a> {
    pub member_id: &'a str,
    pub task_log_id: i32,
    pub points_awarded: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = streaks)]
pub struct Streak {
    pub id: i32,
    pub member_id: String,
    pub task_id: String,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_completed_date: Option<NaiveDate>,
}

#[derive(Insertable)]
#[diesel(table_name = streaks)]
pub struct NewStreak<'a> {
    pub member_id: &'a str,
    pub task_id: &'a str,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_completed_date: Option<NaiveDate>,
}

use chrono::{NaiveDate, NaiveTime};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::domain::{LogStatus, MemberRole, ScheduleType};

pub mod endpoints;
#[cfg(feature = "rest-client")]
pub mod rest;

pub const API_V1_PREFIX: &str = "/api/v1";
pub const FAMILY_PREFIX: &str = "/api/v1/family";

/// Path prefix for every family-scoped endpoint.
pub fn family_scope(family_id: &str) -> String {
    format!(
        "{}/{}",
        FAMILY_PREFIX,
        utf8_percent_encode(family_id, NON_ALPHANUMERIC)
    )
}

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthReq {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResp {
    pub token: String,
    pub family_id: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupReq {
    pub family_name: String,
    pub guardian_name: String,
    pub username: String,
    pub password: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResp {
    pub token: String,
    pub family_id: String,
    pub member_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionInfoDto {
    pub version: String,
}

// Members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDto {
    pub id: String,
    pub family_id: String,
    pub account: Option<String>,
    pub name: String,
    pub role: MemberRole,
    pub avatar_url: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberReq {
    pub name: String,
    pub role: MemberRole,
    pub avatar_url: Option<String>,
    pub is_active: Option<bool>,
}

// Tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredefinedTaskDto {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub default_points: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDto {
    pub id: String,
    pub family_id: String,
    pub predefined_task_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub points_value: i32,
    pub image_url: Option<String>,
    pub voice_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReq {
    pub predefined_task_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub points_value: Option<i32>,
    pub image_url: Option<String>,
    pub voice_text: Option<String>,
}

// Schedules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDto {
    pub id: String,
    pub task_id: String,
    pub task_name: String,
    pub schedule_type: ScheduleType,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub weekdays: Option<Vec<i64>>,
    pub scheduled_date: Option<NaiveDate>,
    pub member_ids: Vec<String>,
}

/// Create/update body. `scheduled_time` accepts `HH:MM` or `HH:MM:SS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleReq {
    pub task_id: String,
    pub schedule_type: ScheduleType,
    pub scheduled_time: String,
    pub duration_minutes: Option<i32>,
    pub weekdays: Option<Vec<i64>>,
    pub scheduled_date: Option<NaiveDate>,
    pub member_ids: Vec<String>,
}

// Expansion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandReq {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandResp {
    pub created: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResp {
    pub missed: usize,
}

// Logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogDto {
    pub id: i32,
    pub assignment_id: i32,
    pub member_id: String,
    pub member_name: String,
    pub task_id: String,
    pub task_name: String,
    pub due_date: NaiveDate,
    pub due_time: NaiveTime,
    pub status: LogStatus,
    pub completed_at: Option<String>, // RFC3339 UTC
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteReq {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResp {
    pub log_id: i32,
    pub status: LogStatus,
    pub points_awarded: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
}

/// One row on the household display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTaskDto {
    pub log_id: i32,
    pub due_time: NaiveTime,
    pub member_name: String,
    pub member_avatar_url: Option<String>,
    pub task_name: String,
    pub task_image_url: Option<String>,
    pub voice_text: Option<String>,
    pub announcement: String,
}

// Reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberPointsDto {
    pub member_id: String,
    pub member_name: String,
    pub avatar_url: Option<String>,
    pub total_points: i64,
    pub tasks_completed: i64,
    pub tasks_missed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberStreakDto {
    pub member_id: String,
    pub member_name: String,
    pub task_name: String,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_completed_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReportItemDto {
    pub due_date: NaiveDate,
    pub member_name: String,
    pub task_name: String,
    pub status: LogStatus,
    pub points_earned: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    #[default]
    Today,
    Week,
    Month,
}

// Events (SSE)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementDto {
    pub log_id: i32,
    pub member_name: String,
    pub task_name: String,
    pub custom_text: Option<String>,
    pub text: String,
    pub due_date: NaiveDate,
    pub due_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    TaskDue {
        family_id: String,
        announcement: AnnouncementDto,
    },
    LogsChanged {
        family_id: String,
        log_ids: Vec<i32>,
    },
    ScheduleChanged {
        family_id: String,
        schedule_id: String,
    },
}

impl ServerEvent {
    pub fn family_id(&self) -> &str {
        match self {
            ServerEvent::TaskDue { family_id, .. }
            | ServerEvent::LogsChanged { family_id, .. }
            | ServerEvent::ScheduleChanged { family_id, .. } => family_id,
        }
    }
}

use chrono::NaiveDate;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::{API_V1_PREFIX, ReportPeriod, family_scope};

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

fn scoped(base: &str, family_id: &str, rest: &str) -> String {
    base_join(base, &format!("{}/{}", family_scope(family_id), rest))
}

pub fn auth_login(base: &str) -> String {
    base_join(base, &format!("{}/auth/login", API_V1_PREFIX))
}
pub fn auth_signup(base: &str) -> String {
    base_join(base, &format!("{}/auth/signup", API_V1_PREFIX))
}
pub fn version(base: &str) -> String {
    base_join(base, &format!("{}/version", API_V1_PREFIX))
}

pub fn members(base: &str, family_id: &str) -> String {
    scoped(base, family_id, "members")
}
pub fn member(base: &str, family_id: &str, member_id: &str) -> String {
    scoped(base, family_id, &format!("members/{}", enc(member_id)))
}
pub fn predefined_tasks(base: &str, family_id: &str) -> String {
    scoped(base, family_id, "predefined-tasks")
}
pub fn tasks(base: &str, family_id: &str) -> String {
    scoped(base, family_id, "tasks")
}
pub fn task(base: &str, family_id: &str, task_id: &str) -> String {
    scoped(base, family_id, &format!("tasks/{}", enc(task_id)))
}
pub fn schedules(base: &str, family_id: &str) -> String {
    scoped(base, family_id, "schedules")
}
pub fn schedule(base: &str, family_id: &str, schedule_id: &str) -> String {
    scoped(base, family_id, &format!("schedules/{}", enc(schedule_id)))
}
pub fn schedule_expand(base: &str, family_id: &str, schedule_id: &str) -> String {
    scoped(
        base,
        family_id,
        &format!("schedules/{}/expand", enc(schedule_id)),
    )
}
pub fn family_expand(base: &str, family_id: &str) -> String {
    scoped(base, family_id, "expand")
}
pub fn sweep(base: &str, family_id: &str) -> String {
    scoped(base, family_id, "sweep")
}
pub fn today(base: &str, family_id: &str) -> String {
    scoped(base, family_id, "today")
}
pub fn logs_on(base: &str, family_id: &str, date: NaiveDate) -> String {
    scoped(base, family_id, &format!("logs?date={}", date.format("%Y-%m-%d")))
}
pub fn log_complete(base: &str, family_id: &str, log_id: i32) -> String {
    scoped(base, family_id, &format!("logs/{}/complete", log_id))
}
pub fn log_miss(base: &str, family_id: &str, log_id: i32) -> String {
    scoped(base, family_id, &format!("logs/{}/miss", log_id))
}
pub fn report_points(base: &str, family_id: &str) -> String {
    scoped(base, family_id, "reports/points")
}
pub fn report_streaks(base: &str, family_id: &str) -> String {
    scoped(base, family_id, "reports/streaks")
}
pub fn report_daily(base: &str, family_id: &str, period: ReportPeriod) -> String {
    let p = match period {
        ReportPeriod::Today => "today",
        ReportPeriod::Week => "week",
        ReportPeriod::Month => "month",
    };
    scoped(base, family_id, &format!("reports/daily?period={}", p))
}
pub fn events(base: &str, family_id: &str, token: &str) -> String {
    scoped(base, family_id, &format!("events?token={}", enc(token)))
}

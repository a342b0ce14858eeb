use chrono::{NaiveDate, NaiveTime};
use routines_shared::api::AnnouncementDto;

/// What the household display should say when an occurrence becomes due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub log_id: i32,
    pub member_name: String,
    pub task_name: String,
    pub custom_text: Option<String>,
    pub due_date: NaiveDate,
    pub due_time: NaiveTime,
}

impl Announcement {
    pub fn spoken_text(&self) -> String {
        spoken_text(&self.member_name, &self.task_name, self.custom_text.as_deref())
    }

    pub fn to_dto(&self) -> AnnouncementDto {
        AnnouncementDto {
            log_id: self.log_id,
            member_name: self.member_name.clone(),
            task_name: self.task_name.clone(),
            custom_text: self.custom_text.clone(),
            text: self.spoken_text(),
            due_date: self.due_date,
            due_time: self.due_time,
        }
    }
}

pub fn spoken_text(member_name: &str, task_name: &str, custom_text: Option<&str>) -> String {
    match custom_text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => text.to_string(),
        None => format!("Time for {} for {}.", task_name, member_name),
    }
}

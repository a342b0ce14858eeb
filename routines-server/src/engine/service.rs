use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use routines_shared::api::ServerEvent;
use routines_shared::domain::LogStatus;
use tracing::{debug, info, warn};

use super::announce::Announcement;
use super::clock::{Clock, parse_timezone};
use super::events::EventBus;
use super::expand::{DateWindow, expand};
use super::ledger::{StreakState, Transition, TransitionOutcome};
use super::EngineError;
use crate::storage::Store;
use crate::storage::logs::LogView;
use crate::storage::members::MemberWrite;
use crate::storage::models::Member;
use crate::storage::schedules::{SavedSchedule, ScheduleWrite};

/// Counts from one expansion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    /// Ids of the logs this run inserted.
    pub created: Vec<i32>,
    /// Occurrences that already had a log.
    pub skipped: usize,
}

impl ExpansionReport {
    fn merge(&mut self, other: ExpansionReport) {
        self.created.extend(other.created);
        self.skipped += other.skipped;
    }
}

/// Result of a successful complete or miss.
#[derive(Debug, Clone)]
pub struct TransitionReport {
    pub view: LogView,
    pub status: LogStatus,
    pub points_awarded: i32,
    pub streak: StreakState,
}

/// One row of the household display.
#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub view: LogView,
    pub announcement: Announcement,
}

/// Family-scoped schedule expansion and completion ledger.
///
/// Every operation takes the family id explicitly; nothing is derived from
/// the caller's session here.
#[derive(Clone)]
pub struct Routines {
    store: Store,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl Routines {
    pub fn new(store: Store, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// The family's time zone; unknown zone names fall back to UTC.
    pub async fn family_tz(&self, family: &str) -> Result<Tz, EngineError> {
        let fam = self
            .store
            .get_family(family)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("family {family}")))?;
        Ok(parse_timezone(&fam.timezone).unwrap_or_else(|| {
            warn!(family_id = %family, timezone = %fam.timezone, "unknown time zone, using UTC");
            Tz::UTC
        }))
    }

    pub async fn today(&self, family: &str) -> Result<NaiveDate, EngineError> {
        let tz = self.family_tz(family).await?;
        Ok(self.clock.today_in(tz))
    }

    /// Creates or replaces a schedule. Pending logs from today on that no
    /// longer match are retracted or re-timed.
    pub async fn save_schedule(
        &self,
        family: &str,
        schedule_id: Option<&str>,
        input: ScheduleWrite,
    ) -> Result<SavedSchedule, EngineError> {
        let today = self.today(family).await?;
        let saved = self
            .store
            .save_schedule(family, schedule_id, input, today)
            .await?;
        info!(
            family_id = %family,
            schedule_id = %saved.schedule.id,
            members = saved.member_ids.len(),
            "schedule saved"
        );
        self.events.publish(ServerEvent::ScheduleChanged {
            family_id: family.to_string(),
            schedule_id: saved.schedule.id.clone(),
        });
        let mut touched = saved.retracted_logs.clone();
        touched.extend(saved.retimed_logs.iter().copied());
        self.events.logs_changed(family, touched);
        Ok(saved)
    }

    pub async fn delete_schedule(&self, family: &str, schedule_id: &str) -> Result<(), EngineError> {
        let today = self.today(family).await?;
        let retracted = self
            .store
            .delete_schedule(family, schedule_id, today)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("schedule {schedule_id}")))?;
        info!(family_id = %family, schedule_id = %schedule_id, retracted = retracted.len(), "schedule deleted");
        self.events.publish(ServerEvent::ScheduleChanged {
            family_id: family.to_string(),
            schedule_id: schedule_id.to_string(),
        });
        self.events.logs_changed(family, retracted);
        Ok(())
    }

    /// Updates a member. Deactivating one drops its pending logs from today
    /// on; logs already past stay for the sweep.
    pub async fn update_member(
        &self,
        family: &str,
        member_id: &str,
        input: MemberWrite,
    ) -> Result<Member, EngineError> {
        let today = self.today(family).await?;
        let (member, retracted) = self
            .store
            .update_member(family, member_id, input, today)
            .await?;
        info!(
            family_id = %family,
            member_id = %member.id,
            active = member.is_active,
            retracted = retracted.len(),
            "member updated"
        );
        self.events.logs_changed(family, retracted);
        Ok(member)
    }

    /// Materializes the schedule's occurrences inside `window`. Safe to call
    /// repeatedly and concurrently: existing logs are left alone.
    pub async fn expand_schedule(
        &self,
        family: &str,
        schedule_id: &str,
        window: DateWindow,
    ) -> Result<ExpansionReport, EngineError> {
        let tz = self.family_tz(family).await?;
        let report = self.expand_one(family, tz, schedule_id, window).await?;
        self.events.logs_changed(family, report.created.clone());
        Ok(report)
    }

    /// Expands every schedule of the family.
    pub async fn expand_family(
        &self,
        family: &str,
        window: DateWindow,
    ) -> Result<ExpansionReport, EngineError> {
        let tz = self.family_tz(family).await?;
        let mut report = ExpansionReport::default();
        for schedule_id in self.store.schedule_ids(family).await? {
            report.merge(self.expand_one(family, tz, &schedule_id, window).await?);
        }
        debug!(
            family_id = %family,
            from = %window.start(),
            to = %window.end(),
            created = report.created.len(),
            skipped = report.skipped,
            "family expanded"
        );
        self.events.logs_changed(family, report.created.clone());
        Ok(report)
    }

    async fn expand_one(
        &self,
        family: &str,
        tz: Tz,
        schedule_id: &str,
        window: DateWindow,
    ) -> Result<ExpansionReport, EngineError> {
        let ctx = self
            .store
            .expansion_context(family, schedule_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("schedule {schedule_id}")))?;
        let def = ctx.schedule.to_def()?;
        let occurrences = expand(&def, &ctx.active_assignments(), window);
        let wanted = occurrences.len();
        let created = self
            .store
            .insert_logs_if_absent(schedule_id, occurrences)
            .await?;

        let today = self.clock.today_in(tz);
        for log in created.iter().filter(|l| l.due_date == today) {
            let Some(member) = ctx.member_for(log.assignment_id) else {
                continue;
            };
            let announcement = Announcement {
                log_id: log.id,
                member_name: member.name.clone(),
                task_name: ctx.task.name.clone(),
                custom_text: ctx.task.voice_text.clone(),
                due_date: log.due_date,
                due_time: log.due_time,
            };
            self.events.publish(ServerEvent::TaskDue {
                family_id: family.to_string(),
                announcement: announcement.to_dto(),
            });
        }

        Ok(ExpansionReport {
            skipped: wanted - created.len(),
            created: created.into_iter().map(|l| l.id).collect(),
        })
    }

    pub async fn complete(
        &self,
        family: &str,
        log_id: i32,
        notes: Option<String>,
    ) -> Result<TransitionReport, EngineError> {
        self.transition(family, log_id, Transition::Complete, notes)
            .await
    }

    pub async fn miss(&self, family: &str, log_id: i32) -> Result<TransitionReport, EngineError> {
        self.transition(family, log_id, Transition::Miss, None).await
    }

    async fn transition(
        &self,
        family: &str,
        log_id: i32,
        transition: Transition,
        notes: Option<String>,
    ) -> Result<TransitionReport, EngineError> {
        let at = self.clock.now_utc().naive_utc();
        let (outcome, view) = self
            .store
            .transition_log(family, log_id, transition, at, notes)
            .await?;
        match outcome {
            TransitionOutcome::Applied {
                status,
                points_awarded,
                streak,
            } => {
                info!(
                    family_id = %family,
                    log_id,
                    status = %status,
                    points_awarded,
                    current_streak = streak.current,
                    "log transitioned"
                );
                self.events.logs_changed(family, vec![log_id]);
                Ok(TransitionReport {
                    view,
                    status,
                    points_awarded,
                    streak,
                })
            }
            TransitionOutcome::AlreadyFinal(status) => Err(EngineError::conflict(format!(
                "log {log_id} is already {status}"
            ))),
        }
    }

    /// Marks pending logs whose due time plus `grace` has passed as missed.
    /// Logs that left `pending` concurrently are skipped.
    pub async fn sweep(&self, family: &str, grace: Duration) -> Result<usize, EngineError> {
        let tz = self.family_tz(family).await?;
        let cutoff = self.clock.now_in(tz) - grace;
        let overdue = self.store.overdue_pending(family, cutoff).await?;
        let mut missed = Vec::new();
        for log_id in overdue {
            let at = self.clock.now_utc().naive_utc();
            let (outcome, _) = self
                .store
                .transition_log(family, log_id, Transition::Miss, at, None)
                .await?;
            if matches!(outcome, TransitionOutcome::Applied { .. }) {
                missed.push(log_id);
            }
        }
        if !missed.is_empty() {
            info!(family_id = %family, missed = missed.len(), "sweep marked logs missed");
        }
        let count = missed.len();
        self.events.logs_changed(family, missed);
        Ok(count)
    }

    /// Pending logs due today in the family's zone, by due time.
    pub async fn pending_today(&self, family: &str) -> Result<Vec<ActiveTask>, EngineError> {
        let today = self.today(family).await?;
        let views = self
            .store
            .list_logs(family, today, Some(LogStatus::Pending))
            .await?;
        Ok(views
            .into_iter()
            .map(|view| {
                let announcement = Announcement {
                    log_id: view.log.id,
                    member_name: view.member.name.clone(),
                    task_name: view.task.name.clone(),
                    custom_text: view.task.voice_text.clone(),
                    due_date: view.log.due_date,
                    due_time: view.log.due_time,
                };
                ActiveTask { view, announcement }
            })
            .collect())
    }
}

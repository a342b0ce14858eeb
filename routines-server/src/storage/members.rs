//! Members, the predefined task catalog and family tasks.

use chrono::NaiveDate;
use diesel::prelude::*;
use routines_shared::domain::LogStatus;

use super::models::{
    Member, MemberChanges, NewMember, NewTask, PredefinedTask, Task, TaskChanges,
};
use super::{Store, StorageError, schema};

/// Owned input for creating or replacing a member. `is_active: None` means
/// active on create and unchanged on update.
#[derive(Debug, Clone)]
pub struct MemberWrite {
    pub name: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Owned input for creating or replacing a task.
#[derive(Debug, Clone)]
pub struct TaskWrite {
    pub predefined_task_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub points_value: i32,
    pub image_url: Option<String>,
    pub voice_text: Option<String>,
}

impl Store {
    pub async fn list_members(&self, family: &str) -> Result<Vec<Member>, StorageError> {
        use schema::members::dsl::*;
        let fid = family.to_string();
        self.with_conn(move |conn| {
            Ok(members
                .filter(family_id.eq(&fid))
                .order(created_at.asc())
                .load::<Member>(conn)?)
        })
        .await
    }

    pub async fn get_member(
        &self,
        family: &str,
        member: &str,
    ) -> Result<Option<Member>, StorageError> {
        use schema::members::dsl::*;
        let fid = family.to_string();
        let mid = member.to_string();
        self.with_conn(move |conn| {
            Ok(members
                .filter(family_id.eq(&fid))
                .filter(id.eq(&mid))
                .first::<Member>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn create_member(
        &self,
        family: &str,
        input: MemberWrite,
    ) -> Result<Member, StorageError> {
        use schema::members::dsl as m;
        let fid = family.to_string();
        self.with_conn(move |conn| {
            let new_id = uuid::Uuid::new_v4().to_string();
            diesel::insert_into(m::members)
                .values(&NewMember {
                    id: &new_id,
                    family_id: &fid,
                    account: None,
                    name: &input.name,
                    role: &input.role,
                    avatar_url: input.avatar_url.as_deref(),
                    is_active: input.is_active.unwrap_or(true),
                })
                .execute(conn)?;
            Ok(m::members.filter(m::id.eq(&new_id)).first::<Member>(conn)?)
        })
        .await
    }

    /// Updates a member. An inactive member loses its pending logs due
    /// `today` or later; the returned ids are those removed logs.
    pub async fn update_member(
        &self,
        family: &str,
        member: &str,
        input: MemberWrite,
        today: NaiveDate,
    ) -> Result<(Member, Vec<i32>), StorageError> {
        use schema::members::dsl as m;
        use schema::{task_assignments as ta, task_logs as tl};
        let fid = family.to_string();
        let mid = member.to_string();
        self.with_conn(move |conn| {
            conn.immediate_transaction(|conn| -> Result<(Member, Vec<i32>), StorageError> {
                let stored: Option<bool> = m::members
                    .filter(m::family_id.eq(&fid))
                    .filter(m::id.eq(&mid))
                    .select(m::is_active)
                    .first(conn)
                    .optional()?;
                let Some(stored) = stored else {
                    return Err(StorageError::NotFound(format!("member {mid}")));
                };
                let changes = MemberChanges {
                    name: &input.name,
                    role: &input.role,
                    avatar_url: input.avatar_url.as_deref(),
                    is_active: input.is_active.unwrap_or(stored),
                };
                diesel::update(
                    m::members
                        .filter(m::family_id.eq(&fid))
                        .filter(m::id.eq(&mid)),
                )
                .set(&changes)
                .execute(conn)?;
                let row = m::members.filter(m::id.eq(&mid)).first::<Member>(conn)?;
                if row.is_active {
                    return Ok((row, Vec::new()));
                }
                let retracted: Vec<i32> = tl::table
                    .inner_join(ta::table.on(ta::id.eq(tl::assignment_id)))
                    .filter(ta::member_id.eq(&mid))
                    .filter(tl::status.eq(LogStatus::Pending.as_str()))
                    .filter(tl::due_date.ge(today))
                    .select(tl::id)
                    .load(conn)?;
                if !retracted.is_empty() {
                    diesel::delete(tl::table.filter(tl::id.eq_any(&retracted))).execute(conn)?;
                }
                Ok((row, retracted))
            })
        })
        .await
    }

    pub async fn delete_member(&self, family: &str, member: &str) -> Result<bool, StorageError> {
        use schema::members::dsl as m;
        let fid = family.to_string();
        let mid = member.to_string();
        self.with_conn(move |conn| {
            let deleted = diesel::delete(
                m::members
                    .filter(m::family_id.eq(&fid))
                    .filter(m::id.eq(&mid)),
            )
            .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    pub async fn list_predefined_tasks(&self) -> Result<Vec<PredefinedTask>, StorageError> {
        use schema::predefined_tasks::dsl::*;
        self.with_conn(|conn| {
            Ok(predefined_tasks
                .order(name.asc())
                .load::<PredefinedTask>(conn)?)
        })
        .await
    }

    pub async fn get_predefined_task(
        &self,
        id_: &str,
    ) -> Result<Option<PredefinedTask>, StorageError> {
        use schema::predefined_tasks::dsl::*;
        let pid = id_.to_string();
        self.with_conn(move |conn| {
            Ok(predefined_tasks
                .filter(id.eq(&pid))
                .first::<PredefinedTask>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn list_tasks(&self, family: &str) -> Result<Vec<Task>, StorageError> {
        use schema::tasks::dsl::*;
        let fid = family.to_string();
        self.with_conn(move |conn| {
            Ok(tasks
                .filter(family_id.eq(&fid))
                .order((created_at.desc(), name.asc()))
                .load::<Task>(conn)?)
        })
        .await
    }

    pub async fn get_task(&self, family: &str, task: &str) -> Result<Option<Task>, StorageError> {
        use schema::tasks::dsl::*;
        let fid = family.to_string();
        let tid = task.to_string();
        self.with_conn(move |conn| {
            Ok(tasks
                .filter(family_id.eq(&fid))
                .filter(id.eq(&tid))
                .first::<Task>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn create_task(&self, family: &str, input: TaskWrite) -> Result<Task, StorageError> {
        use schema::tasks::dsl as t;
        let fid = family.to_string();
        self.with_conn(move |conn| {
            let new_id = uuid::Uuid::new_v4().to_string();
            diesel::insert_into(t::tasks)
                .values(&NewTask {
                    id: &new_id,
                    family_id: &fid,
                    predefined_task_id: input.predefined_task_id.as_deref(),
                    name: &input.name,
                    description: input.description.as_deref(),
                    points_value: input.points_value,
                    image_url: input.image_url.as_deref(),
                    voice_text: input.voice_text.as_deref(),
                })
                .execute(conn)?;
            Ok(t::tasks.filter(t::id.eq(&new_id)).first::<Task>(conn)?)
        })
        .await
    }

    pub async fn update_task(
        &self,
        family: &str,
        task: &str,
        input: TaskWrite,
    ) -> Result<Task, StorageError> {
        use schema::tasks::dsl as t;
        let fid = family.to_string();
        let tid = task.to_string();
        self.with_conn(move |conn| {
            let changes = TaskChanges {
                predefined_task_id: input.predefined_task_id.as_deref(),
                name: &input.name,
                description: input.description.as_deref(),
                points_value: input.points_value,
                image_url: input.image_url.as_deref(),
                voice_text: input.voice_text.as_deref(),
            };
            let updated = diesel::update(t::tasks.filter(t::family_id.eq(&fid)).filter(t::id.eq(&tid)))
                .set(&changes)
                .execute(conn)?;
            if updated == 0 {
                return Err(StorageError::NotFound(format!("task {tid}")));
            }
            Ok(t::tasks.filter(t::id.eq(&tid)).first::<Task>(conn)?)
        })
        .await
    }

    /// Deletes a task together with its schedules, assignments and logs.
    pub async fn delete_task(&self, family: &str, task: &str) -> Result<bool, StorageError> {
        use schema::tasks::dsl as t;
        let fid = family.to_string();
        let tid = task.to_string();
        self.with_conn(move |conn| {
            let deleted =
                diesel::delete(t::tasks.filter(t::family_id.eq(&fid)).filter(t::id.eq(&tid)))
                    .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }
}

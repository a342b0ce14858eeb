pub mod logs;
pub mod members;
pub mod models;
pub mod reports;
pub mod schedules;
pub mod schema;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{Account, Family, NewAccount, NewFamily, NewMember, NewPredefinedTask};
use routines_shared::domain::MemberRole;
use tracing::{info, trace};

use crate::server::{FamilySeed, PredefinedTaskSeed};

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// The caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The addressed row does not exist within the family.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule would be violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(Store { pool })
    }

    /// Runs `f` on a pooled connection off the async runtime.
    pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StorageError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            f(&mut conn)
        })
        .await?
    }

    pub async fn seed_from_config(
        &self,
        cfg_families: &[FamilySeed],
        cfg_predefined: &[PredefinedTaskSeed],
    ) -> Result<(), StorageError> {
        use schema::{accounts, families, members, predefined_tasks};

        let families_owned = cfg_families.to_owned();
        let predefined_owned = cfg_predefined.to_owned();
        self.with_conn(move |conn| {
            conn.immediate_transaction(|conn| -> Result<(), StorageError> {
                // Upsert catalog templates
                for p in &predefined_owned {
                    let row = NewPredefinedTask {
                        id: &p.id,
                        name: &p.name,
                        description: p.description.as_deref(),
                        default_points: p.default_points,
                    };
                    diesel::insert_into(predefined_tasks::table)
                        .values(&row)
                        .on_conflict(predefined_tasks::id)
                        .do_update()
                        .set((
                            predefined_tasks::name.eq(row.name),
                            predefined_tasks::description.eq(row.description),
                            predefined_tasks::default_points.eq(row.default_points),
                        ))
                        .execute(conn)?;
                }

                for f in &families_owned {
                    let new_family = NewFamily {
                        id: &f.id,
                        name: &f.name,
                        timezone: &f.timezone,
                    };
                    diesel::insert_into(families::table)
                        .values(&new_family)
                        .on_conflict(families::id)
                        .do_update()
                        .set((
                            families::name.eq(new_family.name),
                            families::timezone.eq(new_family.timezone),
                        ))
                        .execute(conn)?;

                    for a in &f.accounts {
                        let new_account = NewAccount {
                            username: &a.username,
                            password_hash: &a.password_hash,
                            role: a.role.as_str(),
                            family_id: &f.id,
                        };
                        diesel::insert_into(accounts::table)
                            .values(&new_account)
                            .on_conflict(accounts::username)
                            .do_update()
                            .set((
                                accounts::password_hash.eq(new_account.password_hash),
                                accounts::role.eq(new_account.role),
                                accounts::family_id.eq(new_account.family_id),
                            ))
                            .execute(conn)?;

                        // Guardians get a linked member row once
                        let Some(member_name) = a.member_name.as_deref() else {
                            continue;
                        };
                        let linked: i64 = members::table
                            .filter(members::account.eq(&a.username))
                            .count()
                            .get_result(conn)?;
                        if linked == 0 {
                            let id = uuid::Uuid::new_v4().to_string();
                            diesel::insert_into(members::table)
                                .values(&NewMember {
                                    id: &id,
                                    family_id: &f.id,
                                    account: Some(&a.username),
                                    name: member_name,
                                    role: MemberRole::Guardian.as_str(),
                                    avatar_url: None,
                                    is_active: true,
                                })
                                .execute(conn)?;
                            info!(family_id = %f.id, username = %a.username, "seed: created guardian member");
                        }
                    }
                }
                Ok(())
            })
        })
        .await
    }

    pub async fn list_families(&self) -> Result<Vec<Family>, StorageError> {
        use schema::families::dsl::*;
        self.with_conn(|conn| Ok(families.order(created_at.asc()).load::<Family>(conn)?))
            .await
    }

    pub async fn get_family(&self, family: &str) -> Result<Option<Family>, StorageError> {
        use schema::families::dsl::*;
        let fid = family.to_string();
        self.with_conn(move |conn| {
            Ok(families
                .filter(id.eq(&fid))
                .first::<Family>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn get_account(&self, username_: &str) -> Result<Option<Account>, StorageError> {
        use schema::accounts::dsl::*;
        let u = username_.to_string();
        self.with_conn(move |conn| {
            Ok(accounts
                .filter(username.eq(&u))
                .first::<Account>(conn)
                .optional()?)
        })
        .await
    }

    /// Member row linked to a login account, if any.
    pub async fn member_for_account(
        &self,
        username_: &str,
    ) -> Result<Option<models::Member>, StorageError> {
        use schema::members::dsl::*;
        let u = username_.to_string();
        self.with_conn(move |conn| {
            Ok(members
                .filter(account.eq(&u))
                .first::<models::Member>(conn)
                .optional()?)
        })
        .await
    }

    /// Creates a family, its first guardian account and the guardian member in
    /// one transaction. Returns `(family_id, member_id)`.
    pub async fn create_family_with_guardian(
        &self,
        family_name: &str,
        timezone_: &str,
        guardian_name: &str,
        username_: &str,
        password_hash_: &str,
    ) -> Result<(String, String), StorageError> {
        use schema::{accounts, families, members};
        let family_name = family_name.to_string();
        let tz = timezone_.to_string();
        let guardian_name = guardian_name.to_string();
        let username_ = username_.to_string();
        let hash = password_hash_.to_string();
        trace!(username = %username_, "create_family_with_guardian starting");
        self.with_conn(move |conn| {
            conn.immediate_transaction(|conn| -> Result<(String, String), StorageError> {
                let taken: i64 = accounts::table
                    .filter(accounts::username.eq(&username_))
                    .count()
                    .get_result(conn)?;
                if taken > 0 {
                    return Err(StorageError::Conflict(format!(
                        "username already taken: {username_}"
                    )));
                }
                let family_id = uuid::Uuid::new_v4().to_string();
                let member_id = uuid::Uuid::new_v4().to_string();
                diesel::insert_into(families::table)
                    .values(&NewFamily {
                        id: &family_id,
                        name: &family_name,
                        timezone: &tz,
                    })
                    .execute(conn)?;
                diesel::insert_into(accounts::table)
                    .values(&NewAccount {
                        username: &username_,
                        password_hash: &hash,
                        role: routines_shared::auth::Role::Guardian.as_str(),
                        family_id: &family_id,
                    })
                    .execute(conn)?;
                diesel::insert_into(members::table)
                    .values(&NewMember {
                        id: &member_id,
                        family_id: &family_id,
                        account: Some(&username_),
                        name: &guardian_name,
                        role: MemberRole::Guardian.as_str(),
                        avatar_url: None,
                        is_active: true,
                    })
                    .execute(conn)?;
                Ok((family_id, member_id))
            })
        })
        .await
    }
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    // SQLite leaves FK enforcement off per connection
    diesel::sql_query("PRAGMA foreign_keys=ON;").execute(conn)?;
    Ok(())
}

use crate::db_types::{Identity, NewIdentity};
use crate::error::AppError;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{debug, error, info};

const USERS_TABLE: &str = "
    create table if not exists users (
      id serial primary key,
      user_id bigint unique not null,
      telegram_username varchar(100),
      full_name varchar(200) not null,
      phone_number varchar(20) not null,
      email varchar(150) not null,
      registration_date timestamptz not null default now(),
      status varchar(20) not null default 'active',
      last_activity timestamptz not null default now()
    )
    ";

const ACTIVITY_TABLE: &str = "
    create table if not exists user_activity (
      id serial primary key,
      user_id bigint not null references users(user_id),
      activity_type varchar(50) not null,
      activity_date timestamptz not null default now(),
      details text
    )
    ";

const INDEXES: &[&str] = &[
    "create index if not exists idx_user_id on users(user_id)",
    "create index if not exists idx_activity_user_id on user_activity(user_id)",
    "create index if not exists idx_activity_date on user_activity(activity_date)",
];

/// Durable storage of identity records.  Implementations log the underlying failure and hand
/// back a static `AppError`; callers decide what the actor gets told.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Create the tables if they are absent.  Safe to call on every start.
    async fn initialize(&self) -> Result<(), AppError>;

    async fn exists(&self, user_id: i64) -> Result<bool, AppError>;

    async fn find(&self, user_id: i64) -> Result<Option<Identity>, AppError>;

    /// Insert a record, or overwrite the mutable fields of the record with the same `user_id`.
    /// Returns the internal id either way.
    async fn upsert(&self, identity: &NewIdentity) -> Result<i32, AppError>;

    async fn count(&self) -> Result<i64, AppError>;

    /// Most recently registered first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<Identity>, AppError>;

    async fn log_activity(
        &self,
        user_id: i64,
        activity_type: &str,
        details: Option<&str>,
    ) -> Result<(), AppError>;

    async fn close(&self) {}
}

pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub async fn connect(options: PgConnectOptions, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                error!(error=%e, "failed to connect to database");
                AppError("database unreachable")
            })?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn initialize(&self) -> Result<(), AppError> {
        for statement in [USERS_TABLE, ACTIVITY_TABLE].iter().chain(INDEXES) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    error!(error=%e, "failed to initialize schema");
                    AppError("schema initialization failed")
                })?;
        }
        info!("database tables ready");
        Ok(())
    }

    async fn exists(&self, user_id: i64) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>("select exists(select 1 from users where user_id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!(error=%e, user_id, "failed to check user existence");
                AppError("db error")
            })
    }

    async fn find(&self, user_id: i64) -> Result<Option<Identity>, AppError> {
        sqlx::query_as::<_, Identity>(
            "
            select *
            from users
            where user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error=%e, user_id, "failed to fetch user");
            AppError("db error")
        })
    }

    async fn upsert(&self, identity: &NewIdentity) -> Result<i32, AppError> {
        let id = sqlx::query_scalar::<_, i32>(
            "
            insert into users (
              user_id,
              telegram_username,
              full_name,
              phone_number,
              email
            ) values (
              $1,
              $2,
              $3,
              $4,
              $5
            )
            on conflict (user_id) do update set
              telegram_username = excluded.telegram_username,
              full_name = excluded.full_name,
              phone_number = excluded.phone_number,
              email = excluded.email,
              last_activity = now()
            returning id
            ",
        )
        .bind(identity.user_id)
        .bind(&identity.telegram_username)
        .bind(&identity.full_name)
        .bind(&identity.phone_number)
        .bind(&identity.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(error=%e, user_id = identity.user_id, "failed to upsert user row");
            AppError("db error")
        })?;
        debug!(id, user_id = identity.user_id, "upserted user row");
        Ok(id)
    }

    async fn count(&self) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("select count(*) from users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!(error=%e, "failed to count users");
                AppError("db error")
            })
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Identity>, AppError> {
        sqlx::query_as::<_, Identity>(
            "
            select *
            from users
            order by registration_date desc
            limit $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error=%e, "failed to list users");
            AppError("db error")
        })
    }

    async fn log_activity(
        &self,
        user_id: i64,
        activity_type: &str,
        details: Option<&str>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!(error=%e, "failed to begin transaction");
            AppError("db error")
        })?;
        sqlx::query(
            "
            insert into user_activity (
              user_id,
              activity_type,
              details
            ) values (
              $1,
              $2,
              $3
            )
            ",
        )
        .bind(user_id)
        .bind(activity_type)
        .bind(details)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error=%e, user_id, "failed to insert activity row");
            AppError("db error")
        })?;
        sqlx::query("update users set last_activity = now() where user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(error=%e, user_id, "failed to bump last activity");
                AppError("db error")
            })?;
        tx.commit().await.map_err(|e| {
            error!(error=%e, "db error");
            AppError("db error")
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("database pool closed");
    }
}


#[cfg(test)]
mod tests {
    //! Run against a scratch database with
    //! `DATABASE_URL=postgres://... cargo test -- --ignored`.
    use super::*;
    use crate::db_types::activity;

    async fn pg_store() -> PgStore {
        let url = std::env::var("DATABASE_URL").unwrap();
        let store = PgStore::connect(url.parse().unwrap(), 2).await.unwrap();
        store.initialize().await.unwrap();
        store
    }

    fn identity(user_id: i64, full_name: &str) -> NewIdentity {
        NewIdentity {
            user_id,
            telegram_username: Some("ahmad".to_string()),
            full_name: full_name.to_string(),
            phone_number: "+966512345678".to_string(),
            email: "a@b.com".to_string(),
        }
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn initialize_twice_is_harmless() {
        let store = pg_store().await;
        store.initialize().await.unwrap();
        store.close().await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn upsert_same_actor_updates_in_place() {
        let store = pg_store().await;
        let user_id = 9_000_000_000 + i64::from(std::process::id());

        let first = store.upsert(&identity(user_id, "Ahmad Khaled")).await.unwrap();
        let count = store.count().await.unwrap();
        let second = store
            .upsert(&identity(user_id, "Ahmad Khaled Omar"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count().await.unwrap(), count);
        let row = store.find(user_id).await.unwrap().unwrap();
        assert_eq!(row.full_name, "Ahmad Khaled Omar");
        assert_eq!(row.status, "active");
        assert!(store.exists(user_id).await.unwrap());
        store
            .log_activity(user_id, activity::REGISTRATION, Some("test"))
            .await
            .unwrap();
        store.close().await;
    }
}

use serde::Serialize;
use sqlx::types::time::OffsetDateTime;

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Identity {
    pub id: i32,
    pub user_id: i64,
    pub telegram_username: Option<String>,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub registration_date: OffsetDateTime,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
}

/// The mutable fields written by an upsert.  Everything else is defaulted by the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub user_id: i64,
    pub telegram_username: Option<String>,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
}

pub mod activity {
    pub const REGISTRATION: &str = "registration";
}

//! Account models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub mailing_list_opt_in: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Everything needed to create an account from a completed onboarding form.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password: String,
    pub name: String,
    pub mailing_list_opt_in: bool,
}

/// A freshly issued login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub id: String,
    pub user_id: String,
    pub expiration_date: DateTime<Utc>,
}

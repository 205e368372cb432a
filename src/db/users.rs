//! Account persistence behind the `UserStore` seam.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use super::{AuthSession, DbPool, NewAccount, User};
use crate::api::auth::{generate_token, hash_password, hash_token, verify_password};

/// Account field that collided with an existing user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Username,
    Email,
}

impl DuplicateField {
    /// Form field name the conflict is reported on
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateField::Username => "username",
            DuplicateField::Email => "email",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("an account with this {} already exists", .0.as_str())]
    Duplicate(DuplicateField),
    #[error("user store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("failed to hash password: {0}")]
    PasswordHash(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the user and its first login session atomically.
    async fn create_account(&self, account: NewAccount) -> Result<AuthSession, StoreError>;

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Look up the owner of an unexpired session.
    async fn user_for_session(&self, session_id: &str) -> Result<Option<User>, StoreError>;

    /// Verify credentials (username or email) and open a new session.
    async fn login(&self, identifier: &str, password: &str)
        -> Result<Option<AuthSession>, StoreError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError>;
}

pub struct SqliteUserStore {
    pool: DbPool,
    session_ttl: chrono::Duration,
}

impl SqliteUserStore {
    pub fn new(pool: DbPool, ttl_days: i64) -> Self {
        Self {
            pool,
            session_ttl: chrono::Duration::days(ttl_days),
        }
    }

    fn expiration_date(&self) -> DateTime<Utc> {
        Utc::now() + self.session_ttl
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Map a UNIQUE violation on the users table to the offending field
fn duplicate_from_db(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let msg = db_err.message();
        if msg.contains("UNIQUE constraint failed: users.username") {
            return StoreError::Duplicate(DuplicateField::Username);
        }
        if msg.contains("UNIQUE constraint failed: users.email") {
            return StoreError::Duplicate(DuplicateField::Email);
        }
    }
    StoreError::Unavailable(err)
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create_account(&self, account: NewAccount) -> Result<AuthSession, StoreError> {
        let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(&account.username)
            .fetch_optional(&self.pool)
            .await?;
        if taken.is_some() {
            return Err(StoreError::Duplicate(DuplicateField::Username));
        }
        if self.email_exists(&account.email).await? {
            return Err(StoreError::Duplicate(DuplicateField::Email));
        }

        let password_hash = hash_password(&account.password)
            .map_err(|e| StoreError::PasswordHash(e.to_string()))?;

        let user_id = uuid::Uuid::new_v4().to_string();
        let session_id = generate_token();
        let expiration_date = self.expiration_date();
        let now = timestamp(Utc::now());

        // Concurrent signups still race to here; the UNIQUE indexes decide
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO users (id, email, username, name, password_hash, mailing_list_opt_in, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user_id)
        .bind(&account.email)
        .bind(&account.username)
        .bind(&account.name)
        .bind(&password_hash)
        .bind(account.mailing_list_opt_in)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(duplicate_from_db)?;

        sqlx::query(
            "INSERT INTO sessions (id, token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(hash_token(&session_id))
        .bind(&user_id)
        .bind(timestamp(expiration_date))
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, username = %account.username, "Created account");

        Ok(AuthSession {
            id: session_id,
            user_id,
            expiration_date,
        })
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let found: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn user_for_session(&self, session_id: &str) -> Result<Option<User>, StoreError> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT u.* FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = ? AND s.expires_at > ?
            "#,
        )
        .bind(hash_token(session_id))
        .bind(timestamp(Utc::now()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, StoreError> {
        let identifier = identifier.trim().to_lowercase();
        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE username = ? OR email = ?")
                .bind(&identifier)
                .bind(&identifier)
                .fetch_optional(&self.pool)
                .await?;

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => return Ok(None),
        };

        let session_id = generate_token();
        let expiration_date = self.expiration_date();
        sqlx::query(
            "INSERT INTO sessions (id, token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(hash_token(&session_id))
        .bind(&user.id)
        .bind(timestamp(expiration_date))
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(Some(AuthSession {
            id: session_id,
            user_id: user.id,
            expiration_date,
        }))
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(session_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
impl SqliteUserStore {
    pub(crate) async fn count_users(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub(crate) async fn session_expiration(&self, session_id: &str) -> DateTime<Utc> {
        let expires_at: String =
            sqlx::query_scalar("SELECT expires_at FROM sessions WHERE token_hash = ?")
                .bind(hash_token(session_id))
                .fetch_one(&self.pool)
                .await
                .unwrap();
        DateTime::parse_from_rfc3339(&expires_at).unwrap().with_timezone(&Utc)
    }
}

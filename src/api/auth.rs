use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::db::{StoreError, User, UserStore};
use crate::session::{SessionCookie, SESSION_ID_KEY};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random session id
pub(crate) fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a session token for storage
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolve the user behind the cookie's `sessionId`.
///
/// A session id that no longer maps to a live user (deleted account,
/// expired or revoked session) is removed from the cookie, logging the
/// visitor out. Callers should commit the cookie when it was modified.
pub async fn resolve_session(
    users: &dyn UserStore,
    cookie: &mut SessionCookie,
) -> Result<Option<User>, StoreError> {
    let Some(session_id) = cookie.session_id().map(str::to_owned) else {
        return Ok(None);
    };

    match users.user_for_session(&session_id).await? {
        Some(user) => Ok(Some(user)),
        None => {
            tracing::warn!(
                "Something weird happened: authenticated session has no user, logging out"
            );
            cookie.unset(SESSION_ID_KEY);
            Ok(None)
        }
    }
}

/// End the cookie's login session, if any.
pub async fn logout(users: &dyn UserStore, cookie: &mut SessionCookie) -> Result<(), StoreError> {
    if let Some(session_id) = cookie.session_id().map(str::to_owned) {
        users.delete_session(&session_id).await?;
    }
    cookie.unset(SESSION_ID_KEY);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, NewAccount, SqliteUserStore};

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("Secret123!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Secret123!", &hash));
        assert!(!verify_password("Secret124!", &hash));
        assert!(!verify_password("Secret123!", "not-a-phc-string"));
    }

    #[test]
    fn test_generate_token_is_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_stable_and_hides_token() {
        let token = generate_token();
        let hashed = hash_token(&token);
        assert_eq!(hashed, hash_token(&token));
        assert_eq!(hashed.len(), 64);
        assert_ne!(hashed, token);
        assert_ne!(hashed, hash_token(&generate_token()));
    }

    async fn store_with_user() -> (SqliteUserStore, String) {
        let store = SqliteUserStore::new(test_pool().await, 30);
        let session = store
            .create_account(NewAccount {
                email: "m@example.com".to_string(),
                username: "mk".to_string(),
                password: "Secret123!".to_string(),
                name: "Matt".to_string(),
                mailing_list_opt_in: false,
            })
            .await
            .unwrap();
        (store, session.id)
    }

    #[tokio::test]
    async fn test_resolve_session_live_user() {
        let (store, session_id) = store_with_user().await;
        let mut cookie = SessionCookie::new();
        cookie.set(SESSION_ID_KEY, session_id);
        let cookie_before = cookie.clone();

        let user = resolve_session(&store, &mut cookie).await.unwrap().unwrap();
        assert_eq!(user.username, "mk");
        assert_eq!(cookie, cookie_before);
    }

    #[tokio::test]
    async fn test_resolve_session_stale_id_logs_out() {
        let (store, _) = store_with_user().await;
        let mut cookie = SessionCookie::new();
        cookie.set(SESSION_ID_KEY, "deleted-session");

        assert!(resolve_session(&store, &mut cookie).await.unwrap().is_none());
        assert!(!cookie.contains(SESSION_ID_KEY));
    }

    #[tokio::test]
    async fn test_resolve_session_anonymous() {
        let (store, _) = store_with_user().await;
        let mut cookie = SessionCookie::new();
        assert!(resolve_session(&store, &mut cookie).await.unwrap().is_none());
        assert!(!cookie.is_modified());
    }

    #[tokio::test]
    async fn test_logout_deletes_session() {
        let (store, session_id) = store_with_user().await;
        let mut cookie = SessionCookie::new();
        cookie.set(SESSION_ID_KEY, session_id.clone());

        logout(&store, &mut cookie).await.unwrap();
        assert!(!cookie.contains(SESSION_ID_KEY));
        assert!(store.user_for_session(&session_id).await.unwrap().is_none());
    }
}

//! Input validation for account fields.
//!
//! Each validator returns the first problem found as a user-facing
//! message. For collecting messages across fields, use the
//! `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating usernames (letters, numbers and underscores)
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_]+$").unwrap();

    /// Regex for validating email addresses
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?)+$"
    ).unwrap();
}

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 20;
pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 40;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 100;

/// Validate a username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    let len = username.chars().count();
    if len < USERNAME_MIN {
        return Err("Username is too short".to_string());
    }
    if len > USERNAME_MAX {
        return Err("Username is too long".to_string());
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err("Username can only include letters, numbers, and underscores".to_string());
    }

    Ok(())
}

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    let len = name.chars().count();
    if len < NAME_MIN {
        return Err("Name is too short".to_string());
    }
    if len > NAME_MAX {
        return Err("Name is too long".to_string());
    }

    Ok(())
}

/// Validate a password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let len = password.chars().count();
    if len < PASSWORD_MIN {
        return Err("Password is too short".to_string());
    }
    if len > PASSWORD_MAX {
        return Err("Password is too long".to_string());
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Email is invalid".to_string());
    }

    Ok(())
}

/// Interpret an HTML checkbox value
pub fn checkbox(value: Option<&str>) -> bool {
    matches!(value, Some("on") | Some("true"))
}

/// Return `to` if it is a same-origin relative path, else `default`.
///
/// Rejects protocol-relative (`//host`) and backslash tricks (`/\host`),
/// dot segments, and anything that is not a visible ASCII character.
pub fn safe_redirect(to: Option<&str>, default: &str) -> String {
    let Some(to) = to.map(str::trim) else {
        return default.to_string();
    };

    if to.is_empty()
        || !to.starts_with('/')
        || to.starts_with("//")
        || to.starts_with("/\\")
        || to.contains("..")
        || !to.chars().all(|c| c.is_ascii_graphic())
    {
        return default.to_string();
    }

    to.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("mk").is_ok());
        assert!(validate_username("matt_k2").is_ok());
        assert!(validate_username("ABCDEFGHIJKLMNOPQRST").is_ok());

        assert_eq!(validate_username("").unwrap_err(), "Username is required");
        assert_eq!(validate_username("m").unwrap_err(), "Username is too short");
        assert!(validate_username("ABCDEFGHIJKLMNOPQRSTU").is_err()); // too long
        assert!(validate_username("matt k").is_err());
        assert!(validate_username("matt-k").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Matt").is_ok());
        assert!(validate_name("Zoë").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name("Al").is_err());
        assert!(validate_name(&"a".repeat(41)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Secret123!").is_ok());
        assert!(validate_password("sixsix").is_ok());

        assert_eq!(validate_password("").unwrap_err(), "Password is required");
        assert_eq!(validate_password("short").unwrap_err(), "Password is too short");
        assert!(validate_password(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("m@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.co").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("m@localhost").is_err());
        assert!(validate_email("m @example.com").is_err());
    }

    #[test]
    fn test_checkbox() {
        assert!(checkbox(Some("on")));
        assert!(checkbox(Some("true")));
        assert!(!checkbox(Some("off")));
        assert!(!checkbox(Some("")));
        assert!(!checkbox(None));
    }

    #[test]
    fn test_safe_redirect_accepts_relative_paths() {
        assert_eq!(safe_redirect(Some("/notes"), "/"), "/notes");
        assert_eq!(safe_redirect(Some(" /users/mk?tab=1 "), "/"), "/users/mk?tab=1");
        assert_eq!(safe_redirect(Some("/"), "/home"), "/");
    }

    #[test]
    fn test_safe_redirect_rejects_open_redirects() {
        assert_eq!(safe_redirect(None, "/"), "/");
        assert_eq!(safe_redirect(Some(""), "/"), "/");
        assert_eq!(safe_redirect(Some("https://evil.com"), "/"), "/");
        assert_eq!(safe_redirect(Some("//evil.com"), "/"), "/");
        assert_eq!(safe_redirect(Some("/\\evil.com"), "/"), "/");
        assert_eq!(safe_redirect(Some("/../admin"), "/"), "/");
        assert_eq!(safe_redirect(Some("notes"), "/"), "/");
        assert_eq!(safe_redirect(Some("/a\r\nSet-Cookie: x=1"), "/"), "/");
    }
}

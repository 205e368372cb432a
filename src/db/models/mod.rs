//! Database models split into domain-specific modules.

pub mod user;

pub use user::*;

pub mod api;
pub mod config;
pub mod db;
pub mod onboarding;
pub mod session;
pub mod ui;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::db::{SqliteUserStore, UserStore};
use crate::onboarding::OnboardingFlow;
use crate::session::SessionStore;

pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let users = Arc::new(SqliteUserStore::new(db, config.session.ttl_days));
        Self::with_user_store(config, users)
    }

    /// Build state around any user store implementation
    pub fn with_user_store(config: Config, users: Arc<dyn UserStore>) -> Self {
        let sessions = SessionStore::new(&config.session);
        Self {
            config,
            users,
            sessions,
        }
    }

    pub fn onboarding(&self) -> OnboardingFlow<'_> {
        OnboardingFlow::new(self.users.as_ref(), &self.config.routes)
    }
}

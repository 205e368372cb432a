use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use super::{commit_jar, redirect_with, render_template, LoginTemplate};
use crate::api::auth::{logout, resolve_session};
use crate::api::error::ApiError;
use crate::api::validation::{checkbox, safe_redirect};
use crate::session::{Commit, AUTH_ERROR_KEY, PENDING_EMAIL_KEY, SESSION_ID_KEY};
use crate::config::RoutesConfig;
use crate::AppState;

pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Deserialize)]
pub(super) struct LoginQuery {
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    remember: Option<String>,
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

// Login page
pub(super) async fn login_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
) -> Result<Response, ApiError> {
    let mut cookie = state.sessions.load(&jar);
    if resolve_session(state.users.as_ref(), &mut cookie).await?.is_some() {
        return redirect_with(&state, jar, &state.config.routes.landing, None);
    }

    let form_error = cookie.take_message(AUTH_ERROR_KEY);
    let commit = cookie.is_modified().then(|| Commit::session_scoped(cookie));
    let jar = commit_jar(&state, jar, commit)?;

    let template = LoginTemplate {
        redirect_to: safe_redirect(query.redirect_to.as_deref(), &state.config.routes.landing),
        form_error,
    };
    Ok((jar, render_template(template)).into_response())
}

// Login submit
pub(super) async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let mut cookie = state.sessions.load(&jar);

    let Some(session) = state.users.login(&form.username, &form.password).await? else {
        tracing::info!("Login failed");
        cookie.set(AUTH_ERROR_KEY, INVALID_CREDENTIALS);
        let to = retry_location(&state.config.routes, form.redirect_to.as_deref());
        return redirect_with(&state, jar, &to, Some(Commit::session_scoped(cookie)));
    };

    tracing::info!(user_id = %session.user_id, "User logged in");
    // Drop any session this cookie already held
    logout(state.users.as_ref(), &mut cookie).await?;
    cookie.set(SESSION_ID_KEY, session.id);
    cookie.unset(PENDING_EMAIL_KEY);
    cookie.unset(AUTH_ERROR_KEY);

    let commit = Commit {
        cookie,
        expires: checkbox(form.remember.as_deref()).then_some(session.expiration_date),
    };
    let to = safe_redirect(form.redirect_to.as_deref(), &state.config.routes.landing);
    redirect_with(&state, jar, &to, Some(commit))
}

/// Login page URL that keeps the visitor's sanitized destination
fn retry_location(routes: &RoutesConfig, redirect_to: Option<&str>) -> String {
    match redirect_to.map(str::trim).filter(|to| !to.is_empty()) {
        Some(to) => format!(
            "{}?redirectTo={}",
            routes.login,
            urlencoding::encode(&safe_redirect(Some(to), &routes.landing))
        ),
        None => routes.login.clone(),
    }
}

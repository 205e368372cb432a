// Site pages - Askama templates for server-side rendering

mod login;
mod onboarding;
mod signup;
mod templates;

use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::api::auth::{logout, resolve_session};
use crate::api::error::ApiError;
use crate::session::Commit;
use crate::AppState;

pub use templates::*;

pub const ONBOARDING_PATH: &str = "/onboarding";

// Helper to render templates and handle errors
fn render_template<T: Template>(template: T) -> Response {
    render_with_status(StatusCode::OK, template)
}

fn render_with_status<T: Template>(status: StatusCode, template: T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Template render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Template error: {}", e)).into_response()
        }
    }
}

/// Add the signed session cookie to the response jar, if there is one to send
fn commit_jar(state: &AppState, jar: CookieJar, commit: Option<Commit>) -> Result<CookieJar, ApiError> {
    match commit {
        Some(commit) => Ok(jar.add(state.sessions.commit(&commit.cookie, commit.expires)?)),
        None => Ok(jar),
    }
}

fn redirect_with(
    state: &AppState,
    jar: CookieJar,
    to: &str,
    commit: Option<Commit>,
) -> Result<Response, ApiError> {
    let jar = commit_jar(state, jar, commit)?;
    Ok((jar, Redirect::to(to)).into_response())
}

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(landing))
        .route("/signup", get(signup::signup_page).post(signup::signup_submit))
        .route("/login", get(login::login_page).post(login::login_submit))
        .route("/logout", post(logout_submit))
        .route(
            ONBOARDING_PATH,
            get(onboarding::onboarding_page).post(onboarding::onboarding_submit),
        )
}

// Landing page
async fn landing(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let mut cookie = state.sessions.load(&jar);
    let user = resolve_session(state.users.as_ref(), &mut cookie).await?;

    let commit = cookie.is_modified().then(|| Commit::session_scoped(cookie));
    let jar = commit_jar(&state, jar, commit)?;

    let template = LandingTemplate {
        user_name: user.map(|u| u.name),
    };
    Ok((jar, render_template(template)).into_response())
}

// Logout
async fn logout_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let mut cookie = state.sessions.load(&jar);
    logout(state.users.as_ref(), &mut cookie).await?;

    redirect_with(
        &state,
        jar,
        &state.config.routes.landing,
        Some(Commit::session_scoped(cookie)),
    )
}

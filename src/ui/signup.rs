use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use super::{
    commit_jar, redirect_with, render_template, render_with_status, FieldView, SignupTemplate,
    ONBOARDING_PATH,
};
use crate::api::auth::resolve_session;
use crate::api::error::ApiError;
use crate::api::validation::validate_email;
use crate::onboarding::EMAIL_TAKEN;
use crate::session::{Commit, AUTH_ERROR_KEY, PENDING_EMAIL_KEY};
use crate::AppState;

#[derive(Deserialize)]
pub(super) struct SignupForm {
    #[serde(default)]
    email: String,
}

// Signup page
pub(super) async fn signup_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let mut cookie = state.sessions.load(&jar);
    if resolve_session(state.users.as_ref(), &mut cookie).await?.is_some() {
        return redirect_with(&state, jar, &state.config.routes.landing, None);
    }

    let form_error = cookie.take_message(AUTH_ERROR_KEY);
    let commit = cookie.is_modified().then(|| Commit::session_scoped(cookie));
    let jar = commit_jar(&state, jar, commit)?;

    let template = SignupTemplate {
        email: FieldView::default(),
        form_error,
    };
    Ok((jar, render_template(template)).into_response())
}

// Signup submit: stage the email and continue to onboarding
pub(super) async fn signup_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, ApiError> {
    let mut cookie = state.sessions.load(&jar);
    if resolve_session(state.users.as_ref(), &mut cookie).await?.is_some() {
        return redirect_with(&state, jar, &state.config.routes.landing, None);
    }

    let email = form.email.trim().to_lowercase();
    let error = match validate_email(&email) {
        Err(e) => Some(e),
        Ok(()) if state.users.email_exists(&email).await? => Some(EMAIL_TAKEN.to_string()),
        Ok(()) => None,
    };
    if let Some(error) = error {
        let template = SignupTemplate {
            email: FieldView {
                value: form.email,
                errors: vec![error],
            },
            form_error: None,
        };
        return Ok(render_with_status(StatusCode::BAD_REQUEST, template));
    }

    tracing::debug!("Staged signup email, continuing to onboarding");
    cookie.set(PENDING_EMAIL_KEY, email);
    redirect_with(
        &state,
        jar,
        ONBOARDING_PATH,
        Some(Commit::session_scoped(cookie)),
    )
}

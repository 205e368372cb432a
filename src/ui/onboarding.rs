use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use super::{commit_jar, redirect_with, render_template, render_with_status, OnboardingTemplate};
use crate::api::error::ApiError;
use crate::api::validation::safe_redirect;
use crate::onboarding::{EntryOutcome, OnboardingForm, SubmitOutcome};
use crate::AppState;

#[derive(Deserialize)]
pub(super) struct OnboardingQuery {
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

// Onboarding form
pub(super) async fn onboarding_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<OnboardingQuery>,
) -> Result<Response, ApiError> {
    let cookie = state.sessions.load(&jar);

    match state.onboarding().enter(cookie).await? {
        EntryOutcome::Redirect(redirect) => redirect_with(&state, jar, &redirect.to, redirect.commit),
        EntryOutcome::Present { form_error, commit } => {
            let jar = commit_jar(&state, jar, Some(commit))?;
            let redirect_to =
                safe_redirect(query.redirect_to.as_deref(), &state.config.routes.landing);
            let template = OnboardingTemplate::blank(redirect_to, form_error);
            Ok((jar, render_template(template)).into_response())
        }
    }
}

// Onboarding submit
pub(super) async fn onboarding_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<OnboardingForm>,
) -> Result<Response, ApiError> {
    let cookie = state.sessions.load(&jar);

    match state.onboarding().submit(cookie, &form).await? {
        SubmitOutcome::Redirect(redirect) => redirect_with(&state, jar, &redirect.to, redirect.commit),
        SubmitOutcome::Idle(submission) => Ok(Json(serde_json::json!({
            "status": "idle",
            "submission": submission,
        }))
        .into_response()),
        SubmitOutcome::Invalid(submission) if wants_json(&headers) => Ok((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "status": "error",
                "submission": submission,
            })),
        )
            .into_response()),
        SubmitOutcome::Invalid(submission) => {
            let template = OnboardingTemplate::from_state(&submission, &state.config.routes.landing);
            Ok(render_with_status(StatusCode::BAD_REQUEST, template))
        }
    }
}

/// Progressive-validation clients ask for JSON; browsers get the page
fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

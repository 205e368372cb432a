// Askama template definitions

use askama::Template;

use crate::api::validation::checkbox;
use crate::onboarding::form::{
    AGREE_TO_MAILING_LIST, AGREE_TO_TERMS, CONFIRM_PASSWORD, NAME, PASSWORD, REDIRECT_TO,
    REMEMBER, USERNAME,
};
use crate::onboarding::SubmissionState;

/// One form input: its prior value and any messages for it
#[derive(Debug, Default)]
pub struct FieldView {
    pub value: String,
    pub errors: Vec<String>,
}

impl FieldView {
    pub fn checked(&self) -> bool {
        checkbox(Some(&self.value))
    }

    fn from_state(state: &SubmissionState, field: &str) -> Self {
        Self {
            value: state.payload.get(field).cloned().unwrap_or_default(),
            errors: state.errors_for(field).to_vec(),
        }
    }
}

// Landing page
#[derive(Template)]
#[template(path = "index.html")]
pub struct LandingTemplate {
    pub user_name: Option<String>,
}

// Signup (email staging) form
#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub email: FieldView,
    pub form_error: Option<String>,
}

// Login form
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub redirect_to: String,
    pub form_error: Option<String>,
}

// Onboarding form
#[derive(Template)]
#[template(path = "onboarding.html")]
pub struct OnboardingTemplate {
    pub username: FieldView,
    pub name: FieldView,
    pub password: FieldView,
    pub confirm_password: FieldView,
    pub agree_to_terms: FieldView,
    pub agree_to_mailing_list: FieldView,
    pub remember: FieldView,
    pub redirect_to: String,
    pub form_errors: Vec<String>,
}

impl OnboardingTemplate {
    /// Fresh form, optionally carrying an error flashed by an earlier step
    pub fn blank(redirect_to: String, form_error: Option<String>) -> Self {
        Self {
            username: FieldView::default(),
            name: FieldView::default(),
            password: FieldView::default(),
            confirm_password: FieldView::default(),
            agree_to_terms: FieldView::default(),
            agree_to_mailing_list: FieldView::default(),
            remember: FieldView::default(),
            redirect_to,
            form_errors: form_error.into_iter().collect(),
        }
    }

    /// Re-render a rejected submission with its input and errors
    pub fn from_state(state: &SubmissionState, default_redirect: &str) -> Self {
        Self {
            username: FieldView::from_state(state, USERNAME),
            name: FieldView::from_state(state, NAME),
            password: FieldView::from_state(state, PASSWORD),
            confirm_password: FieldView::from_state(state, CONFIRM_PASSWORD),
            agree_to_terms: FieldView::from_state(state, AGREE_TO_TERMS),
            agree_to_mailing_list: FieldView::from_state(state, AGREE_TO_MAILING_LIST),
            remember: FieldView::from_state(state, REMEMBER),
            redirect_to: state
                .payload
                .get(REDIRECT_TO)
                .cloned()
                .unwrap_or_else(|| default_redirect.to_string()),
            form_errors: state.form_errors.clone(),
        }
    }
}

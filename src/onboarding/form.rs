//! Onboarding form schema and validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::error::{FieldErrors, ValidationErrorBuilder};
use crate::api::validation::{
    checkbox, validate_name, validate_password, validate_username,
};

pub const USERNAME: &str = "username";
pub const NAME: &str = "name";
pub const PASSWORD: &str = "password";
pub const CONFIRM_PASSWORD: &str = "confirmPassword";
pub const AGREE_TO_TERMS: &str = "agreeToTermsOfServiceAndPrivacyPolicy";
pub const AGREE_TO_MAILING_LIST: &str = "agreeToMailingList";
pub const REMEMBER: &str = "remember";
pub const REDIRECT_TO: &str = "redirectTo";

pub const PASSWORD_MISMATCH: &str = "The passwords did not match";
pub const TERMS_REQUIRED: &str = "You must agree to the terms of service and privacy policy";

/// Raw form fields as submitted by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingForm {
    pub username: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    #[serde(rename = "agreeToTermsOfServiceAndPrivacyPolicy")]
    pub agree_to_terms: Option<String>,
    pub agree_to_mailing_list: Option<String>,
    pub remember: Option<String>,
    pub redirect_to: Option<String>,
    /// `submit`, or a validation-only event such as `validate/username`
    pub intent: Option<String>,
}

/// Why the form was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Progressive validation while the user is typing; no side effects
    Validate,
    /// Final submission
    Submit,
}

impl Intent {
    pub fn parse(intent: Option<&str>) -> Self {
        match intent {
            None | Some("") | Some("submit") => Intent::Submit,
            Some(_) => Intent::Validate,
        }
    }
}

/// A form that passed every field and cross-field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingSubmission {
    pub username: String,
    pub name: String,
    pub password: String,
    pub agree_to_terms: bool,
    pub agree_to_mailing_list: bool,
    pub remember: bool,
    pub redirect_to: Option<String>,
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

impl OnboardingForm {
    pub fn intent(&self) -> Intent {
        Intent::parse(self.intent.as_deref())
    }

    /// Validate every field, collecting all messages.
    pub fn validate(&self) -> Result<OnboardingSubmission, FieldErrors> {
        let username = text(&self.username).trim();
        let name = text(&self.name).trim();
        let password = text(&self.password);
        let confirm_password = text(&self.confirm_password);
        let agree_to_terms = checkbox(self.agree_to_terms.as_deref());

        let mut errors = ValidationErrorBuilder::new();
        errors
            .check(USERNAME, validate_username(username))
            .check(NAME, validate_name(name))
            .check(PASSWORD, validate_password(password))
            .check(CONFIRM_PASSWORD, validate_password(confirm_password));
        if !agree_to_terms {
            errors.add(AGREE_TO_TERMS, TERMS_REQUIRED);
        }
        if confirm_password != password {
            errors.add(CONFIRM_PASSWORD, PASSWORD_MISMATCH);
        }
        errors.finish()?;

        Ok(OnboardingSubmission {
            username: username.to_lowercase(),
            name: name.to_string(),
            password: password.to_string(),
            agree_to_terms,
            agree_to_mailing_list: checkbox(self.agree_to_mailing_list.as_deref()),
            remember: checkbox(self.remember.as_deref()),
            redirect_to: self
                .redirect_to
                .as_deref()
                .map(str::trim)
                .filter(|to| !to.is_empty())
                .map(str::to_string),
        })
    }

    /// Submitted values safe to echo back; passwords are never returned.
    pub fn echo(&self) -> BTreeMap<String, String> {
        [
            (USERNAME, &self.username),
            (NAME, &self.name),
            (AGREE_TO_TERMS, &self.agree_to_terms),
            (AGREE_TO_MAILING_LIST, &self.agree_to_mailing_list),
            (REMEMBER, &self.remember),
            (REDIRECT_TO, &self.redirect_to),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.clone().map(|v| (field.to_string(), v)))
        .collect()
    }
}

/// Validation state handed back to the client after a post.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionState {
    pub intent: Intent,
    pub payload: BTreeMap<String, String>,
    pub field_errors: FieldErrors,
    pub form_errors: Vec<String>,
}

impl SubmissionState {
    pub fn new(form: &OnboardingForm, field_errors: FieldErrors) -> Self {
        Self {
            intent: form.intent(),
            payload: form.echo(),
            field_errors,
            form_errors: Vec::new(),
        }
    }

    pub fn with_form_error(mut self, message: impl Into<String>) -> Self {
        self.form_errors.push(message.into());
        self
    }

    pub fn errors_for(&self, field: &str) -> &[String] {
        self.field_errors
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

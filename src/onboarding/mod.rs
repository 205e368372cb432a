//! Onboarding: turn a staged signup email into an account and a login.
//!
//! The flow is a small state machine driven by the session cookie:
//!
//! ```text
//! anonymous --(pending email)----> form presented
//! anonymous --(no pending email)-> redirect to signup
//! form --(submit, invalid)-------> form with errors
//! form --(submit, valid)---------> account created -> redirect, authenticated
//! ```
//!
//! Both entry points take the request's `SessionCookie` by value and hand
//! back what should be committed, if anything. Nothing here touches HTTP.

pub mod form;

use crate::api::auth::{logout, resolve_session};
use crate::api::validation::safe_redirect;
use crate::config::RoutesConfig;
use crate::db::{DuplicateField, NewAccount, StoreError, UserStore};
use crate::session::{Commit, SessionCookie, AUTH_ERROR_KEY, PENDING_EMAIL_KEY, SESSION_ID_KEY};

pub use form::{Intent, OnboardingForm, OnboardingSubmission, SubmissionState};

pub const USERNAME_TAKEN: &str = "A user already exists with this username";
pub const EMAIL_TAKEN: &str = "A user already exists with this email";

#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub to: String,
    pub commit: Option<Commit>,
}

/// Result of opening the onboarding page.
#[derive(Debug)]
pub enum EntryOutcome {
    Redirect(Redirect),
    /// Show the form, with an error flashed by an earlier step
    Present {
        form_error: Option<String>,
        commit: Commit,
    },
}

/// Result of posting the onboarding form.
#[derive(Debug)]
pub enum SubmitOutcome {
    Redirect(Redirect),
    /// Validation-only event; nothing was written
    Idle(SubmissionState),
    /// Final submit rejected; nothing was written
    Invalid(SubmissionState),
}

enum Gate {
    Open(String),
    Closed(Redirect),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Path {
    Read,
    Write,
}

pub struct OnboardingFlow<'a> {
    users: &'a dyn UserStore,
    routes: &'a RoutesConfig,
}

impl<'a> OnboardingFlow<'a> {
    pub fn new(users: &'a dyn UserStore, routes: &'a RoutesConfig) -> Self {
        Self { users, routes }
    }

    /// Page entry: present the form only to an anonymous visitor with a
    /// staged email.
    pub async fn enter(&self, mut cookie: SessionCookie) -> Result<EntryOutcome, StoreError> {
        if let Gate::Closed(redirect) = self.gate(&mut cookie, Path::Read).await? {
            return Ok(EntryOutcome::Redirect(redirect));
        }

        let form_error = cookie.take_message(AUTH_ERROR_KEY);
        Ok(EntryOutcome::Present {
            form_error,
            commit: Commit::session_scoped(cookie),
        })
    }

    /// Form post: validate, and on a final valid submit create the account
    /// and swap the pending email for a login session.
    pub async fn submit(
        &self,
        mut cookie: SessionCookie,
        form: &OnboardingForm,
    ) -> Result<SubmitOutcome, StoreError> {
        let email = match self.gate(&mut cookie, Path::Write).await? {
            Gate::Open(email) => email,
            Gate::Closed(redirect) => return Ok(SubmitOutcome::Redirect(redirect)),
        };

        let validated = form.validate();
        if form.intent() == Intent::Validate {
            let errors = validated.err().unwrap_or_default();
            return Ok(SubmitOutcome::Idle(SubmissionState::new(form, errors)));
        }
        let submission = match validated {
            Ok(submission) => submission,
            Err(errors) => return Ok(SubmitOutcome::Invalid(SubmissionState::new(form, errors))),
        };

        let account = NewAccount {
            email,
            username: submission.username.clone(),
            password: submission.password.clone(),
            name: submission.name.clone(),
            mailing_list_opt_in: submission.agree_to_mailing_list,
        };
        let session = match self.users.create_account(account).await {
            Ok(session) => session,
            Err(StoreError::Duplicate(DuplicateField::Username)) => {
                let mut errors = crate::api::error::FieldErrors::new();
                errors.insert(form::USERNAME.to_string(), vec![USERNAME_TAKEN.to_string()]);
                return Ok(SubmitOutcome::Invalid(SubmissionState::new(form, errors)));
            }
            Err(StoreError::Duplicate(DuplicateField::Email)) => {
                let state = SubmissionState::new(form, Default::default()).with_form_error(EMAIL_TAKEN);
                return Ok(SubmitOutcome::Invalid(state));
            }
            Err(e) => return Err(e),
        };

        cookie.set(SESSION_ID_KEY, session.id);
        cookie.unset(PENDING_EMAIL_KEY);

        Ok(SubmitOutcome::Redirect(Redirect {
            to: safe_redirect(submission.redirect_to.as_deref(), &self.routes.landing),
            commit: Some(Commit {
                cookie,
                expires: submission.remember.then_some(session.expiration_date),
            }),
        }))
    }

    /// Preconditions shared by both paths. Yields the pending email when
    /// onboarding may continue.
    async fn gate(&self, cookie: &mut SessionCookie, path: Path) -> Result<Gate, StoreError> {
        if let Some(user) = resolve_session(self.users, cookie).await? {
            if cookie.pending_email().is_some() {
                // Logged in and mid-signup at once: trust neither
                tracing::warn!(
                    user_id = %user.id,
                    "Authenticated session conflicts with pending signup, logging out"
                );
                logout(self.users, cookie).await?;
                cookie.unset(PENDING_EMAIL_KEY);
                return Ok(Gate::Closed(self.restart(cookie)));
            }
            if path == Path::Read {
                return Ok(Gate::Closed(Redirect {
                    to: self.routes.landing.clone(),
                    commit: None,
                }));
            }
        }

        let Some(email) = cookie.pending_email().map(str::to_owned) else {
            return Ok(Gate::Closed(self.restart(cookie)));
        };

        if self.users.email_exists(&email).await? {
            tracing::warn!(email = %email, "Pending signup email is already registered");
            cookie.unset(PENDING_EMAIL_KEY);
            return Ok(Gate::Closed(self.restart(cookie)));
        }

        Ok(Gate::Open(email))
    }

    /// Send the visitor back to signup, committing any cleanup.
    fn restart(&self, cookie: &SessionCookie) -> Redirect {
        Redirect {
            to: self.routes.signup.clone(),
            commit: cookie
                .is_modified()
                .then(|| Commit::session_scoped(cookie.clone())),
        }
    }
}

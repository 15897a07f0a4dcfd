//! Shopper identity: email availability, guest email, account creation.

use std::sync::atomic::Ordering;

use secrecy::{ExposeSecret, SecretString};
use tillpoint_core::Email;
use tracing::{Instrument, debug, instrument, warn};

use super::{CheckoutOrchestrator, Outcome};
use crate::error::{CheckoutError, Result};
use crate::gateway::{AccountCreation, AccountInput};
use crate::state::Notification;

pub(crate) const ACCOUNT_CREATED_MESSAGE: &str = "Your account has been created successfully!";
pub(crate) const CONFIRMATION_REQUIRED_MESSAGE: &str =
    "You need to confirm your account. Please check your email.";

impl CheckoutOrchestrator {
    /// Whether the last completed availability check found the email free.
    ///
    /// `true` until a check says otherwise.
    #[must_use]
    pub fn is_email_available(&self) -> bool {
        self.email_available.load(Ordering::Relaxed)
    }

    /// Record an email edit and schedule a debounced availability check.
    ///
    /// Edits within the quiet period replace the pending check, so only the
    /// latest value is sent to the gateway.
    #[instrument(skip_all, fields(session_id = %self.session.id))]
    pub fn on_email_change(&mut self, email: String) -> Outcome {
        if self.session.email == email {
            return Outcome::Unchanged;
        }
        self.session.email = email;

        if !self.session.email.is_empty() && self.session.is_visible_email_required {
            self.on_change_email_required();
        }

        let email = self.session.email.clone();
        self.schedule_email_check(email);
        Outcome::Unchanged
    }

    pub(super) fn schedule_email_check(&mut self, raw: String) {
        if let Some(pending) = self.email_check.take() {
            pending.abort();
        }

        let Ok(email) = Email::parse(&raw) else {
            debug!("Skipping availability check for an incomplete email");
            return;
        };

        let gateway = self.services.gateway.clone();
        let state = self.services.state.clone();
        let available = self.email_available.clone();
        let debounce = self.settings.email_debounce;
        let span = tracing::debug_span!("email_check", session_id = %self.session.id);

        let task = async move {
            tokio::time::sleep(debounce).await;
            match gateway.is_email_available(&email).await {
                Ok(is_available) => {
                    available.store(is_available, Ordering::Relaxed);
                    if !is_available {
                        state.update_email(&raw);
                    }
                }
                Err(e) => warn!(error = %e, "Email availability check failed"),
            }
        };
        self.email_check = Some(tokio::spawn(task.instrument(span)));
    }

    /// Show the "email required" hint exactly when the email is empty.
    pub fn on_change_email_required(&mut self) -> Outcome {
        self.session.is_visible_email_required = self.session.email.is_empty();
        Outcome::Unchanged
    }

    pub fn on_create_user_change(&mut self) -> Outcome {
        self.session.is_create_user = !self.session.is_create_user;
        Outcome::Unchanged
    }

    /// Store the password for account creation. Empty clears it.
    pub fn on_password_change(&mut self, password: String) -> Outcome {
        self.session.password = (!password.is_empty()).then(|| SecretString::from(password));
        Outcome::Unchanged
    }

    /// Guest identity step before leaving shipping (or billing, for a
    /// virtual cart).
    ///
    /// Returns `Some(outcome)` when the submission must stop; loading is
    /// cleared in that case and on error.
    pub(super) async fn guard_guest(&mut self) -> Result<Option<Outcome>> {
        let result = if self.session.is_create_user && self.is_email_available() {
            self.create_account().await
        } else {
            self.save_guest_email().await
        };

        match result {
            Ok(None) => Ok(None),
            Ok(Some(outcome)) => {
                self.session.is_loading = false;
                Ok(Some(outcome))
            }
            Err(e) => {
                self.session.is_loading = false;
                Err(e)
            }
        }
    }

    async fn create_account(&mut self) -> Result<Option<Outcome>> {
        let email = Email::parse(&self.session.email)?;
        let password = self
            .session
            .password
            .clone()
            .filter(|p| !p.expose_secret().is_empty())
            .ok_or_else(|| CheckoutError::invalid("a password is required to create an account"))?;

        let account = AccountInput {
            email,
            firstname: self.session.shipping_address.firstname.clone(),
            lastname: self.session.shipping_address.lastname.clone(),
            password,
            is_subscribed: false,
        };

        match self.services.gateway.create_account(&account).await {
            Ok(AccountCreation::SignedIn) => {
                self.notify(Notification::success(ACCOUNT_CREATED_MESSAGE));
                self.customer.signed_in = true;
                self.customer.email = Some(account.email.as_str().to_string());
                Ok(None)
            }
            Ok(AccountCreation::ConfirmationRequired) => {
                self.notify(Notification::info(CONFIRMATION_REQUIRED_MESSAGE));
                Ok(Some(self.redirect_to_login()))
            }
            Err(e) => Ok(Some(self.fail("create_account", &e))),
        }
    }

    async fn save_guest_email(&mut self) -> Result<Option<Outcome>> {
        if self.session.email.is_empty() {
            self.session.is_visible_email_required = true;
            return Ok(Some(Outcome::Unchanged));
        }

        let email = Email::parse(&self.session.email)?;
        let cart_id = self.require_cart_id()?;

        self.services.state.update_email(email.as_str());

        match self.services.gateway.save_guest_email(&cart_id, &email).await {
            Ok(()) => {
                self.session.is_guest_email_saved = true;
                Ok(None)
            }
            Err(e) => Ok(Some(self.fail("save_guest_email", &e))),
        }
    }
}

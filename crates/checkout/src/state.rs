//! Shared application state the checkout writes to.
//!
//! The storefront owns notifications, the cart and the customer form
//! values; the checkout only pushes changes through [`SharedState`].

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Severity of a shopper-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Error,
    Info,
    Success,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
        }
    }
}

/// A message for the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }
}

/// Sink for state owned outside the checkout.
///
/// Called from spawned tasks (the debounced email check), hence `Send + Sync`.
pub trait SharedState: Send + Sync {
    /// Show a message to the shopper.
    fn notify(&self, notification: Notification);

    /// Re-push the email the checkout holds as the authoritative value.
    fn update_email(&self, email: &str);

    /// Forget the current cart after an order is placed.
    fn reset_cart(&self);

    /// Show or hide the page breadcrumbs.
    fn set_breadcrumbs_enabled(&self, enabled: bool);

    /// Drop the selected pickup store.
    fn clear_pickup_store(&self);
}

/// One call recorded by [`EventLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StateEvent {
    Notified(Notification),
    EmailUpdated { email: String },
    CartReset,
    BreadcrumbsEnabled { enabled: bool },
    PickupStoreCleared,
}

/// [`SharedState`] that records every call and logs it.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<StateEvent>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<StateEvent> {
        self.lock().clone()
    }

    /// Recorded notifications only.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                StateEvent::Notified(notification) => Some(notification.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StateEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: StateEvent) {
        self.lock().push(event);
    }
}

impl SharedState for EventLog {
    fn notify(&self, notification: Notification) {
        tracing::info!(
            kind = %notification.kind,
            message = %notification.message,
            "notification"
        );
        self.record(StateEvent::Notified(notification));
    }

    fn update_email(&self, email: &str) {
        tracing::debug!("email re-pushed to shared state");
        self.record(StateEvent::EmailUpdated {
            email: email.to_string(),
        });
    }

    fn reset_cart(&self) {
        tracing::debug!("cart reset");
        self.record(StateEvent::CartReset);
    }

    fn set_breadcrumbs_enabled(&self, enabled: bool) {
        self.record(StateEvent::BreadcrumbsEnabled { enabled });
    }

    fn clear_pickup_store(&self) {
        self.record(StateEvent::PickupStoreCleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_records_in_order() {
        let log = EventLog::new();
        log.set_breadcrumbs_enabled(false);
        log.notify(Notification::error("Something went wrong!"));
        log.reset_cart();
        log.notify(Notification::info("Signed in"));

        assert_eq!(log.events().len(), 4);
        assert_eq!(
            log.events().first(),
            Some(&StateEvent::BreadcrumbsEnabled { enabled: false })
        );
        assert_eq!(
            log.notifications(),
            vec![
                Notification::error("Something went wrong!"),
                Notification::info("Signed in"),
            ]
        );
    }

    #[test]
    fn test_state_event_serializes_tagged() {
        let json = serde_json::to_value(StateEvent::EmailUpdated {
            email: "a@b.co".to_string(),
        })
        .unwrap_or_default();
        assert_eq!(json["event"], "email_updated");
        assert_eq!(json["email"], "a@b.co");
    }
}

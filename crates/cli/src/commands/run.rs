//! Scripted checkout command.
//!
//! Mounts a checkout against the configured GraphQL gateway, the file
//! cache, an in-memory history and a recording shared state, then replays
//! the script's actions in order.
//!
//! # Script format
//!
//! ```yaml
//! start_path: /checkout/shipping
//! context:
//!   cart: { cart_id: abc123, items_count: 2 }
//!   customer: { signed_in: false }
//!   countries:
//!     - id: US
//!       available_regions: [{ id: 5, code: CA, name: California }]
//! actions:
//!   - { action: change_email, email: guest@example.com }
//!   - { action: pause, millis: 1200 }
//! ```
//!
//! # Environment Variables
//!
//! See `CheckoutConfig::from_env`; `CHECKOUT_GATEWAY_URL` is required.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tillpoint_checkout::cache::FileCache;
use tillpoint_checkout::config::CheckoutConfig;
use tillpoint_checkout::gateway::GraphQLGateway;
use tillpoint_checkout::navigation::HistoryNavigator;
use tillpoint_checkout::state::{EventLog, StateEvent};
use tillpoint_checkout::{
    CheckoutAction, CheckoutContext, CheckoutOrchestrator, CheckoutSession, Outcome, Services,
};
use tracing::{info, warn};

use super::{CommandError, print_json, read_yaml};

/// A checkout to replay.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutScript {
    /// URL the checkout is opened at
    #[serde(default = "default_start_path")]
    pub start_path: String,
    #[serde(default)]
    pub context: CheckoutContext,
    #[serde(default)]
    pub actions: Vec<CheckoutAction>,
}

fn default_start_path() -> String {
    "/checkout/shipping".to_string()
}

/// What the replay produced, printed as JSON.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub mounted: Outcome,
    pub outcomes: Vec<StepReport>,
    pub session: CheckoutSession,
    pub history: Vec<String>,
    pub events: Vec<StateEvent>,
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub action: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Replay the script at `path` and print the report.
///
/// # Errors
///
/// Returns an error if configuration is missing, the script cannot be read,
/// or an action is rejected by input validation. Gateway failures are part
/// of the report, not errors.
pub async fn replay(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = CheckoutConfig::from_env()?;
    let script: CheckoutScript = read_yaml(path).await?;

    info!(
        path = %path.display(),
        actions = script.actions.len(),
        gateway = %config.gateway.endpoint,
        "Replaying checkout script"
    );

    let navigator = Arc::new(HistoryNavigator::new(script.start_path.clone()));
    let events = Arc::new(EventLog::new());
    let services = Services {
        gateway: Arc::new(GraphQLGateway::new(&config.gateway)),
        cache: Arc::new(FileCache::new(&config.cache_path)),
        navigator: navigator.clone(),
        state: events.clone(),
    };

    let report = execute(script, services, config, &navigator, &events).await?;
    print_json(&report)
}

async fn execute(
    script: CheckoutScript,
    services: Services,
    config: CheckoutConfig,
    navigator: &HistoryNavigator,
    events: &EventLog,
) -> Result<RunReport, CommandError> {
    let (mut checkout, mounted) =
        CheckoutOrchestrator::mount(services, config.settings, script.context).await;

    let mut outcomes = Vec::with_capacity(script.actions.len());
    for (index, action) in script.actions.into_iter().enumerate() {
        let name = action.name();
        let outcome = checkout
            .handle(action)
            .await
            .map_err(|source| CommandError::ActionRejected {
                index,
                name,
                source,
            })?;

        if let Outcome::Failed { message } = &outcome {
            warn!(index, action = name, message = %message, "Action failed");
        }
        outcomes.push(StepReport {
            action: name,
            outcome,
        });
    }

    for outcome in checkout.settle_estimates().await {
        outcomes.push(StepReport {
            action: "settle_estimates",
            outcome,
        });
    }

    let session = checkout.unmount();
    info!(step = %session.step, order_id = ?session.order_id, "Checkout script finished");

    Ok(RunReport {
        mounted,
        outcomes,
        session,
        history: navigator.history(),
        events: events.events(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const GUEST_SCRIPT: &str = include_str!("../../scripts/guest-checkout.yaml");

    #[test]
    fn test_sample_script_parses() {
        let script: CheckoutScript = serde_yaml::from_str(GUEST_SCRIPT).unwrap();
        assert_eq!(script.start_path, "/checkout/shipping");
        assert_eq!(script.context.cart.items_count, 2);
        assert!(!script.context.countries.is_empty());
        assert_eq!(
            script.actions.first().map(CheckoutAction::name),
            Some("change_email")
        );
        assert_eq!(
            script.actions.last().map(CheckoutAction::name),
            Some("save_payment_information")
        );
    }

    #[test]
    fn test_minimal_script_uses_defaults() {
        let script: CheckoutScript = serde_yaml::from_str("actions: []").unwrap();
        assert_eq!(script.start_path, "/checkout/shipping");
        assert!(script.context.cart.minimum_order_amount_reached);
        assert!(script.actions.is_empty());
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, warn};

use super::repository::{ResourceInventory, SubscriptionStore};
use super::service::{ExpiryOutcome, SubscriptionService, SubscriptionServiceError, SweepReport};
use crate::notifications::{NotificationDispatch, PushGateway};

const DOWNGRADE_TITLE: &str = "Subscription expired";

/// Periodic expiry pass over all active subscriptions.
pub struct ExpirySweeper<S, I> {
    service: Arc<SubscriptionService<S, I>>,
    interval: Duration,
    notifier: Option<Arc<dyn PushGateway>>,
}

impl<S, I> ExpirySweeper<S, I>
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    pub fn new(service: Arc<SubscriptionService<S, I>>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn PushGateway>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One sweep; downgraded users get a push when a gateway is configured.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport, SubscriptionServiceError> {
        let report = self.service.sweep_expired(now)?;

        if let Some(notifier) = &self.notifier {
            for outcome in &report.expired {
                let dispatch = downgrade_notice(outcome);
                if let Err(err) = notifier.send(&dispatch).await {
                    warn!(user_id = %outcome.user_id.0, error = %err, "downgrade notification failed");
                }
            }
        }

        Ok(report)
    }

    /// Runs `run_once` every interval until the runtime shuts down.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = self.run_once(Utc::now()).await {
                    error!(error = %err, "subscription expiry sweep failed");
                }
            }
        })
    }
}

fn downgrade_notice(outcome: &ExpiryOutcome) -> NotificationDispatch {
    let mut message =
        "Your subscription has expired and your account is back on the free plan.".to_string();
    let deactivated = outcome.total_deactivated();
    if deactivated > 0 {
        message.push_str(&format!(
            " {deactivated} item(s) above the free plan limits were deactivated."
        ));
    }
    NotificationDispatch::to_users(vec![outcome.user_id.0.clone()], DOWNGRADE_TITLE, &message)
}

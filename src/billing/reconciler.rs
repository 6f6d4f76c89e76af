//! # Payment State Reconciler
//!
//! Applies verified payment events to `users.subscription_status`. Every
//! mutation is an absolute assignment, so redelivered or reordered events
//! converge on the same state.

use std::sync::Arc;

use tracing::{info, warn};

use super::errors::BillingResult;
use super::events::{PaymentEvent, PaymentEventKind};
use crate::auth::{SubscriptionStatus, UserRepository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied {
        user_id: i64,
        status: SubscriptionStatus,
    },
    /// Correlation key named a user we do not have
    UserNotFound { correlation_key: String },
    /// Event carried no usable correlation key
    MissingCorrelation,
    /// Event type we do not act on
    Ignored { event_type: String },
}

pub struct PaymentReconciler<U: UserRepository> {
    users: Arc<U>,
}

impl<U: UserRepository> Clone for PaymentReconciler<U> {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
        }
    }
}

impl<U: UserRepository> PaymentReconciler<U> {
    pub fn new(users: Arc<U>) -> Self {
        Self { users }
    }

    /// Apply one event. Only call this with events whose signature was verified.
    pub fn apply(&self, event: &PaymentEvent) -> BillingResult<ReconcileOutcome> {
        let status = match &event.kind {
            PaymentEventKind::Completed => SubscriptionStatus::Paid,
            PaymentEventKind::Canceled => SubscriptionStatus::Free,
            PaymentEventKind::Unknown(event_type) => {
                info!(event_type = %event_type, "ignoring payment event");
                return Ok(ReconcileOutcome::Ignored {
                    event_type: event_type.clone(),
                });
            }
        };

        let Some(key) = event.correlation_key.clone() else {
            warn!(event_type = event.event_type(), event_id = ?event.id, "payment event without user reference");
            return Ok(ReconcileOutcome::MissingCorrelation);
        };

        let Some(user_id) = event.user_id() else {
            warn!(correlation_key = %key, "payment event user reference is not a user id");
            return Ok(ReconcileOutcome::UserNotFound { correlation_key: key });
        };

        if !self.users.set_subscription_status(user_id, status)? {
            warn!(user_id, event_type = event.event_type(), "payment event for unknown user");
            return Ok(ReconcileOutcome::UserNotFound { correlation_key: key });
        }

        info!(user_id, status = %status, event_type = event.event_type(), "subscription updated");
        Ok(ReconcileOutcome::Applied { user_id, status })
    }
}

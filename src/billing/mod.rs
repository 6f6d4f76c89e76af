//! # Billing
//!
//! Checkout initiation and the webhook path that keeps
//! `users.subscription_status` in step with the payment provider.

pub mod errors;
pub mod events;
pub mod webhook;
pub mod reconciler;
pub mod provider;
pub mod service;

pub use errors::{BillingError, BillingResult};
pub use events::{PaymentEvent, PaymentEventKind};
pub use webhook::{WebhookVerifier, SIGNATURE_HEADER};
pub use reconciler::{PaymentReconciler, ReconcileOutcome};
pub use provider::{
    CheckoutProvider, CheckoutSession, DisabledCheckout, SimulatedCheckout, StripeCheckout,
    StripeSettings, STRIPE_API_BASE,
};
pub use service::{BillingService, CheckoutResponse};

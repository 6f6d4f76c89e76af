//! # Checkout Providers
//!
//! One provider is selected at startup: Stripe when a key and price are
//! configured, the simulated provider when payments are simulated, and the
//! disabled provider otherwise.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::errors::{BillingError, BillingResult};
use crate::auth::User;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Where the user goes to pay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutSession {
    /// Hosted payment page
    Redirect { checkout_url: String },
    /// No real payment; the caller marks the user paid directly
    Simulated,
}

#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn start_checkout(&self, user: &User) -> BillingResult<CheckoutSession>;
}

/// Stripe connection settings
#[derive(Debug, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub price_id: String,
    pub frontend_url: String,
    pub connect_account_id: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Stripe Checkout in subscription mode
#[derive(Debug, Clone)]
pub struct StripeCheckout {
    client: reqwest::Client,
    settings: StripeSettings,
}

impl StripeCheckout {
    pub fn new(settings: StripeSettings) -> BillingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, settings })
    }

    /// Form fields for session creation. The user id rides along in three
    /// places so both checkout and subscription events can be correlated.
    fn session_form(&self, user: &User) -> Vec<(String, String)> {
        let frontend = self.settings.frontend_url.trim_end_matches('/');
        let user_id = user.id.to_string();
        vec![
            ("mode".into(), "subscription".into()),
            ("line_items[0][price]".into(), self.settings.price_id.clone()),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "success_url".into(),
                format!("{}/billing/success?session_id={{CHECKOUT_SESSION_ID}}", frontend),
            ),
            ("cancel_url".into(), format!("{}/billing/cancel", frontend)),
            ("customer_email".into(), user.email.clone()),
            ("client_reference_id".into(), user_id.clone()),
            ("metadata[user_id]".into(), user_id.clone()),
            ("subscription_data[metadata][user_id]".into(), user_id),
        ]
    }
}

#[async_trait]
impl CheckoutProvider for StripeCheckout {
    async fn start_checkout(&self, user: &User) -> BillingResult<CheckoutSession> {
        let url = format!(
            "{}/v1/checkout/sessions",
            self.settings.api_base.trim_end_matches('/')
        );
        let mut request = self
            .client
            .post(url)
            .bearer_auth(&self.settings.secret_key)
            .form(&self.session_form(user));
        if let Some(account) = &self.settings.connect_account_id {
            request = request.header("Stripe-Account", account);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            warn!(user_id = user.id, status = status.as_u16(), "checkout session rejected");
            return Err(BillingError::Provider(message));
        }

        let session: SessionResponse = response.json().await?;
        let checkout_url = session
            .url
            .ok_or_else(|| BillingError::Provider("checkout session has no url".into()))?;
        debug!(user_id = user.id, "checkout session created");
        Ok(CheckoutSession::Redirect { checkout_url })
    }
}

/// Development stand-in: every checkout succeeds immediately
#[derive(Debug, Default, Clone)]
pub struct SimulatedCheckout;

#[async_trait]
impl CheckoutProvider for SimulatedCheckout {
    async fn start_checkout(&self, _user: &User) -> BillingResult<CheckoutSession> {
        Ok(CheckoutSession::Simulated)
    }
}

/// Payments switched off
#[derive(Debug, Default, Clone)]
pub struct DisabledCheckout;

#[async_trait]
impl CheckoutProvider for DisabledCheckout {
    async fn start_checkout(&self, _user: &User) -> BillingResult<CheckoutSession> {
        Err(BillingError::NotConfigured("Payments".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, SubscriptionStatus};
    use chrono::Utc;

    fn user() -> User {
        User {
            id: 31,
            email: "buyer@example.com".to_string(),
            password_hash: String::new(),
            role: Role::User,
            subscription_status: SubscriptionStatus::Free,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_session_form_carries_correlation_key() {
        let stripe = StripeCheckout::new(StripeSettings {
            secret_key: "sk_test".to_string(),
            price_id: "price_123".to_string(),
            frontend_url: "https://papers.example.com/".to_string(),
            connect_account_id: None,
            api_base: STRIPE_API_BASE.to_string(),
        })
        .unwrap();

        let form = stripe.session_form(&user());
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());

        assert_eq!(get("metadata[user_id]"), Some("31"));
        assert_eq!(get("subscription_data[metadata][user_id]"), Some("31"));
        assert_eq!(get("client_reference_id"), Some("31"));
        assert_eq!(get("line_items[0][price]"), Some("price_123"));
        assert_eq!(get("cancel_url"), Some("https://papers.example.com/billing/cancel"));
    }

    #[tokio::test]
    async fn test_simulated_and_disabled() {
        assert_eq!(
            SimulatedCheckout.start_checkout(&user()).await.unwrap(),
            CheckoutSession::Simulated
        );
        assert!(matches!(
            DisabledCheckout.start_checkout(&user()).await,
            Err(BillingError::NotConfigured(_))
        ));
    }
}

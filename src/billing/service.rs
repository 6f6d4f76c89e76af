//! Checkout and webhook handling on top of the provider, verifier and reconciler.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::errors::{BillingError, BillingResult};
use super::events::PaymentEvent;
use super::provider::{CheckoutProvider, CheckoutSession};
use super::reconciler::{PaymentReconciler, ReconcileOutcome};
use super::webhook::WebhookVerifier;
use crate::auth::{SubscriptionStatus, User, UserRepository};

/// Body of a successful `POST /billing/checkout`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CheckoutResponse {
    Redirect {
        checkout_url: String,
    },
    Simulated {
        simulated: bool,
        subscription_status: SubscriptionStatus,
    },
}

pub struct BillingService<U: UserRepository> {
    provider: Arc<dyn CheckoutProvider>,
    verifier: Option<WebhookVerifier>,
    reconciler: PaymentReconciler<U>,
}

impl<U: UserRepository + 'static> BillingService<U> {
    pub fn new(
        provider: Arc<dyn CheckoutProvider>,
        verifier: Option<WebhookVerifier>,
        reconciler: PaymentReconciler<U>,
    ) -> Self {
        Self {
            provider,
            verifier,
            reconciler,
        }
    }

    /// Start a checkout. The simulated provider upgrades the user on the spot,
    /// through the same reconciler path a real webhook would take.
    pub async fn checkout(&self, user: &User) -> BillingResult<CheckoutResponse> {
        match self.provider.start_checkout(user).await? {
            CheckoutSession::Redirect { checkout_url } => {
                Ok(CheckoutResponse::Redirect { checkout_url })
            }
            CheckoutSession::Simulated => {
                let reconciler = self.reconciler.clone();
                let event = PaymentEvent::completed(user.id);
                let outcome = tokio::task::spawn_blocking(move || reconciler.apply(&event))
                    .await
                    .map_err(|e| BillingError::Provider(format!("simulated checkout failed: {}", e)))??;

                info!(user_id = user.id, outcome = ?outcome, "simulated checkout");
                Ok(CheckoutResponse::Simulated {
                    simulated: true,
                    subscription_status: SubscriptionStatus::Paid,
                })
            }
        }
    }

    /// Verify and apply a webhook delivery. `now` is unix seconds.
    pub async fn handle_webhook(
        &self,
        payload: Vec<u8>,
        signature: Option<String>,
        now: i64,
    ) -> BillingResult<ReconcileOutcome> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| BillingError::NotConfigured("Webhook".to_string()))?;
        verifier.verify(&payload, signature.as_deref(), now)?;

        let event = PaymentEvent::parse(&payload)?;
        let reconciler = self.reconciler.clone();
        tokio::task::spawn_blocking(move || reconciler.apply(&event))
            .await
            .map_err(|e| BillingError::Provider(format!("webhook processing failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::crypto::PasswordPolicy;
    use crate::auth::user::NewUser;
    use crate::auth::{Role, SqliteUserRepository};
    use crate::billing::provider::{DisabledCheckout, SimulatedCheckout};
    use crate::store::Database;
    use tempfile::TempDir;

    fn setup(
        provider: Arc<dyn CheckoutProvider>,
        secret: Option<&str>,
    ) -> (TempDir, Arc<SqliteUserRepository>, User, BillingService<SqliteUserRepository>) {
        let temp = TempDir::new().unwrap();
        let repo = Arc::new(SqliteUserRepository::new(
            Database::open(temp.path().join("billing.db")).unwrap(),
        ));
        let user = repo
            .create(&NewUser::new("b@example.com", "password1", Role::User, &PasswordPolicy::default()).unwrap())
            .unwrap();
        let service = BillingService::new(
            provider,
            secret.map(WebhookVerifier::new),
            PaymentReconciler::new(repo.clone()),
        );
        (temp, repo, user, service)
    }

    #[tokio::test]
    async fn test_simulated_checkout_marks_paid() {
        let (_temp, repo, user, service) = setup(Arc::new(SimulatedCheckout), None);

        let response = service.checkout(&user).await.unwrap();
        assert_eq!(
            response,
            CheckoutResponse::Simulated {
                simulated: true,
                subscription_status: SubscriptionStatus::Paid
            }
        );
        assert!(repo.find_by_id(user.id).unwrap().unwrap().is_paid());
    }

    #[tokio::test]
    async fn test_disabled_checkout_is_not_configured() {
        let (_temp, _repo, user, service) = setup(Arc::new(DisabledCheckout), None);
        assert!(matches!(
            service.checkout(&user).await,
            Err(BillingError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_webhook_requires_secret() {
        let (_temp, _repo, _user, service) = setup(Arc::new(DisabledCheckout), None);
        assert!(matches!(
            service.handle_webhook(b"{}".to_vec(), None, 0).await,
            Err(BillingError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_signed_webhook_applies() {
        let (_temp, repo, user, service) = setup(Arc::new(DisabledCheckout), Some("whsec_1"));
        let payload = format!(
            r#"{{"type":"checkout.session.completed","data":{{"object":{{"metadata":{{"user_id":"{}"}}}}}}}}"#,
            user.id
        )
        .into_bytes();
        let now = 1_700_000_000;
        let header = WebhookVerifier::new("whsec_1").sign(&payload, now);

        let outcome = service
            .handle_webhook(payload.clone(), Some(header), now)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Applied { .. }));
        assert!(repo.find_by_id(user.id).unwrap().unwrap().is_paid());

        assert!(matches!(
            service.handle_webhook(payload, Some("t=1,v1=00".to_string()), now).await,
            Err(BillingError::InvalidSignature(_))
        ));
    }
}

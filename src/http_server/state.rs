//! Shared handler state
//!
//! Built once from [`AppConfig`]. Optional integrations are chosen here and
//! nowhere else: S3 or local uploads, Stripe, simulated or disabled checkout,
//! SMTP or no-op mail.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::access::AccessService;
use crate::audit::{spawn_audit_worker, AuditLog, SqliteAuditLog, DEFAULT_QUEUE_CAPACITY};
use crate::auth::crypto::PasswordPolicy;
use crate::auth::{AuthService, JwtConfig, SqliteUserRepository};
use crate::billing::{
    BillingError, BillingService, CheckoutProvider, DisabledCheckout, PaymentReconciler,
    SimulatedCheckout, StripeCheckout, StripeSettings, WebhookVerifier, STRIPE_API_BASE,
};
use crate::config::AppConfig;
use crate::documents::DocumentService;
use crate::entitlement::EntitlementEngine;
use crate::feedback::FeedbackRepository;
use crate::file_storage::{
    LocalStore, RemoteStore, S3Credentials, S3Signer, S3Store, StorageError, StorageResolver,
};
use crate::notify::{spawn_notifier, MailError, Mailer, NoopMailer, Notifier, SmtpMailer, SmtpSettings};
use crate::store::Database;

/// Failures while wiring components at startup
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("billing setup failed: {0}")]
    Billing(#[from] BillingError),

    #[error("email setup failed: {0}")]
    Mail(#[from] MailError),
}

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub auth: AuthService<SqliteUserRepository>,
    pub documents: DocumentService,
    pub access: AccessService,
    pub billing: BillingService<SqliteUserRepository>,
    pub feedback: FeedbackRepository,
    pub notifier: Notifier,
    pub free_doc_limit: u32,
}

impl AppState {
    /// Wire every component from configuration. Spawns the audit and
    /// notification workers, so it must run inside a tokio runtime.
    pub fn from_config(config: &AppConfig, db: Database) -> Result<Self, StartupError> {
        let mailer: Arc<dyn Mailer> = match &config.email.smtp {
            Some(smtp) => {
                info!(host = %smtp.smtp_host, port = smtp.smtp_port, "smtp mailer enabled");
                Arc::new(SmtpMailer::new(&SmtpSettings {
                    host: smtp.smtp_host.clone(),
                    port: smtp.smtp_port,
                    user: smtp.smtp_user.clone(),
                    password: smtp.smtp_password.clone(),
                    from_email: smtp.from_email.clone(),
                })?)
            }
            None => Arc::new(NoopMailer),
        };
        Self::with_mailer(config, db, mailer)
    }

    /// Same as [`AppState::from_config`] with an explicit mailer.
    pub fn with_mailer(
        config: &AppConfig,
        db: Database,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, StartupError> {
        let users = Arc::new(SqliteUserRepository::new(db.clone()));

        let auth = AuthService::new(
            users.clone(),
            JwtConfig {
                secret: config.auth.jwt_secret.clone(),
                access_token_ttl: chrono::Duration::minutes(config.auth.access_token_ttl_minutes),
                issuer: config.auth.issuer.clone(),
                audience: config.auth.audience.clone(),
            },
            PasswordPolicy {
                min_length: config.auth.min_password_length,
            },
            config.auth.admin_email.clone(),
        );

        let storage = build_storage(config)?;
        let (notifier, _notify_worker) =
            spawn_notifier(mailer, config.email.notify_email.clone());

        let audit_log: Arc<dyn AuditLog> = Arc::new(SqliteAuditLog::new(db.clone()));
        let (audit, _audit_worker) = spawn_audit_worker(audit_log, DEFAULT_QUEUE_CAPACITY);

        let engine = EntitlementEngine::new(config.quota.free_doc_limit);
        let billing = BillingService::new(
            build_checkout(config)?,
            config
                .billing
                .stripe
                .as_ref()
                .and_then(|s| s.webhook_secret.clone())
                .map(WebhookVerifier::new),
            PaymentReconciler::new(users),
        );

        Ok(Self {
            auth,
            documents: DocumentService::new(db.clone(), storage.clone(), notifier.clone()),
            access: AccessService::new(db.clone(), engine, storage, audit),
            billing,
            feedback: FeedbackRepository::new(db),
            notifier,
            free_doc_limit: config.quota.free_doc_limit,
        })
    }
}

fn build_storage(config: &AppConfig) -> Result<StorageResolver, StartupError> {
    let local = LocalStore::new(config.storage.upload_dir.clone());

    let remote: Option<Arc<dyn RemoteStore>> = match &config.storage.s3 {
        Some(s3) => {
            let signer = S3Signer::new(
                s3.bucket.clone(),
                s3.region.clone(),
                s3.endpoint.as_deref(),
                S3Credentials {
                    access_key_id: s3.access_key_id.clone(),
                    secret_access_key: s3.secret_access_key.clone(),
                    session_token: s3.session_token.clone(),
                },
            )?;
            info!(bucket = %s3.bucket, region = %s3.region, "s3 storage enabled");
            Some(Arc::new(S3Store::new(signer)?))
        }
        None => {
            info!(dir = %config.storage.upload_dir.display(), "local storage enabled");
            None
        }
    };

    Ok(StorageResolver::new(
        local,
        remote,
        config.storage.download_url_expiry_secs,
    ))
}

fn build_checkout(config: &AppConfig) -> Result<Arc<dyn CheckoutProvider>, StartupError> {
    if let Some(stripe) = &config.billing.stripe {
        info!("stripe checkout enabled");
        return Ok(Arc::new(StripeCheckout::new(StripeSettings {
            secret_key: stripe.secret_key.clone(),
            price_id: stripe.price_id.clone(),
            frontend_url: config.billing.frontend_url.clone(),
            connect_account_id: stripe.connect_account_id.clone(),
            api_base: STRIPE_API_BASE.to_string(),
        })?));
    }

    if config.billing.simulate_payments {
        info!("simulated checkout enabled");
        Ok(Arc::new(SimulatedCheckout))
    } else {
        Ok(Arc::new(DisabledCheckout))
    }
}

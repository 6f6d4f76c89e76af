//! # Notifications
//!
//! Upload and feedback emails, rendered here and delivered by a background
//! worker so a slow mail server never holds up a request. Delivery failures
//! are logged and forgotten.

pub mod mailer;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use mailer::{EmailMessage, MailError, Mailer, MockMailer, NoopMailer, SmtpMailer, SmtpSettings};

const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Something worth emailing about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    UploadReceived {
        document_id: i64,
        title: String,
        course_code: String,
        kind: String,
        uploader_email: String,
    },
    FeedbackReceived {
        message: String,
        document_id: Option<i64>,
        /// Account email, or the free-text contact for anonymous feedback
        sender: Option<String>,
    },
}

impl Notification {
    /// Render to the admin inbox (if any) and the originating user.
    pub fn render(&self, admin_email: Option<&str>) -> Vec<EmailMessage> {
        let mut messages = Vec::new();

        match self {
            Notification::UploadReceived {
                document_id,
                title,
                course_code,
                kind,
                uploader_email,
            } => {
                if let Some(admin) = admin_email {
                    messages.push(EmailMessage {
                        to: admin.to_string(),
                        subject: "New past paper awaiting approval".to_string(),
                        body: format!(
                            "Title: {}\nCourse: {}\nType: {}\nUploader: {}\nDoc ID: {}",
                            title, course_code, kind, uploader_email, document_id
                        ),
                    });
                }
                messages.push(EmailMessage {
                    to: uploader_email.clone(),
                    subject: "Thanks for your submission".to_string(),
                    body: format!(
                        "We received your upload '{}'. The admin will review it soon.",
                        title
                    ),
                });
            }
            Notification::FeedbackReceived {
                message,
                document_id,
                sender,
            } => {
                if let Some(admin) = admin_email {
                    let document = document_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "none".to_string());
                    messages.push(EmailMessage {
                        to: admin.to_string(),
                        subject: "New feedback received".to_string(),
                        body: format!(
                            "From: {}\nMessage: {}\nDocument ID: {}",
                            sender.as_deref().unwrap_or("anonymous"),
                            message,
                            document
                        ),
                    });
                }
                if let Some(address) = sender.as_ref().filter(|s| s.contains('@')) {
                    messages.push(EmailMessage {
                        to: address.clone(),
                        subject: "We received your feedback".to_string(),
                        body: "Thanks for sharing feedback. We'll review it shortly.".to_string(),
                    });
                }
            }
        }

        messages
    }
}

/// Sending half of the notification queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    /// Queue a notification without waiting for delivery.
    pub fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.try_send(notification) {
            warn!(error = %e, "notification dropped");
        }
    }
}

/// Start the delivery worker. It exits once every [`Notifier`] is dropped.
pub fn spawn_notifier(
    mailer: Arc<dyn Mailer>,
    admin_email: Option<String>,
) -> (Notifier, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Notification>(DEFAULT_QUEUE_CAPACITY);

    let worker = tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            for message in notification.render(admin_email.as_deref()) {
                match mailer.send(&message).await {
                    Ok(()) => debug!(to = %message.to, subject = %message.subject, "email sent"),
                    Err(e) => warn!(to = %message.to, error = %e, "email send failed"),
                }
            }
        }
        debug!("notification worker stopped");
    });

    (Notifier { tx }, worker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload() -> Notification {
        Notification::UploadReceived {
            document_id: 12,
            title: "Networks Final".to_string(),
            course_code: "CS330".to_string(),
            kind: "paper".to_string(),
            uploader_email: "up@example.com".to_string(),
        }
    }

    #[test]
    fn test_upload_renders_admin_and_uploader_messages() {
        let messages = upload().render(Some("admin@example.com"));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].to, "admin@example.com");
        assert!(messages[0].body.contains("Doc ID: 12"));
        assert_eq!(messages[1].to, "up@example.com");

        assert_eq!(upload().render(None).len(), 1);
    }

    #[test]
    fn test_feedback_ack_only_for_email_contacts() {
        let anonymous = Notification::FeedbackReceived {
            message: "typo on page 2".to_string(),
            document_id: None,
            sender: Some("discord: sam".to_string()),
        };
        let messages = anonymous.render(Some("admin@example.com"));
        assert_eq!(messages.len(), 1);
        assert!(messages[0].body.contains("From: discord: sam"));

        let known = Notification::FeedbackReceived {
            message: "thanks".to_string(),
            document_id: Some(3),
            sender: Some("me@example.com".to_string()),
        };
        assert_eq!(known.render(Some("admin@example.com")).len(), 2);
    }

    #[tokio::test]
    async fn test_worker_delivers_through_mailer() {
        let mailer = Arc::new(MockMailer::new());
        let (notifier, worker) = spawn_notifier(mailer.clone(), Some("admin@example.com".to_string()));

        notifier.notify(upload());
        drop(notifier);
        worker.await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].subject, "Thanks for your submission");
    }
}

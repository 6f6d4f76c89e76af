//! HTTP API Tests
//!
//! The full router driven in-process with `tower::ServiceExt::oneshot`:
//! - health and banner routes at the root, everything else under `/api`
//! - register / login / me
//! - multipart upload, moderation visibility and admin-only actions
//! - download gating: 401, 402, 403, 404 and the local file response
//! - simulated checkout, webhook without a secret, feedback

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use papergate::config::AppConfig;
use papergate::http_server::{build_router, AppState};
use papergate::notify::MockMailer;
use papergate::store::Database;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN: &str = "admin@example.com";
const BOUNDARY: &str = "papergate-test-boundary";

// =============================================================================
// Helper Functions
// =============================================================================

struct TestApp {
    _temp: TempDir,
    router: Router,
    mailer: Arc<MockMailer>,
}

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    bytes: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

impl TestApp {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.storage.upload_dir = temp.path().join("uploads");
        config.auth.admin_email = Some(ADMIN.to_string());
        config.email.notify_email = Some(ADMIN.to_string());
        config.quota.free_doc_limit = 2;
        config.billing.simulate_payments = true;

        let db = Database::open(temp.path().join("api.db")).unwrap();
        let mailer = Arc::new(MockMailer::new());
        let state = AppState::with_mailer(&config, db, mailer.clone()).unwrap();
        let router = build_router(&config.server, Arc::new(state));

        Self {
            _temp: temp,
            router,
            mailer,
        }
    }

    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
        Reply {
            status,
            headers,
            bytes,
        }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn register(&self, email: &str) -> String {
        let reply = self
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "email": email, "password": "password1" })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.json());
        reply.json()["access_token"].as_str().unwrap().to_string()
    }

    async fn upload(&self, token: &str, title: &str, file_name: &str) -> Reply {
        let mut body = String::new();
        for (name, value) in [("title", title), ("course_code", "MATH240"), ("year", "2023")] {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            ));
        }
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4 {}\r\n--{}--\r\n",
            BOUNDARY, file_name, title, BOUNDARY
        ));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/docs")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Upload as `token`, approve as `admin`, return the document id
    async fn approved(&self, token: &str, admin: &str, title: &str) -> i64 {
        let reply = self.upload(token, title, &format!("{}.pdf", title)).await;
        assert_eq!(reply.status, StatusCode::CREATED);
        let id = reply.json()["document"]["id"].as_i64().unwrap();

        let reply = self
            .call(Method::POST, &format!("/api/docs/{}/approve", id), Some(admin), None)
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        id
    }

    async fn download(&self, token: Option<&str>, id: i64) -> Reply {
        self.call(Method::GET, &format!("/api/docs/{}/download", id), token, None)
            .await
    }
}

// =============================================================================
// Health Tests
// =============================================================================

#[tokio::test]
async fn test_health_and_banner() {
    let app = TestApp::new();

    let reply = app.call(Method::GET, "/healthz", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({ "status": "ok" }));

    let reply = app.call(Method::GET, "/", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["message"], "Backend running");

    let reply = app.call(Method::GET, "/docs", None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Auth Tests
// =============================================================================

#[tokio::test]
async fn test_register_login_me() {
    let app = TestApp::new();

    let reply = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "student@example.com", "password": "password1" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let body = reply.json();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"]["email"], "student@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["free_docs_remaining"], 2);

    let reply = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "student@example.com", "password": "password1" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.json()["code"], 409);

    let reply = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "student@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "student@example.com", "password": "password1" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let token = reply.json()["access_token"].as_str().unwrap().to_string();

    let reply = app.call(Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["free_limit"], 2);
    assert_eq!(reply.json()["user"]["subscription_status"], "free");

    assert_eq!(
        app.call(Method::GET, "/api/me", None, None).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.call(Method::GET, "/api/me", Some("garbage"), None).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_admin_email_registers_as_admin() {
    let app = TestApp::new();
    let token = app.register(ADMIN).await;

    let reply = app.call(Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(reply.json()["user"]["role"], "admin");
}

// =============================================================================
// Document Tests
// =============================================================================

#[tokio::test]
async fn test_upload_moderation_and_listing() {
    let app = TestApp::new();
    let admin = app.register(ADMIN).await;
    let student = app.register("student@example.com").await;

    let reply = app.upload(&student, "Final 2023", "final.pdf").await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let document = reply.json()["document"].clone();
    assert_eq!(document["status"], "pending");
    assert_eq!(document["uploader"]["email"], "student@example.com");
    let id = document["id"].as_i64().unwrap();

    // Pending uploads are invisible to everyone but admins
    let reply = app.call(Method::GET, "/api/docs", None, None).await;
    assert_eq!(reply.json()["documents"], json!([]));
    let reply = app.call(Method::GET, "/api/docs", Some(&student), None).await;
    assert_eq!(reply.json()["documents"], json!([]));
    let reply = app
        .call(Method::GET, "/api/docs?status=pending", Some(&admin), None)
        .await;
    assert_eq!(reply.json()["documents"][0]["id"], id);

    let reply = app
        .call(Method::POST, &format!("/api/docs/{}/approve", id), Some(&student), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .call(Method::POST, &format!("/api/docs/{}/approve", id), Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["document"]["status"], "approved");

    let reply = app.call(Method::GET, "/api/docs", None, None).await;
    let listed = reply.json()["documents"].clone();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["title"], "Final 2023");
    assert!(listed[0]["status"].is_null());

    let reply = app
        .call(Method::POST, "/api/docs/999/reject", Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_rejects_non_pdf_and_anonymous() {
    let app = TestApp::new();
    let student = app.register("student@example.com").await;

    let reply = app.upload(&student, "Notes", "notes.docx").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["code"], 400);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/docs")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(format!("--{}--\r\n", BOUNDARY)))
        .unwrap();
    assert_eq!(app.send(request).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_notifies_admin_and_uploader() {
    let app = TestApp::new();
    let student = app.register("student@example.com").await;
    app.upload(&student, "Quiz", "quiz.pdf").await;

    let mut sent = Vec::new();
    for _ in 0..50 {
        sent = app.mailer.sent();
        if sent.len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let recipients: Vec<_> = sent.iter().map(|m| m.to.as_str()).collect();
    assert!(recipients.contains(&ADMIN));
    assert!(recipients.contains(&"student@example.com"));
}

#[tokio::test]
async fn test_delete_is_admin_only() {
    let app = TestApp::new();
    let admin = app.register(ADMIN).await;
    let student = app.register("student@example.com").await;
    let id = app.approved(&student, &admin, "Old").await;

    let reply = app
        .call(Method::DELETE, &format!("/api/docs/{}", id), Some(&student), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .call(Method::DELETE, &format!("/api/docs/{}", id), Some(&admin), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({ "deleted": true, "document_id": id }));

    assert_eq!(app.download(Some(&student), id).await.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Download and Billing Tests
// =============================================================================

#[tokio::test]
async fn test_download_quota_and_simulated_checkout() {
    let app = TestApp::new();
    let admin = app.register(ADMIN).await;
    let student = app.register("student@example.com").await;
    let d1 = app.approved(&student, &admin, "one").await;
    let d2 = app.approved(&student, &admin, "two").await;
    let d3 = app.approved(&student, &admin, "three").await;

    assert_eq!(app.download(None, d1).await.status, StatusCode::UNAUTHORIZED);

    let reply = app.download(Some(&student), d1).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.bytes, b"%PDF-1.4 one".to_vec());
    assert_eq!(reply.headers[header::CONTENT_TYPE], "application/pdf");
    let disposition = reply.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\""));
    assert!(disposition.ends_with("one.pdf\""));

    assert_eq!(app.download(Some(&student), d2).await.status, StatusCode::OK);

    let reply = app.download(Some(&student), d3).await;
    assert_eq!(reply.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(reply.json()["code"], 402);

    // Repeat access stays free
    assert_eq!(app.download(Some(&student), d1).await.status, StatusCode::OK);

    let reply = app
        .call(Method::POST, "/api/billing/checkout", Some(&student), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json(),
        json!({ "simulated": true, "subscription_status": "paid" })
    );

    assert_eq!(app.download(Some(&student), d3).await.status, StatusCode::OK);

    let reply = app.call(Method::GET, "/api/me", Some(&student), None).await;
    let mut accessed: Vec<i64> = reply.json()["user"]["accessed_doc_ids"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_i64)
        .collect();
    accessed.sort();
    assert_eq!(accessed, vec![d1, d2, d3]);
}

#[tokio::test]
async fn test_download_gating_statuses() {
    let app = TestApp::new();
    let admin = app.register(ADMIN).await;
    let student = app.register("student@example.com").await;

    let reply = app.upload(&student, "Pending", "pending.pdf").await;
    let pending = reply.json()["document"]["id"].as_i64().unwrap();

    assert_eq!(
        app.download(Some(&student), pending).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(app.download(Some(&admin), pending).await.status, StatusCode::OK);
    assert_eq!(
        app.download(Some(&student), 4242).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_webhook_without_secret_is_unavailable() {
    let app = TestApp::new();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/billing/webhook")
        .header("stripe-signature", "t=1,v1=00")
        .body(Body::from(r#"{"type":"checkout.session.completed"}"#))
        .unwrap();
    let reply = app.send(request).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.json()["code"], 503);
}

// =============================================================================
// Feedback Tests
// =============================================================================

#[tokio::test]
async fn test_feedback_submission() {
    let app = TestApp::new();

    let reply = app
        .call(Method::POST, "/api/feedback", None, Some(json!({ "message": "  " })))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .call(
            Method::POST,
            "/api/feedback",
            Some("not-a-token"),
            Some(json!({ "message": "Page 2 is blurry", "contact": "reader@example.com" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let feedback = reply.json()["feedback"].clone();
    assert_eq!(feedback["message"], "Page 2 is blurry");
    assert_eq!(feedback["contact"], "reader@example.com");

    let token = app.register("student@example.com").await;
    let reply = app
        .call(
            Method::POST,
            "/api/feedback",
            Some(&token),
            Some(json!({ "message": "Thanks!" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
}

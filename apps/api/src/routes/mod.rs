pub mod health;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;
use crate::{applications, auth, export, jobs, users};

/// Request bodies above this are rejected before reaching a handler.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::handlers::register))
        .route("/login", post(auth::handlers::login))
        .route(
            "/profile",
            get(auth::handlers::get_profile).put(auth::handlers::update_profile),
        )
        .route("/change-password", put(auth::handlers::change_password))
        .route("/verify-token", post(auth::handlers::verify_token));

    let job_routes = Router::new()
        .route(
            "/",
            get(jobs::handlers::list_jobs).post(jobs::handlers::create_job),
        )
        .route("/featured", get(jobs::handlers::featured_jobs))
        .route("/categories", get(jobs::handlers::categories))
        .route("/my-jobs", get(jobs::handlers::my_jobs))
        .route(
            "/:id",
            get(jobs::handlers::get_job)
                .put(jobs::handlers::update_job)
                .delete(jobs::handlers::delete_job),
        );

    let application_routes = Router::new()
        .route("/", post(applications::handlers::create_application))
        .route(
            "/my-applications",
            get(applications::handlers::my_applications),
        )
        .route("/job/:job_id", get(applications::handlers::job_applications))
        .route("/all", get(applications::handlers::company_applications))
        .route("/stats", get(applications::handlers::stats))
        .route("/:id/status", put(applications::handlers::update_status))
        .route("/:id", delete(applications::handlers::withdraw_application));

    let user_routes = Router::new()
        .route("/upload-cv", post(users::handlers::upload_cv))
        .route("/cv", delete(users::handlers::delete_cv))
        .route("/cv/:filename", get(users::handlers::download_cv))
        .route("/profile/:id", get(users::handlers::public_profile))
        .route("/settings", put(users::handlers::update_settings))
        .route("/deactivate", post(users::handlers::deactivate))
        .route("/search", get(users::handlers::search_students))
        .route("/dashboard-stats", get(users::handlers::dashboard_stats));

    let export_routes = Router::new()
        .route("/users", get(export::handlers::export_users))
        .route("/jobs", get(export::handlers::export_jobs))
        .route("/applications", get(export::handlers::export_applications))
        .route("/all", get(export::handlers::export_all));

    Router::new()
        .route("/api/health", get(health::health_handler))
        .nest("/api/auth", auth_routes)
        .nest("/api/jobs", job_routes)
        .nest("/api/applications", application_routes)
        .nest("/api/users", user_routes)
        .nest("/api/export", export_routes)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// CORS for the single configured web client, with credentials.
pub fn cors_layer(client_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION])
        .max_age(Duration::from_secs(600));

    match client_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_credentials(true).allow_origin(origin),
        Err(e) => {
            warn!("CLIENT_URL '{client_url}' is not a valid origin ({e}); cross-origin requests will be refused");
            layer
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::store::memory::MemoryStore;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

    struct TestApp {
        router: Router,
        _uploads: tempfile::TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            let uploads = tempfile::tempdir().unwrap();
            let state = AppState::new(
                Config::for_tests(uploads.path()),
                Arc::new(MemoryStore::new()),
            );
            TestApp {
                router: build_router(state),
                _uploads: uploads,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, bytes.to_vec())
        }

        async fn call(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            let (status, bytes) = self.send(request).await;
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }

        async fn register(&self, email: &str, role: &str) -> String {
            let (status, body) = self
                .call(
                    "POST",
                    "/api/auth/register",
                    None,
                    Some(json!({
                        "email": email,
                        "password": "secret123",
                        "confirmPassword": "secret123",
                        "role": role,
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            body["token"].as_str().unwrap().to_string()
        }

        async fn student(&self, email: &str) -> String {
            let token = self.register(email, "student").await;
            let (status, body) = self
                .call(
                    "PUT",
                    "/api/auth/profile",
                    Some(&token),
                    Some(json!({
                        "firstName": "Ana",
                        "lastName": "López",
                        "age": 21,
                        "career": "Computer Science",
                        "skills": ["python", "sales"],
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            token
        }

        async fn business(&self, email: &str) -> String {
            let token = self.register(email, "business").await;
            let (status, body) = self
                .call(
                    "PUT",
                    "/api/auth/profile",
                    Some(&token),
                    Some(json!({
                        "companyName": "Café Central",
                        "contactName": "Luis",
                        "phone": "555-0100",
                        "address": "Av. Reforma 1",
                        "city": "CDMX",
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            token
        }

        async fn post_job(&self, token: &str) -> String {
            let (status, body) = self
                .call(
                    "POST",
                    "/api/jobs",
                    Some(token),
                    Some(json!({
                        "title": "Barista de medio tiempo",
                        "description": "Prepare drinks, keep the bar clean and help customers during the afternoon shift.",
                        "requirements": ["Friendly attitude"],
                        "location": {"address": "Av. Reforma 1", "city": "CDMX", "state": "Ciudad de México"},
                        "employmentType": "part-time",
                        "category": "food-service",
                        "tags": ["Coffee"],
                        "salary": {"min": 80, "max": 120},
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            body["job"]["id"].as_str().unwrap().to_string()
        }

        async fn apply(&self, token: &str, job_id: &str) -> (StatusCode, Value) {
            self.call(
                "POST",
                "/api/applications",
                Some(token),
                Some(json!({ "jobId": job_id, "coverLetter": "I love coffee." })),
            )
            .await
        }

        async fn upload_cv(&self, token: &str, content_type: &str, bytes: &[u8]) -> (StatusCode, Value) {
            let boundary = "XBOUNDARYX";
            let mut body = format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"cv\"; filename=\"cv.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .into_bytes();
            body.extend_from_slice(bytes);
            body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

            let request = Request::builder()
                .method("POST")
                .uri("/api/users/upload-cv")
                .header("authorization", format!("Bearer {token}"))
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap();
            let (status, bytes) = self.send(request).await;
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let (status, body) = app.call("GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route_uses_error_envelope() {
        let app = TestApp::new();
        let (status, body) = app.call("GET", "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_register_login_apply_and_list() {
        let app = TestApp::new();
        let company = app.business("cafe@central.mx").await;
        let job_id = app.post_job(&company).await;
        app.student("ana@uni.mx").await;

        let (status, body) = app
            .call(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "ANA@uni.mx ", "password": "secret123"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = app.apply(&token, &job_id).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["application"]["status"], "pending");
        assert_eq!(body["application"]["company"]["companyName"], "Café Central");

        let (status, body) = app
            .call("GET", "/api/applications/my-applications", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applications"][0]["status"], "pending");
        assert_eq!(body["applications"][0]["job"]["id"], job_id.as_str());
        assert_eq!(body["pagination"]["totalApplications"], 1);

        let (_, body) = app
            .call("GET", &format!("/api/jobs/{job_id}"), Some(&company), None)
            .await;
        assert_eq!(body["job"]["applicationsCount"], 1);
    }

    #[tokio::test]
    async fn test_duplicate_application_is_rejected() {
        let app = TestApp::new();
        let company = app.business("cafe@central.mx").await;
        let job_id = app.post_job(&company).await;
        let student = app.student("ana@uni.mx").await;

        assert_eq!(app.apply(&student, &job_id).await.0, StatusCode::CREATED);
        let (status, body) = app.apply(&student, &job_id).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_incomplete_profile_cannot_apply() {
        let app = TestApp::new();
        let company = app.business("cafe@central.mx").await;
        let job_id = app.post_job(&company).await;
        let student = app.register("new@uni.mx", "student").await;

        let (status, body) = app.apply(&student, &job_id).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "PROFILE_INCOMPLETE");
        assert!(body["error"]["missingFields"].as_array().unwrap().len() >= 4);
    }

    #[tokio::test]
    async fn test_cover_letter_required_when_job_asks_for_one() {
        let app = TestApp::new();
        let company = app.business("cafe@central.mx").await;
        let job_id = app.post_job(&company).await;
        let student = app.student("ana@uni.mx").await;

        let (status, body) = app
            .call(
                "PUT",
                &format!("/api/jobs/{job_id}"),
                Some(&company),
                Some(json!({"requiresCoverLetter": true})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        for letter in [None, Some("   ")] {
            let (status, body) = app
                .call(
                    "POST",
                    "/api/applications",
                    Some(&student),
                    Some(json!({ "jobId": job_id, "coverLetter": letter })),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["fields"][0]["field"], "coverLetter");
        }

        let (status, body) = app.apply(&student, &job_id).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    #[tokio::test]
    async fn test_rejection_stamps_responded_at_and_persists() {
        let app = TestApp::new();
        let company = app.business("cafe@central.mx").await;
        let job_id = app.post_job(&company).await;
        let student = app.student("ana@uni.mx").await;
        let (_, body) = app.apply(&student, &job_id).await;
        let application_id = body["application"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .call(
                "PUT",
                &format!("/api/applications/{application_id}/status"),
                Some(&company),
                Some(json!({"status": "rejected", "notes": "Position filled"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["application"]["respondedAt"].is_string());

        let (_, body) = app
            .call("GET", &format!("/api/applications/job/{job_id}"), Some(&company), None)
            .await;
        let stored = &body["applications"][0];
        assert_eq!(stored["status"], "rejected");
        assert_eq!(stored["employerNotes"], "Position filled");
        assert_eq!(stored["applicant"]["firstName"], "Ana");

        // rejected is final
        let (status, _) = app
            .call(
                "PUT",
                &format!("/api/applications/{application_id}/status"),
                Some(&company),
                Some(json!({"status": "interview"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_withdrawal_releases_counter() {
        let app = TestApp::new();
        let company = app.business("cafe@central.mx").await;
        let job_id = app.post_job(&company).await;
        let student = app.student("ana@uni.mx").await;
        let (_, body) = app.apply(&student, &job_id).await;
        let application_id = body["application"]["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .call("DELETE", &format!("/api/applications/{application_id}"), Some(&company), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .call("DELETE", &format!("/api/applications/{application_id}"), Some(&student), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (_, body) = app
            .call("GET", &format!("/api/jobs/{job_id}"), Some(&company), None)
            .await;
        assert_eq!(body["job"]["applicationsCount"], 0);

        let (status, _) = app
            .call("DELETE", &format!("/api/applications/{application_id}"), Some(&student), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = app
            .call(
                "PUT",
                &format!("/api/applications/{application_id}/status"),
                Some(&company),
                Some(json!({"status": "reviewing"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, body) = app
            .call("GET", &format!("/api/jobs/{job_id}"), Some(&company), None)
            .await;
        assert_eq!(body["job"]["applicationsCount"], 0);

        let (_, body) = app.call("GET", "/api/applications/stats", Some(&student), None).await;
        assert_eq!(body["stats"]["withdrawn"], 1);
        assert!(body["stats"].get("jobs").is_none());
    }

    #[tokio::test]
    async fn test_non_owner_cannot_edit_or_delete_job() {
        let app = TestApp::new();
        let owner = app.business("cafe@central.mx").await;
        let other = app.business("tacos@norte.mx").await;
        let job_id = app.post_job(&owner).await;
        let uri = format!("/api/jobs/{job_id}");

        let (status, _) = app
            .call("PUT", &uri, Some(&other), Some(json!({"title": "Hijacked posting"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.call("DELETE", &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = app.call("GET", &uri, None, None).await;
        assert_eq!(body["job"]["title"], "Barista de medio tiempo");
        assert!(body["job"].get("status").is_none());
    }

    #[tokio::test]
    async fn test_deleting_job_removes_its_applications() {
        let app = TestApp::new();
        let company = app.business("cafe@central.mx").await;
        let job_id = app.post_job(&company).await;
        let student = app.student("ana@uni.mx").await;
        app.apply(&student, &job_id).await;

        let (status, _) = app
            .call("DELETE", &format!("/api/jobs/{job_id}"), Some(&company), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = app
            .call("GET", "/api/applications/my-applications", Some(&student), None)
            .await;
        assert_eq!(body["applications"], json!([]));
        let (status, _) = app.call("GET", &format!("/api/jobs/{job_id}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let app = TestApp::new();
        for (method, uri) in [
            ("GET", "/api/auth/profile"),
            ("POST", "/api/applications"),
            ("GET", "/api/applications/stats"),
            ("GET", "/api/export/users"),
        ] {
            let (status, body) = app.call(method, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["error"]["message"], "Access token required");
        }
        let (status, body) = app.call("GET", "/api/auth/profile", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid token");
    }

    #[tokio::test]
    async fn test_public_board_lists_open_jobs() {
        let app = TestApp::new();
        let company = app.business("cafe@central.mx").await;
        app.post_job(&company).await;

        let (status, body) = app
            .call("GET", "/api/jobs?city=cdmx&minSalary=50", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["totalJobs"], 1);
        assert_eq!(body["jobs"][0]["company"]["companyName"], "Café Central");

        let (status, body) = app.call("GET", "/api/jobs?limit=500", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["fields"][0]["field"], "limit");
    }

    #[tokio::test]
    async fn test_cv_upload_checks_type_and_serves_owner() {
        let app = TestApp::new();
        let student = app.student("ana@uni.mx").await;

        let (status, _) = app.upload_cv(&student, "text/plain", b"hello").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app.upload_cv(&student, "application/pdf", PDF).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let file_name = body["filename"].as_str().unwrap().to_string();

        let request = Request::builder()
            .uri(format!("/api/users/cv/{file_name}"))
            .header("authorization", format!("Bearer {student}"))
            .body(Body::empty())
            .unwrap();
        let (status, bytes) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, PDF);

        // a business with no application from this student may not read it
        let company = app.business("cafe@central.mx").await;
        let (status, _) = app
            .call("GET", &format!("/api/users/cv/{file_name}"), Some(&company), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.call("DELETE", "/api/users/cv", Some(&student), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.call("DELETE", "/api/users/cv", Some(&student), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_returns_workbook() {
        let app = TestApp::new();
        let token = app.business("cafe@central.mx").await;
        let request = Request::builder()
            .uri("/api/export/all")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=all_data_export_"));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_dashboard_recommends_by_skill() {
        let app = TestApp::new();
        let company = app.business("cafe@central.mx").await;
        app.post_job(&company).await;
        let student = app.student("ana@uni.mx").await;
        app.call(
            "PUT",
            "/api/auth/profile",
            Some(&student),
            Some(json!({"skills": ["cooking"]})),
        )
        .await;

        let (status, body) = app
            .call("GET", "/api/users/dashboard-stats", Some(&student), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["profileComplete"], true);
        assert_eq!(
            body["stats"]["recommendedJobs"][0]["title"],
            "Barista de medio tiempo"
        );

        let (_, body) = app
            .call("GET", "/api/users/dashboard-stats", Some(&company), None)
            .await;
        assert_eq!(body["stats"]["jobs"]["totalJobs"], 1);
    }
}

//! E2E tests for the protected record listing page

mod common;

use chrono::{Duration, Utc};
use common::TestServer;
use rowboard::auth::session::{Session, create_session_token};

fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build no-redirect client")
}

#[tokio::test]
async fn test_home_renders_records_for_authenticated_user() {
    let server = TestServer::new().await;
    let user = server.create_test_user().await;
    let cookie = server.session_cookie_for(&user);

    let response = server
        .client
        .get(server.url("/"))
        .header("Cookie", cookie)
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("response body");

    assert!(body.contains("Test User"));
    assert!(body.contains("tester@example.com"));

    // All seeded rows are listed
    let records = server.state.db.get_records().await.unwrap();
    assert_eq!(records.len(), 10);
    for record in &records {
        assert!(
            body.contains(&record.name),
            "expected record {} in page",
            record.name
        );
    }
}

#[tokio::test]
async fn test_home_redirects_when_user_row_is_missing() {
    let server = TestServer::new().await;
    let client = no_redirect_client();

    // Valid signature, but no matching user row in the database
    let now = Utc::now();
    let session = Session {
        email: "ghost@example.com".to_string(),
        name: None,
        picture: None,
        created_at: now,
        expires_at: now + Duration::hours(1),
    };
    let token = create_session_token(&session, &server.state.config.auth.session_secret).unwrap();

    let response = client
        .get(server.url("/"))
        .header("Cookie", format!("auth_token={}", token))
        .send()
        .await
        .expect("request succeeds");

    assert!(response.status().is_redirection());
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[tokio::test]
async fn test_home_redirects_on_tampered_cookie() {
    let server = TestServer::new().await;
    let client = no_redirect_client();

    let response = client
        .get(server.url("/"))
        .header("Cookie", "auth_token=not-a-valid-token")
        .send()
        .await
        .expect("request succeeds");

    assert!(response.status().is_redirection());
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.expect("response body"), "OK");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_counters() {
    let server = TestServer::new().await;

    // Generate at least one tracked request first
    server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .expect("request succeeds");

    let response = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("response body");
    assert!(body.contains("rowboard_http_requests_total"));
    assert!(body.contains("rowboard_db_queries_total"));
}

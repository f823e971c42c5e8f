// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP API tests through the full router.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use tower::ServiceExt;
use wellness_sync::config::Config;
use wellness_sync::db::{CalendarStore, CredentialStore};
use wellness_sync::models::{CalendarEvent, EventTime, Provider};
use wellness_sync::routes::create_router;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{
    create_test_app, create_test_jwt, mock_config, seed_credential, stored_credential,
    test_state, token_body, ADMIN,
};

fn jwt_key() -> Vec<u8> {
    Config::test_default().jwt_signing_key
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(user) = user {
        builder = builder.header(
            header::AUTHORIZATION,
            format!("Bearer {}", create_test_jwt(user, &jwt_key())),
        );
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, user: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", create_test_jwt(user, &jwt_key())),
        )
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect should carry a location")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = create_test_app();

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_requires_session() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(get("/api/calendar/status", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejects_token_signed_with_other_key() {
    let (app, _, _) = create_test_app();
    let forged = create_test_jwt(ADMIN, b"some_other_key_that_is_long_enough");

    let request = Request::builder()
        .uri("/api/calendar/status")
        .header(header::AUTHORIZATION, format!("Bearer {}", forged))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let (app, _, _) = create_test_app();

    let request = Request::builder()
        .uri("/api/calendar/status")
        .header(
            header::COOKIE,
            format!(
                "{}={}",
                wellness_sync::middleware::auth::SESSION_COOKIE,
                create_test_jwt("u1", &jwt_key())
            ),
        )
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_status_for_regular_user() {
    let (app, _, db) = create_test_app();
    seed_credential(&db, "current", Some(Utc::now() + Duration::hours(1))).await;

    let response = app
        .oneshot(get("/api/calendar/status", Some("u1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["state"], "connected");
    assert_eq!(body["is_admin"], false);
    assert_eq!(body["calendar"]["calendar_id"], "primary");
}

#[tokio::test]
async fn test_sync_without_credential_is_not_connected() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/calendar/sync",
            "u1",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(json_body(response).await["error"], "not_connected");
}

#[tokio::test]
async fn test_sync_after_revocation_requires_reconnect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;

    let (state, db) = test_state(mock_config(&server));
    seed_credential(&db, "", None).await;
    let app = create_router(state);

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/calendar/sync",
            "u1",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "reconnect_required");
}

#[tokio::test]
async fn test_sync_returns_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::events_page(
            serde_json::json!([{
                "id": "a",
                "summary": "Dentist",
                "start": {"date": "2024-06-01"},
                "end": {"date": "2024-06-02"}
            }]),
            None,
        )))
        .mount(&server)
        .await;

    let (state, db) = test_state(mock_config(&server));
    seed_credential(&db, "current", Some(Utc::now() + Duration::hours(1))).await;
    let app = create_router(state);

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/calendar/sync",
            "u1",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["total_fetched"], 1);
    assert_eq!(body["inserted"], 1);
}

#[tokio::test]
async fn test_events_are_listed_earliest_first() {
    let (app, _, db) = create_test_app();

    let row = |remote_id: &str, date: &str| {
        let start = EventTime::AllDay {
            date: chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        };
        CalendarEvent {
            id: CalendarEvent::key("u1", remote_id),
            owner_id: "u1".to_string(),
            remote_id: Some(remote_id.to_string()),
            title: remote_id.to_string(),
            description: None,
            start_time: start.clone(),
            end_time: start,
            is_health_related: false,
            created_at: "2024-06-01T00:00:00Z".to_string(),
            updated_at: "2024-06-01T00:00:00Z".to_string(),
        }
    };
    db.upsert_event(&row("later", "2024-06-05")).await.unwrap();
    db.upsert_event(&row("sooner", "2024-06-02")).await.unwrap();
    let mut foreign = row("foreign", "2024-06-01");
    foreign.owner_id = "u2".to_string();
    foreign.id = CalendarEvent::key("u2", "foreign");
    db.upsert_event(&foreign).await.unwrap();

    let response = app
        .oneshot(get("/api/calendar/events", Some("u1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["sooner", "later"]);
}

#[tokio::test]
async fn test_create_event_validates_input() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/calendar/events",
            "u1",
            serde_json::json!({
                "title": "",
                "start": {"date": "2024-06-01"},
                "end": {"date": "2024-06-02"}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_select_calendar_requires_admin() {
    let (app, _, db) = create_test_app();
    seed_credential(&db, "current", Some(Utc::now() + Duration::hours(1))).await;

    let response = app
        .oneshot(send_json(
            "PUT",
            "/api/calendar/shared",
            "u1",
            serde_json::json!({"calendar_id": "other"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_calendars_requires_admin() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(get("/api/calendar/calendars", Some("u1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_oauth_start_requires_admin() {
    let (app, _, _) = create_test_app();

    let response = app.oneshot(get("/auth/google", Some("u1"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_oauth_start_redirects_to_consent() {
    let (app, _, _) = create_test_app();

    let response = app.oneshot(get("/auth/google", Some(ADMIN))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = location(&response);
    assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert!(location.contains("client_id=test_client_id"));
    assert!(location.contains("access_type=offline"));
    assert!(location.contains("prompt=consent"));
    assert!(location.contains("state="));
}

#[tokio::test]
async fn test_oauth_callback_rejects_bad_state() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(get("/auth/google/callback?code=abc&state=forged", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "http://localhost:5173?error=invalid_state"
    );
}

#[tokio::test]
async fn test_oauth_round_trip_stores_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=consent-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "first",
            "expires_in": 3599,
            "refresh_token": "long-lived"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (state, db) = test_state(mock_config(&server));
    let app = create_router(state);

    let start = app
        .clone()
        .oneshot(get("/auth/google", Some(ADMIN)))
        .await
        .unwrap();
    let consent_url = location(&start);
    let oauth_state = consent_url
        .split("state=")
        .nth(1)
        .expect("consent URL should carry state");

    let callback = app
        .clone()
        .oneshot(get(
            &format!(
                "/auth/google/callback?code=consent-code&state={}",
                oauth_state
            ),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(callback.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&callback), "http://localhost:5173?connected=1");

    let credential = stored_credential(&db).await;
    assert_eq!(credential.provider, Provider::GoogleCalendar);
    assert_eq!(credential.refresh_token, "long-lived");
    assert!(credential.is_active);

    let status = app
        .oneshot(get("/api/calendar/status", Some(ADMIN)))
        .await
        .unwrap();
    let body = json_body(status).await;
    assert_eq!(body["state"], "connected");
    assert_eq!(body["is_admin"], true);
}

#[tokio::test]
async fn test_oauth_callback_reports_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("x", 3600)))
        .expect(0)
        .mount(&server)
        .await;

    let (state, db) = test_state(mock_config(&server));
    let app = create_router(state);

    let start = app
        .clone()
        .oneshot(get("/auth/google", Some(ADMIN)))
        .await
        .unwrap();
    let consent_url = location(&start);
    let oauth_state = consent_url.split("state=").nth(1).unwrap();

    let callback = app
        .oneshot(get(
            &format!(
                "/auth/google/callback?error=access_denied&state={}",
                oauth_state
            ),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(
        location(&callback),
        "http://localhost:5173?error=access_denied"
    );
    assert!(db
        .get_credential(ADMIN, Provider::GoogleCalendar)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let (app, _, _) = create_test_app();

    let response = app.oneshot(get("/health", None)).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
    assert_eq!(headers.get("Cache-Control").unwrap(), "no-store");
}

//! In-process HTTP tests against the router

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use caseworks_server::{
    api,
    config::AppConfig,
    models::role::{CallerClaims, Role},
    AppState,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::harness;

fn app() -> Router {
    let h = harness();
    api::router(AppState {
        config: Arc::new(AppConfig::default()),
        services: Arc::new(h.services),
        reminders: None,
    })
}

fn token(user_id: i32, role: Role) -> String {
    let now = Utc::now().timestamp();
    let claims = CallerClaims {
        sub: format!("user-{user_id}"),
        user_id,
        role,
        exp: now + 3600,
        iat: now,
    };
    let secret = AppConfig::default().auth.jwt_secret;
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, role: Option<Role>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token(1, role)));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (_, body) = call(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(body["reminders"], false);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_rejected() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/equipment", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2);

    let request = Request::builder()
        .uri("/api/v1/equipment")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_viewer_cannot_register_equipment() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/equipment",
        Some(Role::Viewer),
        Some(json!({ "name": "Rollator", "total_quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NotAuthorized");
}

#[tokio::test]
async fn test_rental_round_trip_over_http() {
    let app = app();
    let (status, item) = call(
        &app,
        Method::POST,
        "/api/v1/equipment",
        Some(Role::Manager),
        Some(json!({ "name": "Rollator", "total_quantity": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let equipment_id = item["id"].as_i64().unwrap();

    let (status, rental) = call(
        &app,
        Method::POST,
        "/api/v1/rentals",
        Some(Role::Therapist),
        Some(json!({ "equipment_id": equipment_id, "client_id": 8, "quantity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rental["status"], "active");
    let rental_id = rental["id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/api/v1/equipment/{equipment_id}/quantity"),
        Some(Role::Manager),
        Some(json!({ "total_quantity": 4, "available_quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["minimum_available"], 1);
    assert_eq!(body["maximum_available"], 4);

    // No body: return date defaults to today
    let (status, returned) = call(
        &app,
        Method::POST,
        &format!("/api/v1/rentals/{rental_id}/return"),
        Some(Role::Technician),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "returned");

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/v1/rentals/{rental_id}/cancel"),
        Some(Role::Therapist),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyReturned");

    let (_, item) = call(
        &app,
        Method::GET,
        &format!("/api/v1/equipment/{equipment_id}"),
        Some(Role::Viewer),
        None,
    )
    .await;
    assert_eq!(item["available_quantity"], 4);
}

#[tokio::test]
async fn test_illegal_stage_lists_allowed_targets() {
    let app = app();
    let (_, request) = call(
        &app,
        Method::POST,
        "/api/v1/customizations",
        Some(Role::Therapist),
        Some(json!({ "client_id": 8, "title": "Custom armrest" })),
    )
    .await;
    let id = request["id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/v1/customizations/{id}/stage"),
        Some(Role::Technician),
        Some(json!({ "target_stage": "fitting" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "IllegalTransition");
    assert_eq!(body["allowed"], json!(["designing", "cancelled"]));

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/v1/customizations/{id}"),
        Some(Role::Manager),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = call(
        &app,
        Method::GET,
        &format!("/api/v1/customizations/{id}/history"),
        Some(Role::Viewer),
        None,
    )
    .await;
    assert_eq!(history[0]["stage"], "cancelled");
}

#[tokio::test]
async fn test_refresh_without_daemon_conflicts() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/schedules/reminders", Some(Role::Viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/schedules/reminders/refresh",
        Some(Role::Admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

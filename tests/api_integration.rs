//! HTTP API tests against the full router, driven with `tower::ServiceExt`.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use ara_notification_engine::auth::{issue_token, Claims};
use ara_notification_engine::config::{
    ApiConfig, JwtConfig, Settings,
};
use ara_notification_engine::server::{create_app, AppState};

const SECRET: &str = "integration-test-secret";
const API_KEY: &str = "producer-key";

fn settings() -> Settings {
    Settings {
        server: Default::default(),
        jwt: JwtConfig {
            secret: SECRET.to_string(),
            issuer: None,
            audience: None,
        },
        api: ApiConfig {
            key: Some(API_KEY.to_string()),
        },
        redis: Default::default(),
        websocket: Default::default(),
        realtime: Default::default(),
        digest: Default::default(),
        otel: Default::default(),
    }
}

fn app() -> Router {
    create_app(AppState::new(settings()))
}

fn token(user_id: &str) -> String {
    issue_token(&Claims::for_user(user_id, 3600), SECRET).unwrap()
}

fn request(method: Method, uri: &str, user_id: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user_id)));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn producer_request(body: Value, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/events")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn comment_event(user_id: &str) -> Value {
    json!({
        "userId": user_id,
        "type": "comment.created",
        "category": "Comments",
        "priority": "Medium",
        "title": "New comment",
        "message": "On candidate #42"
    })
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["repository"], "memory");
}

#[tokio::test]
async fn test_preferences_require_token() {
    let response = app()
        .oneshot(request(Method::GET, "/api/v1/preferences", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_preferences_replace_and_reset() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/preferences", Some("alice"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut prefs = json_body(response).await;
    assert_eq!(prefs["enabled"], true);

    prefs["soundEnabled"] = json!(false);
    let response = app
        .clone()
        .oneshot(request(Method::PUT, "/api/v1/preferences", Some("alice"), Some(prefs)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["soundEnabled"], false);

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/v1/preferences/reset", Some("alice"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["soundEnabled"], true);
}

#[tokio::test]
async fn test_invalid_preferences_rejected_and_previous_kept() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/preferences", Some("bob"), None))
        .await
        .unwrap();
    let mut prefs = json_body(response).await;
    prefs["desktopNotifications"] = json!(false);

    let response = app
        .clone()
        .oneshot(request(Method::PUT, "/api/v1/preferences", Some("bob"), Some(prefs.clone())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    prefs["quietHours"]["timezone"] = json!("Mars/Olympus_Mons");
    let response = app
        .clone()
        .oneshot(request(Method::PUT, "/api/v1/preferences", Some("bob"), Some(prefs)))
        .await
        .unwrap();
    assert!(response.status().is_client_error());

    let response = app
        .oneshot(request(Method::GET, "/api/v1/preferences", Some("bob"), None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["desktopNotifications"], false);
}

#[tokio::test]
async fn test_producer_endpoint_requires_api_key() {
    let app = app();

    let response = app
        .clone()
        .oneshot(producer_request(comment_event("carol"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(producer_request(comment_event("carol"), Some("wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_notification_lifecycle() {
    let app = app();

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(producer_request(comment_event("dave"), Some(API_KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["delivered"], true);
    }

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/notifications?page=1&limit=2", Some("dave"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["total"], 3);
    assert_eq!(page["hasMore"], true);
    assert_eq!(page["unreadCount"], 3);
    let first_id = page["items"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/api/v1/notifications/{}/read", first_id),
            Some("dave"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["isRead"], true);

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/v1/notifications/unread-count", Some("dave"), None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["unreadCount"], 2);

    let response = app
        .clone()
        .oneshot(request(Method::PATCH, "/api/v1/notifications/read-all", Some("dave"), None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["updated"], 2);

    let response = app
        .clone()
        .oneshot(request(
            Method::DELETE,
            &format!("/api/v1/notifications/{}", first_id),
            Some("dave"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request(
            Method::DELETE,
            &format!("/api/v1/notifications/{}", first_id),
            Some("dave"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_users_cannot_touch_each_others_notifications() {
    let app = app();

    let response = app
        .clone()
        .oneshot(producer_request(comment_event("erin"), Some(API_KEY)))
        .await
        .unwrap();
    let id = json_body(response).await["result"]["notificationId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(request(
            Method::PATCH,
            &format!("/api/v1/notifications/{}/read", id),
            Some("mallory"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_exposed() {
    let response = app()
        .oneshot(request(Method::GET, "/metrics", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("ara_connections_total"));
}

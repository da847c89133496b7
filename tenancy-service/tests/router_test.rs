mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestContext;
use tenancy_service::build_router;
use tower::util::ServiceExt;
use uuid::Uuid;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let ctx = TestContext::new();
    let app = build_router(ctx.state.clone());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn inbound_request_id_is_echoed() {
    let ctx = TestContext::new();
    let app = build_router(ctx.state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "trace-me-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-me-123");
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let ctx = TestContext::new();
    let app = build_router(ctx.state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/account/sign-in")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn invitation_view_rejects_a_bad_session_but_not_a_missing_one() {
    let ctx = TestContext::new();
    let app = build_router(ctx.state.clone());
    let path = format!("/organization/invitation/{}", Uuid::new_v4());

    let response = app
        .clone()
        .oneshot(Request::builder().uri(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(
            Request::builder()
                .uri(&path)
                .header(header::AUTHORIZATION, "Bearer garbage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn validation_errors_are_unprocessable() {
    let ctx = TestContext::new();
    let app = build_router(ctx.state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/account/sign-up")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"not-an-email","password":"x"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn german_clients_see_the_german_default_name() {
    let ctx = TestContext::new();
    let owner_id = ctx.register("owner@example.com").await;
    let token = ctx
        .state
        .jwt
        .issue_session(owner_id)
        .unwrap()
        .access_token;
    let app = build_router(ctx.state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/organization")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::ACCEPT_LANGUAGE, "de-DE,de;q=0.9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Meine Organisation");
}

#![cfg(feature = "axum")]

mod common;

use axum::{Router, body::Body, routing::get};
use http::{Request, StatusCode, header};
use tower::ServiceExt as _;
use tower_cookies::Cookie;
use tower_sealed_session::Session;

fn routes() -> Router {
    Router::new()
        .route(
            "/set-user",
            get(|session: Session| async move {
                session
                    .insert("user", "alice")
                    .expect("session insert succeeds");
                session.save().await.expect("session save succeeds");
            }),
        )
        .route(
            "/get-user",
            get(|session: Session| async move {
                session
                    .get::<String>("user")
                    .expect("session get succeeds")
                    .unwrap_or_else(|| "none".to_string())
            }),
        )
}

async fn issue_cookie(app: &Router) -> Cookie<'static> {
    let req = Request::builder()
        .uri("/set-user")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = app
        .clone()
        .oneshot(req)
        .await
        .expect("service call succeeds");
    common::get_session_cookie(&res)
}

async fn get_user(app: Router, cookie: &Cookie<'_>) -> (StatusCode, String) {
    let req = Request::builder()
        .uri("/get-user")
        .header(header::COOKIE, common::cookie_header_value(cookie))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = app.oneshot(req).await.expect("service call succeeds");
    (res.status(), common::body_string(res.into_body()).await)
}

#[tokio::test]
async fn untampered_cookie_roundtrips() {
    let app = routes().layer(common::make_layer(common::config()));
    let session_cookie = issue_cookie(&app).await;

    assert_eq!(
        get_user(app, &session_cookie).await,
        (StatusCode::OK, "alice".to_string())
    );
}

#[tokio::test]
async fn tampered_ciphertext_loads_empty_session() {
    let app = routes().layer(common::make_layer(common::config()));
    let mut session_cookie = issue_cookie(&app).await;

    let tampered = common::tamper_sealed_value(session_cookie.value());
    session_cookie.set_value(tampered);

    assert_eq!(
        get_user(app, &session_cookie).await,
        (StatusCode::OK, "none".to_string())
    );
}

#[tokio::test]
async fn tampered_version_suffix_loads_empty_session() {
    // Dropping the version suffix makes the token read as the legacy format, whose payload has
    // no `persistent` envelope here.
    let app = routes().layer(common::make_layer(common::config()));
    let mut session_cookie = issue_cookie(&app).await;

    let value = session_cookie.value().trim_end_matches("~2").to_owned();
    session_cookie.set_value(value);

    assert_eq!(
        get_user(app, &session_cookie).await,
        (StatusCode::OK, "none".to_string())
    );
}

#[tokio::test]
async fn truncated_cookie_loads_empty_session() {
    let app = routes().layer(common::make_layer(common::config()));
    let mut session_cookie = issue_cookie(&app).await;

    let value = session_cookie
        .value()
        .splitn(3, '*')
        .take(2)
        .collect::<Vec<_>>()
        .join("*");
    session_cookie.set_value(value);

    assert_eq!(
        get_user(app, &session_cookie).await,
        (StatusCode::OK, "none".to_string())
    );
}

#[tokio::test]
async fn cookie_from_another_secret_loads_empty_session() {
    let app = routes().layer(common::make_layer(common::config()));
    let session_cookie = issue_cookie(&app).await;

    let other = routes().layer(common::make_layer(tower_sealed_session::SessionConfig::new(
        "session",
        common::PASSWORD_2,
    )));

    assert_eq!(
        get_user(other, &session_cookie).await,
        (StatusCode::OK, "none".to_string())
    );
}

#[tokio::test]
async fn wrong_prefix_fails_the_request() {
    // Not a soft failure: the token claims to be a seal but is not one this engine understands.
    let app = routes().layer(common::make_layer(common::config()));
    let mut session_cookie = issue_cookie(&app).await;

    let value = session_cookie.value().replacen("Fe26.2", "Fe26.1", 1);
    session_cookie.set_value(value);

    let (status, _) = get_user(app, &session_cookie).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn oversized_expiration_loads_empty_session() {
    // Exercise: the expiration field is all digits but does not fit in an i64.
    // Expectation: the hmac check rejects it and the request proceeds with an empty session.
    let app = routes().layer(common::make_layer(common::config()));
    let mut session_cookie = issue_cookie(&app).await;

    let mut parts: Vec<String> = session_cookie
        .value()
        .split('*')
        .map(str::to_owned)
        .collect();
    parts[5] = "99999999999999999999999".to_owned();
    session_cookie.set_value(parts.join("*"));

    assert_eq!(
        get_user(app, &session_cookie).await,
        (StatusCode::OK, "none".to_string())
    );
}

#![allow(dead_code)]

// Shared helpers for integration tests.
//
// These helpers use `tower_cookies::Cookie` parsing/encoding to match what the middleware emits
// in `Set-Cookie` and what browsers send back in `Cookie`.
use axum::body::Body;
use http::{HeaderMap, Response, header};
use http_body_util::BodyExt as _;
use tower_cookies::Cookie;
use tower_sealed_session::{SessionConfig, SessionManagerLayer};

pub const PASSWORD_1: &str = "first-password-that-is-at-least-32-bytes";
pub const PASSWORD_2: &str = "second-password-that-is-at-least-32-bytes";

pub async fn body_string(body: Body) -> String {
    // Collect an Axum body into a UTF-8 string for assertions.
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn config() -> SessionConfig {
    SessionConfig::new("session", PASSWORD_1).with_secure(false)
}

pub fn make_layer(config: SessionConfig) -> SessionManagerLayer {
    SessionManagerLayer::new(config).expect("session config is valid")
}

pub fn get_session_cookie(res: &Response<Body>) -> Cookie<'static> {
    // Convenience: parse the session cookie from a response.
    get_session_cookie_from_headers(res.headers())
}

pub fn get_session_cookie_from_headers(headers: &HeaderMap) -> Cookie<'static> {
    // Parse the first `Set-Cookie` header into a `Cookie` structure.
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("response includes set-cookie header");
    parse_set_cookie(set_cookie.to_str().expect("set-cookie header is valid utf-8"))
}

pub fn get_all_set_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| parse_set_cookie(value.to_str().expect("set-cookie header is valid utf-8")))
        .collect()
}

pub fn parse_set_cookie(set_cookie: &str) -> Cookie<'static> {
    Cookie::parse_encoded(set_cookie.to_owned()).expect("set-cookie parses successfully")
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    // Encode a cookie for use in a `Cookie` request header.
    cookie.stripped().encoded().to_string()
}

pub fn tamper_sealed_value(value: &str) -> String {
    // Flip one character inside the encrypted component (the fifth `*`-separated field).
    let mut parts: Vec<String> = value.split('*').map(str::to_owned).collect();
    let encrypted = &mut parts[4];
    let replacement = if encrypted.starts_with('A') { "B" } else { "A" };
    encrypted.replace_range(0..1, replacement);
    parts.join("*")
}

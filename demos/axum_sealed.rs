use std::net::SocketAddr;

use axum::{Router, routing::get};
use time::Duration;
use tower_sealed_session::{SameSite, Session, SessionConfig, SessionManagerLayer};

async fn index(session: Session) -> String {
    let n: usize = session
        .get("n")
        .expect("session get succeeds")
        .unwrap_or(0);
    session
        .insert("n", n + 1)
        .expect("session insert succeeds");
    session.save().await.expect("session save succeeds");
    format!("n={n}")
}

async fn logout(session: Session) -> &'static str {
    session.destroy();
    "bye"
}

#[tokio::main]
async fn main() {
    let session_config = SessionConfig::new(
        "session",
        // Newest id seals new cookies; id 1 still opens cookies issued before the rotation.
        [
            (1, "an-older-password-that-is-at-least-32-bytes"),
            (2, "the-current-password-that-is-at-least-32-bytes"),
        ],
    )
    // Default: 15 days
    .with_ttl(Duration::hours(1))
    // Default: true
    .with_http_only(true)
    // Default: SameSite::Lax
    .with_same_site(SameSite::Strict)
    // Default: true (set to false for local HTTP development)
    .with_secure(false)
    // Default: "/"
    .with_path("/")
    // Default: None
    .without_domain()
    // Default: 4096
    .with_max_cookie_bytes(4096);
    let session_layer = SessionManagerLayer::new(session_config).expect("session config is valid");

    let app = Router::new()
        .route("/", get(index))
        .route("/logout", get(logout))
        .layer(session_layer);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    println!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}

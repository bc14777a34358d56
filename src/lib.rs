//! Stateless sealed-cookie sessions for `tower` and `axum`.
//!
//! Session data never touches server-side storage. It is serialized, encrypted and
//! authenticated into a token that lives entirely in a cookie, and every request carries it
//! back.
//!
//! # Tokens
//! Tokens are iron `Fe26.2` seals followed by a format version suffix (`~2`). Tokens written by
//! the older, unsuffixed format are still read, and are rewritten in the current format on the
//! next save.
//!
//! # Password rotation
//! Configure a map of password ids to secrets. New cookies are sealed with the highest id;
//! cookies sealed with any other registered id keep working until that id is removed.
//!
//! # Failures
//! Expired, tampered, malformed or rotated-out cookies load as an empty session instead of
//! failing the request. Saving after the response headers were sent, or saving a cookie larger
//! than the configured limit (4096 bytes by default), is an error.
//!
//! CSRF protection is the application's responsibility.

mod config;
mod error;
mod exchange;
pub mod format;
mod handler;
pub mod layer;
mod password;
pub mod seal;
mod sealer;
mod session;

pub use tower_cookies::cookie::SameSite;

pub use crate::config::{DEFAULT_MAX_COOKIE_BYTES, DEFAULT_TTL, SessionConfig, TIMESTAMP_SKEW};
pub use crate::error::{Error, Result};
pub use crate::exchange::{
    BufferedExchange, CookieExchange, ResponseHeaders, TrackedExchange, exchange,
};
pub use crate::handler::{
    ConfigSource, RenderContext, RenderHandler, SessionHandler, with_session,
    with_session_render,
};
pub use crate::layer::SessionManagerLayer;
pub use crate::password::{MIN_PASSWORD_BYTES, Password, PasswordMap, Secret};
pub use crate::seal::{IronSeal, SealEngine, SealError, select_engine};
pub use crate::sealer::Sealer;
pub use crate::session::{Session, SessionState, get_session};

use crate::seal::SealError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected before any cryptographic work: missing cookie name, short password, ...
    #[error("bad session configuration: {0}")]
    Configuration(String),

    #[error(
        "cannot set session cookie: save() was called after the response headers were sent"
    )]
    HeadersSent,

    #[error("session cookie is too big ({length} > {limit} bytes), browsers will refuse it")]
    CookieTooLarge { length: usize, limit: usize },

    /// A seal engine failure outside the soft-failure set.
    #[error(transparent)]
    Seal(#[from] SealError),

    #[error("session data could not be serialized: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid set-cookie header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    #[error("no seal engine is available")]
    NoSealEngine,
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

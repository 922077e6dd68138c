use thiserror::Error;

/// Error taxonomy shared by the directory and the peer. Transport layers
/// (tonic on the directory side, actix-web on the peer side) map each
/// variant to their own status code exactly once, at the boundary.
#[derive(Error, Debug, Clone)]
pub enum DirectoryError {
    #[error("missing, unknown, or expired token")]
    Auth,

    #[error("unique-index violation: {0}")]
    Conflict(String),

    #[error("too many failed login attempts")]
    RateLimited,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

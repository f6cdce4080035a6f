//! Error types shared across the authentication core, the catalog client and
//! the query parser.

use std::{io, path::PathBuf};

use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the authentication subsystem.
///
/// The callback listener translates its own failures into one of these and
/// hands it to the waiting login flow; nothing crosses the HTTP boundary
/// except the status code sent back to the browser.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not authenticated, run `moodify login` first")]
    NotAuthenticated,

    #[error("token storage failed at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("token file {} is corrupt: {source}", path.display())]
    CorruptData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid state parameter in callback")]
    CsrfMismatch,

    #[error("authorization denied: {error} - {description}")]
    AuthorizationDenied { error: String, description: String },

    #[error("no authorization code received")]
    MissingCode,

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("none of the ports {0:?} is available")]
    NoPortAvailable(Vec<u16>),

    #[error("failed to bind callback server on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("invalid authorization endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("authentication cancelled")]
    Cancelled,

    #[error("authentication timed out waiting for the browser")]
    DeadlineExceeded,

    #[error("authentication failed on every candidate port, last error: {0}")]
    AllPortsFailed(Box<AuthError>),
}

impl AuthError {
    /// Whether the error ends an interactive login outright instead of
    /// allowing another port to be tried.
    pub fn is_interruption(&self) -> bool {
        matches!(self, AuthError::Cancelled | AuthError::DeadlineExceeded)
    }
}

/// Failures talking to the Spotify Web API.
#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("request to Spotify failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Spotify rejected the access token, run `moodify login` again")]
    Unauthorized,

    #[error("Spotify returned {status}: {message}")]
    Status { status: StatusCode, message: String },
}

/// Failures of the hosted query parser. Callers fall back to keyword parsing.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query parser request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("query parser returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("query parser returned no choices")]
    EmptyResponse,
}

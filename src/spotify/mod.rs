//! # Spotify Integration Module
//!
//! Everything that talks to Spotify over HTTP lives here.
//!
//! ## Modules
//!
//! - [`auth`] - The [`Authenticator`](auth::Authenticator): interactive login
//!   with PKCE, automatic port fallback, token refresh and logout.
//! - [`token`] - The two grants of the token endpoint (authorization code
//!   with verifier, and refresh token).
//! - [`client`] - [`SpotifyClient`](client::SpotifyClient), a Web API client
//!   bound to one access token.
//!
//! ## Token Lifecycle
//!
//! ```text
//! login ──► exchange_code_pkce ──► TokenStore::save
//!                                        │
//! command ──► ensure_authenticated_client ◄┘
//!                 │ expiring within 5 min?
//!                 └──► refresh_token ──► TokenStore::save (best effort)
//! ```
//!
//! ## Rate Limiting
//!
//! Web API calls answered with `429 Too Many Requests` are retried after the
//! `Retry-After` delay, at most three attempts in total. A `401` is never
//! retried; the user is told to log in again.

pub mod auth;
pub mod client;
pub mod token;

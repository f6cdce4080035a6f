//! # API Module
//!
//! HTTP endpoints served by the short-lived login listener.
//!
//! ## Endpoints
//!
//! - [`callback`] - `GET /callback`, the redirect target of Spotify's
//!   authorization page. It validates the `state` parameter, exchanges the
//!   authorization code for a token and hands the outcome to the waiting
//!   login flow exactly once.
//!
//! Nothing else is routed; any other path gets axum's default 404.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use moodify::api::callback;
//!
//! let app = Router::new()
//!     .route("/callback", get(callback))
//!     .with_state(attempt);
//! ```

mod callback;

pub use callback::callback;

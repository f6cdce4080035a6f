//! Moodify: search Spotify with natural-language mood descriptions.
//!
//! The library holds everything the `moodify` binary does, so integration
//! tests can drive it directly.
//!
//! # Modules
//!
//! - `api` - HTTP handler of the login callback listener
//! - `browser` - How the authorization URL reaches the user
//! - `cli` - Command implementations
//! - `config` - Constants, environment variables and the `.env` file
//! - `error` - Error types
//! - `management` - Token persistence
//! - `query` - Natural-language query parsing
//! - `server` - The loopback callback listener and port selection
//! - `spotify` - Authentication flow, token endpoint and Web API client
//! - `types` - Data structures shared across modules
//! - `utils` - PKCE helpers, seed building and formatting
//!
//! # Example
//!
//! ```ignore
//! use moodify::{browser::BrowserOpener, management::TokenStore, spotify::auth::Authenticator};
//!
//! let auth = Authenticator::new(TokenStore::default_location(), BrowserOpener);
//! if auth.quick_check().await {
//!     // token present and valid for more than a minute
//! }
//! ```

pub mod api;
pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod query;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// Result type of the command layer.
///
/// Library code returns the typed errors from [`error`]; commands mix several
/// of them and plain messages, so they box.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// Creates a formatted output line with a distinctive blue "o" indicator
/// followed by the provided message. Used for general information and
/// status updates throughout the application.
///
/// # Arguments
///
/// The macro accepts the same arguments as `println!`, supporting format
/// strings and interpolation.
///
/// # Example
///
/// ```ignore
/// info!("Starting Spotify authentication...");
/// info!("Results for \"{}\" ({} tracks)", query, count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// Creates a formatted output line with a green "✓" indicator to signify
/// successful completion of operations. Used to provide positive feedback
/// when operations complete successfully.
///
/// # Arguments
///
/// The macro accepts the same arguments as `println!`, supporting format
/// strings and interpolation.
///
/// # Example
///
/// ```ignore
/// success!("Logged out, stored credentials removed.");
/// success!("Created playlist '{}' with {} tracks", name, count);
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Creates a formatted error output with a red "!" indicator and immediately
/// terminates the program with exit code 1. Used for unrecoverable errors
/// that require immediate program termination.
///
/// # Arguments
///
/// The macro accepts the same arguments as `println!`, supporting format
/// strings and interpolation.
///
/// # Behavior
///
/// This macro will cause the program to exit immediately after printing
/// the error message. It should only be used for fatal errors where
/// recovery is not possible.
///
/// # Example
///
/// ```ignore
/// error!("Cannot load environment. Err: {}", e);
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Creates a formatted output line with a yellow "!" indicator to highlight
/// potential issues or important notices that don't require program termination.
/// Used for recoverable issues or important information that users should notice.
///
/// # Arguments
///
/// The macro accepts the same arguments as `println!`, supporting format
/// strings and interpolation.
///
/// # Example
///
/// ```ignore
/// warning!("Login on port {} failed: {}", port, e);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}

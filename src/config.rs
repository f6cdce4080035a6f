//! Configuration management for moodify.
//!
//! Values are resolved in this order:
//! 1. Environment variables (highest priority)
//! 2. A `.env` file in the moodify configuration directory
//! 3. Built-in defaults
//!
//! Nothing here panics on a missing variable; every accessor has a default.

use std::{env, path::PathBuf};

/// Client id of the shared moodify application registered with Spotify.
///
/// It is registered with every port in [`CALLBACK_PORTS`] so a fresh install
/// can log in without creating a Spotify app.
pub const DEFAULT_CLIENT_ID: &str = "e16f7d194de8467882f2f198eec1729f";

pub const DEFAULT_PORT: u16 = 8808;

/// Callback ports in order of preference.
pub const CALLBACK_PORTS: [u16; 5] = [8808, 8080, 3000, 8000, 9000];

pub const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENAI_MODEL: &str = "gpt-4o-mini";

/// Scopes requested at login. One token serves every command, so this is the
/// union of what search, discover, now and playlists need.
pub const SCOPES: [&str; 7] = [
    "user-top-read",
    "user-read-private",
    "playlist-read-private",
    "playlist-modify-private",
    "playlist-modify-public",
    "user-read-currently-playing",
    "user-read-playback-state",
];

pub const TOKEN_FILE_NAME: &str = "token.json";
const CONFIG_DIR_NAME: &str = "moodify";

/// Loads environment variables from `.env` in the configuration directory.
///
/// A missing file is not an error; variables already present in the process
/// environment win over the file.
pub async fn load_env() -> Result<(), String> {
    let path = config_dir().join(".env");
    if !async_fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        return Ok(());
    }

    dotenv::from_path(&path).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Directory holding the token file and the optional `.env`.
///
/// `MOODIFY_CONFIG_DIR` overrides the platform location:
/// - Linux: `~/.config/moodify`
/// - macOS: `~/Library/Application Support/moodify`
/// - Windows: `%APPDATA%/moodify`
pub fn config_dir() -> PathBuf {
    if let Some(dir) = non_empty_var("MOODIFY_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(CONFIG_DIR_NAME);
    path
}

/// Client id from `SPOTIFY_CLIENT_ID`, falling back to [`DEFAULT_CLIENT_ID`].
pub fn spotify_client_id() -> String {
    non_empty_var("SPOTIFY_CLIENT_ID").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string())
}

pub fn uses_default_client_id() -> bool {
    spotify_client_id() == DEFAULT_CLIENT_ID
}

pub fn spotify_auth_url() -> String {
    non_empty_var("SPOTIFY_AUTH_URL").unwrap_or_else(|| SPOTIFY_AUTH_URL.to_string())
}

pub fn spotify_token_url() -> String {
    non_empty_var("SPOTIFY_TOKEN_URL").unwrap_or_else(|| SPOTIFY_TOKEN_URL.to_string())
}

pub fn spotify_api_url() -> String {
    non_empty_var("SPOTIFY_API_URL").unwrap_or_else(|| SPOTIFY_API_URL.to_string())
}

/// Key for the hosted query parser. Absent means keyword parsing only.
pub fn openai_api_key() -> Option<String> {
    non_empty_var("OPENAI_API_KEY")
}

pub fn openai_chat_url() -> String {
    non_empty_var("OPENAI_CHAT_URL").unwrap_or_else(|| OPENAI_CHAT_URL.to_string())
}

pub fn redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{port}/callback")
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

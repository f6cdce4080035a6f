//! # CLI Module
//!
//! User-facing commands. Each command returns [`Res`] and leaves printing of
//! the final error to `main`.
//!
//! ## Commands
//!
//! - [`login`], [`logout`], [`status`] - managing the stored Spotify token
//! - [`search`] - natural-language search through recommendations
//! - [`discover`] - recommendations from genre, decade, mood, energy and
//!   popularity flags
//! - [`now`] - the currently playing track
//! - [`test_parser`] - checks the hosted query parser against keyword parsing
//! - [`playlists`] - the user's playlists
//!
//! Every command that talks to the Web API first gates on the cheap local
//! token check and then obtains a client through
//! [`Authenticator::ensure_authenticated_client`], which refreshes the token
//! when it is about to expire.

mod auth;
mod discover;
mod now;
mod parser;
mod playlists;
mod search;

pub use auth::{login, logout, status};
pub use discover::{DiscoverOptions, discover};
pub use now::now;
pub use parser::test_parser;
pub use playlists::{PlaylistFilter, playlists};
pub use search::{SearchOptions, search};

use tabled::{Table, Tabled};

use crate::{
    Res,
    browser::BrowserOpener,
    config,
    error::AuthError,
    info,
    management::TokenStore,
    spotify::{auth::Authenticator, client::SpotifyClient},
    types::{AuthConfig, Filters, Track, TrackTableRow},
    warning,
};

fn authenticator() -> Authenticator {
    Authenticator::new(TokenStore::default_location(), BrowserOpener)
}

/// Client for API commands, or `NotAuthenticated` with a hint printed.
async fn authenticated_client() -> Res<SpotifyClient> {
    let authenticator = authenticator();

    if !authenticator.quick_check().await {
        warning!("Authentication required!");
        info!("Run this command to get started: moodify login");
        return Err(AuthError::NotAuthenticated.into());
    }

    let auth_config = AuthConfig::from_env(config::DEFAULT_PORT);
    match authenticator.ensure_authenticated_client(&auth_config).await {
        Ok(client) => Ok(client),
        Err(e) => {
            warning!("Token expired or invalid. Please re-authenticate: moodify login");
            Err(e.into())
        }
    }
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows);
    println!("{}", table);
}

fn print_tracks(tracks: &[Track]) {
    let rows: Vec<TrackTableRow> = tracks
        .iter()
        .enumerate()
        .map(|(i, t)| TrackTableRow {
            position: i + 1,
            track: t.name.clone(),
            artist: t.first_artist().unwrap_or("Unknown").to_string(),
            year: match t.year() {
                0 => "-".to_string(),
                year => year.to_string(),
            },
            link: t.spotify_url().unwrap_or_default().to_string(),
        })
        .collect();

    print_table(rows);
}

fn print_filters(f: &Filters) {
    if f.genres.is_empty() {
        println!("  Genres: (none detected)");
    } else {
        println!("  Genres: {}", f.genres.join(", "));
    }
    if f.min_energy > 0.0 || f.max_energy < 1.0 {
        println!("  Energy: {:.2} - {:.2}", f.min_energy, f.max_energy);
    }
    if f.min_valence > 0.0 || f.max_valence < 1.0 {
        println!("  Mood (valence): {:.2} - {:.2}", f.min_valence, f.max_valence);
    }
    if f.min_danceability > 0.0 || f.max_danceability < 1.0 {
        println!(
            "  Danceability: {:.2} - {:.2}",
            f.min_danceability, f.max_danceability
        );
    }
    if f.has_year_range() {
        println!("  Year range: {} - {}", f.year_start, f.year_end);
    }
    if f.min_tempo > 0.0 && f.max_tempo > 0.0 {
        println!("  Tempo: {:.0} - {:.0} BPM", f.min_tempo, f.max_tempo);
    }
}

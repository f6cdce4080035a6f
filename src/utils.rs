use std::collections::HashSet;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Datelike, Duration, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::types::{Filters, Seeds, Track, TrackAttributes};

const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 16;
const MAX_SEEDS: usize = 5;

/// Genres the recommendations endpoint accepts as seeds.
const VALID_GENRES: [&str; 44] = [
    "acoustic", "afrobeat", "alt-rock", "alternative", "ambient", "blues", "bossanova", "brazil",
    "breakbeat", "british", "chill", "classical", "club", "country", "dance", "dancehall",
    "deep-house", "disco", "drum-and-bass", "dub", "dubstep", "edm", "electronic", "folk", "funk",
    "garage", "gospel", "groove", "hip-hop", "house", "indie", "indie-pop", "jazz", "latin",
    "metal", "pop", "punk", "r-n-b", "reggae", "rock", "soul", "techno", "trance", "world-music",
];

const MUSICAL_KEYS: [&str; 12] = [
    "C", "C#/Db", "D", "D#/Eb", "E", "F", "F#/Gb", "G", "G#/Ab", "A", "A#/Bb", "B",
];

/// PKCE code verifier: 32 random bytes, base64url without padding.
pub fn generate_code_verifier() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes::<VERIFIER_BYTES>())
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// CSRF state: 16 random bytes, independent of the verifier.
pub fn generate_state() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes::<STATE_BYTES>())
}

fn random_bytes<const N: usize>() -> [u8; N] {
    // ThreadRng is a CSPRNG seeded from the OS.
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes[..]);
    bytes
}

/// Blue braille spinner ticking in the background until finished.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb.set_message(message.into());
    pb
}

/// Year from a Spotify release date (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`), 0 if
/// unparseable.
pub fn parse_year(release_date: &str) -> i32 {
    release_date
        .get(..4)
        .and_then(|y| y.parse().ok())
        .unwrap_or(0)
}

/// Lowercases and keeps only genres usable as recommendation seeds.
pub fn validate_genres(genres: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    genres
        .iter()
        .map(|g| g.trim().to_lowercase())
        .filter(|g| VALID_GENRES.contains(&g.as_str()))
        .filter(|g| seen.insert(g.clone()))
        .collect()
}

/// Builds recommendation seeds from parsed genres and fallback artist ids.
///
/// Artists are only used when no valid genre survived, at most two of them,
/// and `pop` is the last resort so the request always carries a seed.
pub fn build_seeds(genres: &[String], fallback_artists: &[String]) -> Seeds {
    let mut seeds = Seeds {
        genres: validate_genres(genres),
        ..Seeds::default()
    };

    if seeds.genres.is_empty() {
        seeds.artists = fallback_artists.iter().take(2).cloned().collect();
    }

    if seeds.is_empty() {
        seeds.genres.push("pop".to_string());
    }

    if seeds.len() > MAX_SEEDS {
        seeds.genres.truncate(3);
        seeds.artists.truncate(2);
    }

    seeds
}

/// Search query used when recommendations are unavailable.
pub fn build_search_query(original: &str, filters: &Filters) -> String {
    let mut query = original.to_string();

    if let Some(genre) = filters.genres.first() {
        query.push_str(&format!(" genre:{genre}"));
    }

    match (filters.year_start, filters.year_end) {
        (0, 0) => {}
        (start, 0) => query.push_str(&format!(" year:{start}-{}", current_year())),
        (0, end) => query.push_str(&format!(" year:1950-{end}")),
        (start, end) => query.push_str(&format!(" year:{start}-{end}")),
    }

    query
}

fn current_year() -> i32 {
    Utc::now().year()
}

/// Keeps tracks released within `[start, end]`; a zero bound is open.
pub fn filter_by_year(tracks: Vec<Track>, start: i32, end: i32) -> Vec<Track> {
    if start == 0 && end == 0 {
        return tracks;
    }

    tracks
        .into_iter()
        .filter(|t| {
            let year = t.year();
            (start == 0 || year >= start) && (end == 0 || year <= end)
        })
        .collect()
}

/// Year range for a decade flag such as `90s` or `2010s`.
pub fn decade_years(decade: &str) -> Option<(i32, i32)> {
    let start = match decade.trim().to_lowercase().as_str() {
        "60s" | "1960s" => 1960,
        "70s" | "1970s" => 1970,
        "80s" | "1980s" => 1980,
        "90s" | "1990s" => 1990,
        "2000s" => 2000,
        "2010s" => 2010,
        "2020s" => 2020,
        _ => return None,
    };
    Some((start, start + 9))
}

/// Applies a discover `--mood` to the attributes. Unknown moods are ignored.
pub fn apply_mood(attrs: &mut TrackAttributes, mood: &str) {
    match mood.trim().to_lowercase().as_str() {
        "happy" | "joyful" | "uplifting" => {
            attrs.min_valence = Some(0.7);
            attrs.min_energy = Some(0.5);
        }
        "sad" | "melancholy" | "depressing" => {
            attrs.max_valence = Some(0.4);
            attrs.max_energy = Some(0.6);
        }
        "energetic" | "pumped" | "exciting" => {
            attrs.min_energy = Some(0.7);
            attrs.min_danceability = Some(0.6);
        }
        "chill" | "relaxed" | "calm" => {
            attrs.max_energy = Some(0.5);
            attrs.min_valence = Some(0.3);
        }
        "angry" | "aggressive" | "intense" => {
            attrs.min_energy = Some(0.8);
            attrs.max_valence = Some(0.4);
        }
        "romantic" | "love" | "intimate" => {
            attrs.min_valence = Some(0.5);
            attrs.max_energy = Some(0.7);
            attrs.min_danceability = Some(0.3);
        }
        _ => {}
    }
}

pub fn apply_energy(attrs: &mut TrackAttributes, energy: &str) {
    match energy.trim().to_lowercase().as_str() {
        "low" => attrs.max_energy = Some(0.4),
        "medium" => {
            attrs.min_energy = Some(0.4);
            attrs.max_energy = Some(0.7);
        }
        "high" => attrs.min_energy = Some(0.7),
        _ => {}
    }
}

/// Popularity bounds; anything unrecognised gets a wide 10..90 window.
pub fn apply_popularity(attrs: &mut TrackAttributes, popularity: &str) {
    let (min, max) = match popularity.trim().to_lowercase().as_str() {
        "mainstream" | "popular" => (Some(70), None),
        "underground" | "obscure" => (None, Some(30)),
        "balanced" => (Some(20), Some(80)),
        _ => (Some(10), Some(90)),
    };
    attrs.min_popularity = min;
    attrs.max_popularity = max;
}

/// Human readable remaining time, e.g. `42 minutes`, `3 hours`, `2 days`.
pub fn format_time_until(d: Duration) -> String {
    if d < Duration::hours(1) {
        format!("{} minutes", d.num_minutes())
    } else if d < Duration::days(1) {
        format!("{} hours", d.num_hours())
    } else {
        format!("{} days", d.num_days())
    }
}

/// `m:ss` for a playback position in milliseconds.
pub fn format_playback_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

pub fn progress_bar(progress_ms: u64, duration_ms: u64, width: usize) -> String {
    if duration_ms == 0 {
        return "░".repeat(width);
    }

    let ratio = (progress_ms as f64 / duration_ms as f64).clamp(0.0, 1.0);
    let filled = (ratio * width as f64) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

pub fn musical_key(key: i32) -> &'static str {
    usize::try_from(key)
        .ok()
        .and_then(|k| MUSICAL_KEYS.get(k).copied())
        .unwrap_or("Unknown")
}

/// Shows only the first and last four characters of a client id.
pub fn mask_client_id(client_id: &str) -> String {
    let chars: Vec<char> = client_id.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Truncates to `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

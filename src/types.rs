use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::{config, utils};

/// OAuth client and flow parameters for one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub port: u16,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
}

impl AuthConfig {
    /// Configuration for `port` using the environment's client id and
    /// endpoints.
    pub fn from_env(port: u16) -> Self {
        Self {
            client_id: config::spotify_client_id(),
            redirect_uri: config::redirect_uri(port),
            port,
            scopes: config::SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_url: config::spotify_auth_url(),
            token_url: config::spotify_token_url(),
            api_url: config::spotify_api_url(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Moves the callback to `port`, keeping the redirect URI in step.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self.redirect_uri = config::redirect_uri(port);
        self
    }

    /// Browser URL starting the authorization code flow for this attempt.
    pub fn authorize_url(&self, pkce: &PkceParams) -> Result<url::Url, url::ParseError> {
        let scope = self.scopes.join(" ");
        url::Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", pkce.state.as_str()),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
    }
}

/// One-time PKCE material for a single login attempt. Never persisted.
#[derive(Debug, Clone)]
pub struct PkceParams {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceParams {
    pub fn generate() -> Self {
        let verifier = utils::generate_code_verifier();
        let challenge = utils::generate_code_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: utils::generate_state(),
        }
    }
}

/// Persisted credential. `expiry` is absolute so it survives restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expiry: DateTime<Utc>,
}

impl TokenRecord {
    /// True when the token expires before `now + window`.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.expiry <= Utc::now() + window
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expiry - Utc::now()
    }
}

/// Body returned by the token endpoint for both grants.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Attributes extracted from a natural-language query.
#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    pub genres: Vec<String>,
    pub min_danceability: f64,
    pub max_danceability: f64,
    pub min_energy: f64,
    pub max_energy: f64,
    pub min_valence: f64,
    pub max_valence: f64,
    pub min_tempo: f64,
    pub max_tempo: f64,
    pub min_popularity: u32,
    pub max_popularity: u32,
    pub year_start: i32,
    pub year_end: i32,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            genres: Vec::new(),
            min_danceability: 0.0,
            max_danceability: 1.0,
            min_energy: 0.0,
            max_energy: 1.0,
            min_valence: 0.0,
            max_valence: 1.0,
            min_tempo: 0.0,
            max_tempo: 0.0,
            min_popularity: 20,
            max_popularity: 100,
            year_start: 0,
            year_end: 0,
        }
    }
}

impl Filters {
    pub fn has_year_range(&self) -> bool {
        self.year_start > 0 || self.year_end > 0
    }
}

/// Recommendation seeds. Spotify accepts at most five in total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Seeds {
    pub genres: Vec<String>,
    pub artists: Vec<String>,
    pub tracks: Vec<String>,
}

impl Seeds {
    pub fn len(&self) -> usize {
        self.genres.len() + self.artists.len() + self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tuneable recommendation attributes; `None` leaves the bound unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackAttributes {
    pub min_danceability: Option<f64>,
    pub max_danceability: Option<f64>,
    pub min_energy: Option<f64>,
    pub max_energy: Option<f64>,
    pub min_valence: Option<f64>,
    pub max_valence: Option<f64>,
    pub min_tempo: Option<f64>,
    pub max_tempo: Option<f64>,
    pub min_popularity: Option<u32>,
    pub max_popularity: Option<u32>,
}

impl TrackAttributes {
    /// Query parameters for the recommendations endpoint.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let floats = [
            ("min_danceability", self.min_danceability),
            ("max_danceability", self.max_danceability),
            ("min_energy", self.min_energy),
            ("max_energy", self.max_energy),
            ("min_valence", self.min_valence),
            ("max_valence", self.max_valence),
            ("min_tempo", self.min_tempo),
            ("max_tempo", self.max_tempo),
        ];
        let ints = [
            ("min_popularity", self.min_popularity),
            ("max_popularity", self.max_popularity),
        ];

        floats
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v.to_string())))
            .chain(ints.into_iter().filter_map(|(k, v)| v.map(|v| (k, v.to_string()))))
            .collect()
    }
}

impl From<&Filters> for TrackAttributes {
    /// Only bounds above zero are forwarded; zero means "unset".
    fn from(f: &Filters) -> Self {
        let positive = |v: f64| (v > 0.0).then_some(v);
        Self {
            min_danceability: positive(f.min_danceability),
            max_danceability: positive(f.max_danceability),
            min_energy: positive(f.min_energy),
            max_energy: positive(f.max_energy),
            min_valence: positive(f.min_valence),
            max_valence: positive(f.max_valence),
            min_tempo: positive(f.min_tempo),
            max_tempo: positive(f.max_tempo),
            min_popularity: (f.min_popularity > 0).then_some(f.min_popularity),
            max_popularity: (f.max_popularity > 0).then_some(f.max_popularity),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimpleArtist {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimpleAlbum {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    #[serde(default)]
    pub album: SimpleAlbum,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub external_urls: HashMap<String, String>,
}

impl Track {
    pub fn first_artist(&self) -> Option<&str> {
        self.artists.first().map(|a| a.name.as_str())
    }

    pub fn spotify_url(&self) -> Option<&str> {
        self.external_urls.get("spotify").map(String::as_str)
    }

    pub fn year(&self) -> i32 {
        utils::parse_year(&self.album.release_date)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationsResponse {
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub tracks: Paging<Track>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl User {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: String,
    pub public: bool,
    pub collaborative: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddTrackToPlaylistRequest {
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddTrackToPlaylistResponse {
    pub snapshot_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistOwner {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTracksRef {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub public: Option<bool>,
    pub owner: PlaylistOwner,
    #[serde(default)]
    pub tracks: Option<PlaylistTracksRef>,
    #[serde(default)]
    pub external_urls: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub item: Option<Track>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub volume_percent: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackState {
    pub device: Device,
    #[serde(default)]
    pub shuffle_state: bool,
    #[serde(default)]
    pub repeat_state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioFeatures {
    pub key: i32,
    pub tempo: f64,
    pub energy: f64,
    pub danceability: f64,
    pub valence: f64,
    pub loudness: f64,
    pub speechiness: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioFeaturesResponse {
    pub audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Tabled)]
pub struct TrackTableRow {
    #[tabled(rename = "#")]
    pub position: usize,
    pub track: String,
    pub artist: String,
    pub year: String,
    pub link: String,
}

#[derive(Tabled)]
pub struct PlaylistTableRow {
    #[tabled(rename = "#")]
    pub position: usize,
    pub name: String,
    pub owner: String,
    pub visibility: String,
    pub tracks: u64,
    pub description: String,
}

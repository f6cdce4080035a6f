use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode, header::RETRY_AFTER};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    error::SpotifyError,
    types::{
        AddTrackToPlaylistRequest, AddTrackToPlaylistResponse, Artist, AudioFeatures,
        AudioFeaturesResponse, CreatePlaylistRequest, CurrentlyPlaying, Paging, PlaybackState,
        Playlist, RecommendationsResponse, SearchResponse, Seeds, Track, TrackAttributes, User,
    },
};

const MAX_ATTEMPTS: u32 = 3;
const MAX_RETRY_WAIT: Duration = Duration::from_secs(120);
const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Spotify accepts at most 100 URIs per add-tracks request.
const ADD_TRACKS_BATCH: usize = 100;

/// Spotify Web API client bound to one access token.
///
/// Only ever handed out by the authenticator, so the token it carries is
/// known to be valid for at least a few more minutes.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: Client,
    api_url: String,
    access_token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct TopArtistsResponse {
    items: Vec<Artist>,
}

impl SpotifyClient {
    pub fn new(http: Client, api_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub async fn current_user(&self) -> Result<User, SpotifyError> {
        self.get_json("/me", &[]).await
    }

    /// The user's most listened artists, used as fallback recommendation
    /// seeds.
    pub async fn top_artists(&self, limit: u32) -> Result<Vec<Artist>, SpotifyError> {
        let res: TopArtistsResponse = self
            .get_json("/me/top/artists", &[("limit", limit.to_string())])
            .await?;
        Ok(res.items)
    }

    pub async fn recommendations(
        &self,
        seeds: &Seeds,
        attrs: &TrackAttributes,
        limit: u32,
        market: Option<&str>,
    ) -> Result<Vec<Track>, SpotifyError> {
        let mut query = vec![("limit", limit.to_string())];
        for (key, values) in [
            ("seed_genres", &seeds.genres),
            ("seed_artists", &seeds.artists),
            ("seed_tracks", &seeds.tracks),
        ] {
            if !values.is_empty() {
                query.push((key, values.join(",")));
            }
        }
        if let Some(market) = market.filter(|m| !m.is_empty()) {
            query.push(("market", market.to_string()));
        }
        query.extend(attrs.query_pairs());

        let res: RecommendationsResponse = self.get_json("/recommendations", &query).await?;
        Ok(res.tracks)
    }

    pub async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Track>, SpotifyError> {
        let res: SearchResponse = self
            .get_json(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("type", "track".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(res.tracks.items)
    }

    pub async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<Playlist, SpotifyError> {
        let body = CreatePlaylistRequest {
            name: name.to_string(),
            description: description.to_string(),
            public,
            collaborative: false,
        };
        let url = self.url(&format!("/users/{user_id}/playlists"));

        let res = self.send(|| self.http.post(&url).json(&body)).await?;
        Ok(res.json().await?)
    }

    /// Adds tracks in batches of 100, stopping at the first failing batch.
    pub async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), SpotifyError> {
        let url = self.url(&format!("/playlists/{playlist_id}/tracks"));

        for chunk in uris.chunks(ADD_TRACKS_BATCH) {
            let body = AddTrackToPlaylistRequest {
                uris: chunk.to_vec(),
            };
            let res = self.send(|| self.http.post(&url).json(&body)).await?;
            let snapshot: AddTrackToPlaylistResponse = res.json().await?;
            debug!(
                playlist_id,
                count = chunk.len(),
                snapshot = %snapshot.snapshot_id,
                "tracks added"
            );
        }

        Ok(())
    }

    pub async fn current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Paging<Playlist>, SpotifyError> {
        self.get_json(
            "/me/playlists",
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    /// `None` when nothing is playing.
    pub async fn currently_playing(&self) -> Result<Option<CurrentlyPlaying>, SpotifyError> {
        self.get_optional("/me/player/currently-playing").await
    }

    /// `None` when no device is active.
    pub async fn player_state(&self) -> Result<Option<PlaybackState>, SpotifyError> {
        self.get_optional("/me/player").await
    }

    pub async fn audio_features(
        &self,
        track_id: &str,
    ) -> Result<Option<AudioFeatures>, SpotifyError> {
        let res: AudioFeaturesResponse = self
            .get_json("/audio-features", &[("ids", track_id.to_string())])
            .await?;
        Ok(res.audio_features.into_iter().flatten().next())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SpotifyError> {
        let url = self.url(path);
        let res = self.send(|| self.http.get(&url).query(query)).await?;
        Ok(res.json().await?)
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, SpotifyError> {
        let url = self.url(path);
        let res = self.send(|| self.http.get(&url)).await?;
        if res.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SpotifyError::Status {
                status: StatusCode::OK,
                message: format!("unexpected response body: {e}"),
            })
    }

    /// Sends the request built by `build`, retrying rate-limited attempts.
    ///
    /// A 429 is retried after its `Retry-After` delay, up to [`MAX_ATTEMPTS`]
    /// in total; a delay above [`MAX_RETRY_WAIT`] is not worth waiting for
    /// and is returned as an error right away.
    async fn send<F>(&self, build: F) -> Result<Response, SpotifyError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;

        loop {
            let res = build().bearer_auth(&self.access_token).send().await?;
            let status = res.status();

            if status.is_success() {
                return Ok(res);
            }

            if status == StatusCode::UNAUTHORIZED {
                return Err(SpotifyError::Unauthorized);
            }

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                let wait = retry_after(&res);
                if wait <= MAX_RETRY_WAIT {
                    warn!(
                        attempt,
                        wait_secs = wait.as_secs(),
                        "rate limited by Spotify, retrying"
                    );
                    sleep(wait).await;
                    attempt += 1;
                    continue;
                }
            }

            return Err(status_error(res).await);
        }
    }
}

fn retry_after(res: &Response) -> Duration {
    res.headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_WAIT)
}

async fn status_error(res: Response) -> SpotifyError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);

    SpotifyError::Status { status, message }
}

//! Turning a free-text vibe description into recommendation [`Filters`].
//!
//! [`simple_parse`] is a keyword heuristic that always works offline. With an
//! OpenAI API key configured, [`QueryParser::parse`] asks a hosted model for
//! the attributes instead and lays whatever it returns over the heuristic's
//! result.

use std::collections::HashSet;

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{config, error::QueryError, types::Filters};

const MAX_GENRES: usize = 3;
const TEMPERATURE: f32 = 0.2;

const SYSTEM_PROMPT: &str = "You convert a music vibe prompt into strict JSON of tuneable attributes for Spotify Recommendations.
Return ONLY JSON with fields:
genres (array of lowercase strings, max 3),
min_danceability, max_danceability (0..1),
min_energy, max_energy (0..1),
min_valence, max_valence (0..1),
min_tempo, max_tempo (BPM, realistic 60..180),
min_popularity, max_popularity (0..100),
year_start, year_end (integers or 0).
Prefer broad ranges if uncertain.";

/// Keyword to recommendation genre, checked in this order.
const GENRE_KEYWORDS: [(&str, &str); 34] = [
    ("indie", "indie"),
    ("pop", "pop"),
    ("rock", "rock"),
    ("jazz", "jazz"),
    ("house", "house"),
    ("techno", "techno"),
    ("classical", "classical"),
    ("ambient", "ambient"),
    ("electronic", "electronic"),
    ("hip-hop", "hip-hop"),
    ("hip hop", "hip-hop"),
    ("country", "country"),
    ("folk", "folk"),
    ("blues", "blues"),
    ("reggae", "reggae"),
    ("metal", "metal"),
    ("punk", "punk"),
    ("alternative", "alternative"),
    ("r&b", "r-n-b"),
    ("rnb", "r-n-b"),
    ("soul", "soul"),
    ("funk", "funk"),
    ("disco", "disco"),
    ("dance", "dance"),
    ("edm", "edm"),
    ("dubstep", "dubstep"),
    ("drum-and-bass", "drum-and-bass"),
    ("dnb", "drum-and-bass"),
    ("trance", "trance"),
    ("garage", "garage"),
    ("ska", "ska"),
    ("gospel", "gospel"),
    ("latin", "latin"),
    ("world", "world-music"),
];

/// Keyword heuristic used without a hosted model and as the base the model's
/// output is applied to.
pub fn simple_parse(text: &str) -> Filters {
    let q = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| q.contains(w));
    let mut f = Filters::default();

    if has(&["chill", "lofi"]) {
        f.genres.extend(["chill".to_string(), "ambient".to_string()]);
        f.max_energy = 0.6;
        f.max_danceability = 0.7;
    }
    if has(&["workout", "running", "gym"]) {
        f.min_energy = 0.7;
        f.min_danceability = 0.7;
        f.min_tempo = 120.0;
        f.max_tempo = 180.0;
    }
    if has(&["happy", "uplifting", "feel good"]) {
        f.min_valence = 0.6;
    }
    if has(&["sad", "melancholy"]) {
        f.max_valence = 0.5;
    }

    if has(&["90s", "1990s"]) {
        f.year_start = 1990;
        f.year_end = 1999;
    }
    if q.contains("2000s") {
        f.year_start = 2000;
        f.year_end = 2009;
    }

    f.genres.extend(
        GENRE_KEYWORDS
            .iter()
            .filter(|(keyword, _)| q.contains(keyword))
            .map(|(_, genre)| genre.to_string()),
    );
    f.genres = normalize_genres(f.genres);
    f
}

/// Lowercases, drops blanks and duplicates, keeps at most three.
fn normalize_genres(genres: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    genres
        .into_iter()
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty() && seen.insert(g.clone()))
        .take(MAX_GENRES)
        .collect()
}

/// Fields the hosted model may return. A missing or malformed field is
/// `None` and leaves the base value in place.
#[derive(Debug, Default, Deserialize)]
struct ModelFilters {
    #[serde(default, deserialize_with = "lenient")]
    genres: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    min_danceability: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    max_danceability: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    min_energy: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    max_energy: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    min_valence: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    max_valence: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    min_tempo: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    max_tempo: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    min_popularity: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    max_popularity: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    year_start: Option<i32>,
    #[serde(default, deserialize_with = "lenient")]
    year_end: Option<i32>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Overlays the model's JSON answer on `base`.
///
/// Models like to wrap JSON in a fenced code block, which is stripped. An
/// answer that is not a JSON object at all leaves `base` unchanged.
pub fn apply_model_output(content: &str, base: Filters) -> Filters {
    let json = strip_code_fence(content);
    let parsed = match serde_json::from_str::<ModelFilters>(json) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("discarding unparseable model output: {}", e);
            return base;
        }
    };

    let mut f = base;
    if let Some(genres) = parsed.genres.map(normalize_genres).filter(|g| !g.is_empty()) {
        f.genres = genres;
    }

    let floats = [
        (&mut f.min_danceability, parsed.min_danceability),
        (&mut f.max_danceability, parsed.max_danceability),
        (&mut f.min_energy, parsed.min_energy),
        (&mut f.max_energy, parsed.max_energy),
        (&mut f.min_valence, parsed.min_valence),
        (&mut f.max_valence, parsed.max_valence),
        (&mut f.min_tempo, parsed.min_tempo),
        (&mut f.max_tempo, parsed.max_tempo),
    ];
    for (slot, value) in floats {
        if let Some(v) = value {
            *slot = v;
        }
    }

    if let Some(v) = parsed.min_popularity {
        f.min_popularity = v;
    }
    if let Some(v) = parsed.max_popularity {
        f.max_popularity = v;
    }
    if let Some(v) = parsed.year_start {
        f.year_start = v;
    }
    if let Some(v) = parsed.year_end {
        f.year_end = v;
    }

    f
}

/// Where hosted filters disagree with keyword filters for the same prompt.
/// Empty when nothing compared differs.
pub fn filter_differences(hosted: &Filters, keyword: &Filters) -> Vec<String> {
    let mut differences = Vec::new();

    if hosted.genres.len() != keyword.genres.len() {
        differences.push(format!(
            "Genres: hosted model found {}, keywords found {}",
            hosted.genres.len(),
            keyword.genres.len()
        ));
    }
    if (hosted.min_energy, hosted.max_energy) != (keyword.min_energy, keyword.max_energy) {
        differences.push("Energy ranges differ".to_string());
    }
    if (hosted.min_valence, hosted.max_valence) != (keyword.min_valence, keyword.max_valence) {
        differences.push("Mood interpretation differs".to_string());
    }
    if (hosted.year_start, hosted.year_end) != (keyword.year_start, keyword.year_end) {
        differences.push("Era detection differs".to_string());
    }

    differences
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Query parser backed by an OpenAI-compatible chat completion endpoint,
/// or by [`simple_parse`] alone when no API key is configured.
#[derive(Debug, Clone)]
pub struct QueryParser {
    api_key: Option<String>,
    endpoint: String,
    model: String,
    http: Client,
}

impl QueryParser {
    pub fn new(api_key: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            endpoint: endpoint.into(),
            model: config::OPENAI_MODEL.to_string(),
            http: Client::new(),
        }
    }

    /// Uses `OPENAI_API_KEY` and the default chat completion endpoint.
    pub fn from_env() -> Self {
        Self::new(config::openai_api_key(), config::openai_chat_url())
    }

    pub fn is_hosted(&self) -> bool {
        self.api_key.is_some()
    }

    /// Parses `text` into filters.
    ///
    /// Errors from the hosted model are returned as is; callers are expected
    /// to tell the user and fall back to [`simple_parse`].
    pub async fn parse(&self, text: &str) -> Result<Filters, QueryError> {
        let Some(api_key) = &self.api_key else {
            return Ok(simple_parse(text));
        };

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Prompt: {text}"),
                },
            ],
            temperature: TEMPERATURE,
        };

        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(QueryError::Status { status, message });
        }

        let response: ChatResponse = res.json().await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(QueryError::EmptyResponse)?;

        debug!(model = %self.model, "query parsed by hosted model");
        Ok(apply_model_output(&content, simple_parse(text)))
    }
}

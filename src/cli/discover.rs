use rand::{Rng, seq::IndexedRandom};
use tracing::debug;

use crate::{
    Res, info,
    spotify::client::SpotifyClient,
    types::{Seeds, TrackAttributes},
    utils, warning,
};

const MARKET: &str = "US";
const POPULAR_GENRES: [&str; 7] = [
    "pop",
    "rock",
    "indie",
    "electronic",
    "hip-hop",
    "jazz",
    "classical",
];

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    pub genre: Option<String>,
    pub decade: Option<String>,
    pub mood: Option<String>,
    pub energy: Option<String>,
    pub popularity: Option<String>,
    pub limit: u32,
}

impl DiscoverOptions {
    fn has_criteria(&self) -> bool {
        [
            &self.genre,
            &self.decade,
            &self.mood,
            &self.energy,
            &self.popularity,
        ]
        .iter()
        .any(|o| o.is_some())
    }
}

/// `moodify discover`.
pub async fn discover(opts: DiscoverOptions) -> Res<()> {
    let client = super::authenticated_client().await?;
    let limit = if (1..=50).contains(&opts.limit) {
        opts.limit
    } else {
        20
    };

    if !opts.has_criteria() {
        return random_discovery(&client, limit).await;
    }

    let mut seeds = Seeds::default();
    if let Some(genre) = &opts.genre {
        seeds.genres.push(genre.trim().to_lowercase());
    }
    if seeds.is_empty() {
        seeds.genres.push("pop".to_string());
    }

    let (year_start, year_end) = match &opts.decade {
        Some(decade) => utils::decade_years(decade).unwrap_or_else(|| {
            warning!("Unknown decade '{}', ignoring it", decade);
            (0, 0)
        }),
        None => (0, 0),
    };

    let mut attrs = TrackAttributes::default();
    if let Some(mood) = &opts.mood {
        utils::apply_mood(&mut attrs, mood);
    }
    if let Some(energy) = &opts.energy {
        utils::apply_energy(&mut attrs, energy);
    }
    utils::apply_popularity(&mut attrs, opts.popularity.as_deref().unwrap_or_default());

    let pb = utils::spinner("Discovering tracks...");
    let result = client
        .recommendations(&seeds, &attrs, limit, Some(MARKET))
        .await;
    pb.finish_and_clear();

    let tracks = utils::filter_by_year(result?, year_start, year_end);
    if tracks.is_empty() {
        warning!("No tracks found matching your criteria. Try broadening the parameters.");
        return Ok(());
    }

    let mut headline = format!("Discovered {} tracks", tracks.len());
    if let Some(genre) = &opts.genre {
        headline.push_str(&format!(" in {genre}"));
    }
    if let Some(decade) = &opts.decade {
        headline.push_str(&format!(" from the {decade}"));
    }
    if let Some(mood) = &opts.mood {
        headline.push_str(&format!(" with {mood} vibes"));
    }
    info!("{}", headline);
    super::print_tracks(&tracks);

    Ok(())
}

/// Discovery from the user's top artists, or from random popular genres when
/// those are unavailable.
async fn random_discovery(client: &SpotifyClient, limit: u32) -> Res<()> {
    info!("No criteria given, discovering based on your taste");

    let artists: Vec<String> = match client.top_artists(5).await {
        Ok(artists) => artists.into_iter().take(3).map(|a| a.id).collect(),
        Err(e) => {
            debug!("top artists unavailable: {}", e);
            Vec::new()
        }
    };

    let mut attrs = TrackAttributes {
        min_popularity: Some(20),
        max_popularity: Some(80),
        ..TrackAttributes::default()
    };

    let seeds = if artists.is_empty() {
        let mut rng = rand::rng();
        let genres: Vec<String> = (0..3)
            .filter_map(|_| POPULAR_GENRES.choose(&mut rng))
            .map(|g| g.to_string())
            .collect();
        info!("Picking from genres: {}", genres.join(", "));
        Seeds {
            genres: utils::validate_genres(&genres),
            ..Seeds::default()
        }
    } else {
        let mut rng = rand::rng();
        if rng.random_bool(0.5) {
            attrs.min_energy = Some(0.4);
            attrs.max_energy = Some(1.0);
        }
        if rng.random_bool(0.5) {
            attrs.min_valence = Some(0.3);
            attrs.max_valence = Some(0.9);
        }
        Seeds {
            artists,
            ..Seeds::default()
        }
    };

    let pb = utils::spinner("Discovering tracks...");
    let result = client
        .recommendations(&seeds, &attrs, limit, Some(MARKET))
        .await;
    pb.finish_and_clear();

    let tracks = result?;
    if tracks.is_empty() {
        warning!("No recommendations available right now.");
        return Ok(());
    }

    info!("Found {} discoveries", tracks.len());
    super::print_tracks(&tracks);
    Ok(())
}

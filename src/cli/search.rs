use tracing::debug;

use crate::{
    Res, info,
    query::{QueryParser, simple_parse},
    spotify::client::SpotifyClient,
    success,
    types::{Filters, Track, TrackAttributes},
    utils, warning,
};

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: u32,
    pub market: String,
    pub save: Option<String>,
    pub public: bool,
    pub verbose: bool,
}

/// `moodify search <query...>`.
pub async fn search(query: &str, opts: SearchOptions) -> Res<()> {
    let client = super::authenticated_client().await?;
    let limit = opts.limit.clamp(1, 100);

    let filters = parse_query(query, opts.verbose).await;
    if opts.verbose {
        info!("Parsed filters:");
        super::print_filters(&filters);
    }

    let top_artists = if utils::validate_genres(&filters.genres).is_empty() {
        match client.top_artists(3).await {
            Ok(artists) => artists.into_iter().map(|a| a.id).collect(),
            Err(e) => {
                debug!("top artists unavailable: {}", e);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };
    let seeds = utils::build_seeds(&filters.genres, &top_artists);
    let attrs = TrackAttributes::from(&filters);

    let pb = utils::spinner("Finding tracks...");
    let found = match client
        .recommendations(&seeds, &attrs, limit, Some(&opts.market))
        .await
    {
        Ok(tracks) => Ok(tracks),
        Err(e) => {
            debug!("recommendations failed, falling back to search: {}", e);
            search_fallback(&client, query, &filters, limit).await
        }
    };
    pb.finish_and_clear();

    let tracks = match found {
        Ok(tracks) => utils::filter_by_year(tracks, filters.year_start, filters.year_end),
        Err(e) => {
            debug!("search fallback failed: {}", e);
            return Err(
                "music discovery failed, please try a different search or try again later".into(),
            );
        }
    };

    if tracks.is_empty() {
        warning!("No tracks matched your vibe. Try loosening the query.");
        return Ok(());
    }

    info!("Results for \"{}\" ({} tracks)", query, tracks.len());
    super::print_tracks(&tracks);

    if let Some(name) = opts.save {
        save_playlist(&client, &tracks, &name, opts.public).await?;
    }

    Ok(())
}

/// Hosted parsing when configured, keywords otherwise or on failure.
async fn parse_query(query: &str, verbose: bool) -> Filters {
    let parser = QueryParser::from_env();
    if !parser.is_hosted() {
        if verbose {
            info!("Using keyword parsing, set OPENAI_API_KEY for smarter results");
        }
        return simple_parse(query);
    }

    info!("Using AI-powered query parsing");
    match parser.parse(query).await {
        Ok(filters) => filters,
        Err(e) => {
            warning!("AI parsing failed, falling back to keyword parsing");
            if verbose {
                warning!("{}", e);
            }
            simple_parse(query)
        }
    }
}

async fn search_fallback(
    client: &SpotifyClient,
    query: &str,
    filters: &Filters,
    limit: u32,
) -> Res<Vec<Track>> {
    let search_query = utils::build_search_query(query, filters);
    // Over-fetch since the year filter may drop some.
    let tracks = client.search_tracks(&search_query, (limit * 2).min(50)).await?;
    if tracks.is_empty() {
        return Err("no tracks found".into());
    }

    let mut tracks = utils::filter_by_year(tracks, filters.year_start, filters.year_end);
    tracks.truncate(limit as usize);
    Ok(tracks)
}

async fn save_playlist(client: &SpotifyClient, tracks: &[Track], name: &str, public: bool) -> Res<()> {
    let uris: Vec<String> = tracks
        .iter()
        .filter(|t| t.uri.starts_with("spotify:track:"))
        .map(|t| t.uri.clone())
        .collect();
    if uris.is_empty() {
        return Err("no valid track URIs to save".into());
    }

    let pb = utils::spinner(format!("Saving to playlist {}...", name));
    let user = client.current_user().await?;
    let description = format!(
        "Generated by moodify - {} tracks discovered through natural language search",
        uris.len()
    );
    let playlist = client
        .create_playlist(&user.id, name, &description, public)
        .await?;
    client.add_tracks(&playlist.id, &uris).await?;
    pb.finish_and_clear();

    let visibility = if public { "public" } else { "private" };
    success!(
        "Created {} playlist '{}' with {} tracks",
        visibility,
        name,
        uris.len()
    );
    Ok(())
}

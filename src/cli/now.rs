use tracing::debug;

use crate::{Res, info, spotify::client::SpotifyClient, utils};

const PROGRESS_WIDTH: usize = 30;

/// `moodify now [-e]`.
pub async fn now(extended: bool) -> Res<()> {
    let client = super::authenticated_client().await?;

    let current = client.currently_playing().await?;
    let Some((current, track)) = current.and_then(|c| c.item.clone().map(|t| (c, t))) else {
        info!("Nothing is currently playing");
        println!("  Start playing music in Spotify on any device, then try again.");
        return Ok(());
    };

    info!("Now Playing");
    println!("  Track:   {}", track.name);

    let artists: Vec<&str> = track.artists.iter().map(|a| a.name.as_str()).collect();
    match artists.len() {
        0 => {}
        1 => println!("  Artist:  {}", artists[0]),
        _ => println!("  Artists: {}", artists.join(", ")),
    }

    match track.year() {
        0 => println!("  Album:   {}", track.album.name),
        year => println!("  Album:   {} ({})", track.album.name, year),
    }

    if track.duration_ms > 0 {
        let progress = current.progress_ms.unwrap_or_default();
        let percent = progress as f64 / track.duration_ms as f64 * 100.0;
        println!(
            "  Progress: {} / {} ({:.1}%)",
            utils::format_playback_duration(progress),
            utils::format_playback_duration(track.duration_ms),
            percent
        );
        println!(
            "  {}",
            utils::progress_bar(progress, track.duration_ms, PROGRESS_WIDTH)
        );
    }

    let state = if current.is_playing { "Playing" } else { "Paused" };
    println!("  Status:  {}", state);

    match client.player_state().await {
        Ok(Some(player)) => {
            println!("  Device:  {} ({})", player.device.name, player.device.kind);
            let repeat = match player.repeat_state.as_str() {
                "track" => "Track",
                "context" => "Context",
                _ => "Off",
            };
            let shuffle = if player.shuffle_state { "On" } else { "Off" };
            println!("  Shuffle: {}  Repeat: {}", shuffle, repeat);
            if let Some(volume) = player.device.volume_percent.filter(|v| *v > 0) {
                println!("  Volume:  {}%", volume);
            }
        }
        Ok(None) => {}
        Err(e) => debug!("player state unavailable: {}", e),
    }

    if let Some(url) = track.spotify_url() {
        println!("  Spotify: {}", url);
    }

    if extended {
        print_audio_features(&client, &track.id).await;
    }

    Ok(())
}

async fn print_audio_features(client: &SpotifyClient, track_id: &str) {
    println!();
    info!("Audio Features");

    let features = match client.audio_features(track_id).await {
        Ok(Some(features)) => features,
        Ok(None) => {
            println!("  Unable to get audio features for this track");
            return;
        }
        Err(e) => {
            debug!("audio features unavailable: {}", e);
            println!("  Unable to get audio features for this track");
            return;
        }
    };

    println!("  Key:          {}", utils::musical_key(features.key));
    println!("  Tempo:        {:.0} BPM", features.tempo);
    println!("  Energy:       {:.1}/1.0", features.energy);
    println!("  Danceability: {:.1}/1.0", features.danceability);
    println!("  Valence:      {:.1}/1.0", features.valence);
    println!("  Loudness:     {:.1} dB", features.loudness);

    let kind = if features.speechiness > 0.66 {
        "Mostly speech"
    } else if features.speechiness > 0.33 {
        "Music with speech"
    } else {
        "Music"
    };
    println!("  Type:         {}", kind);
}

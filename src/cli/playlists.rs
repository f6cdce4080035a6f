use crate::{
    Res, info,
    types::{Playlist, PlaylistTableRow},
    utils, warning,
};

const DESCRIPTION_WIDTH: usize = 60;

/// Visibility filter of `moodify playlists`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaylistFilter {
    #[default]
    Any,
    Public,
    Private,
}

impl PlaylistFilter {
    fn matches(self, playlist: &Playlist) -> bool {
        let public = playlist.public.unwrap_or(false);
        match self {
            PlaylistFilter::Any => true,
            PlaylistFilter::Public => public,
            PlaylistFilter::Private => !public,
        }
    }
}

/// `moodify playlists`. Only the user's own playlists unless `all` is set.
pub async fn playlists(filter: PlaylistFilter, all: bool, limit: u32) -> Res<()> {
    let client = super::authenticated_client().await?;
    let limit = if (1..=50).contains(&limit) { limit } else { 20 };

    let pb = utils::spinner("Fetching playlists...");
    let fetched = async {
        let user = client.current_user().await?;
        let page = client.current_user_playlists(limit, 0).await?;
        Ok::<_, crate::error::SpotifyError>((user, page))
    }
    .await;
    pb.finish_and_clear();
    let (user, page) = fetched?;

    if page.items.is_empty() {
        warning!("No playlists found");
        info!("Create one by searching with --save: moodify search happy songs --save \"My Happy Playlist\"");
        return Ok(());
    }

    let available = page.items.len();
    let shown: Vec<Playlist> = page
        .items
        .into_iter()
        .filter(|p| filter.matches(p))
        .filter(|p| all || p.owner.id == user.id)
        .collect();

    if shown.is_empty() {
        warning!("No playlists match your filters");
        return Ok(());
    }

    info!("Playlists for {}", user.name());
    let count = shown.len();
    let rows: Vec<PlaylistTableRow> = shown
        .into_iter()
        .enumerate()
        .map(|(i, p)| PlaylistTableRow {
            position: i + 1,
            owner: if p.owner.id == user.id {
                "you".to_string()
            } else {
                p.owner.display_name.clone().unwrap_or(p.owner.id.clone())
            },
            visibility: if p.public.unwrap_or(false) {
                "public".to_string()
            } else {
                "private".to_string()
            },
            tracks: p.tracks.as_ref().map_or(0, |t| t.total),
            description: match p.description.as_deref().filter(|d| !d.is_empty()) {
                Some(d) => utils::truncate(d, DESCRIPTION_WIDTH),
                None => "-".to_string(),
            },
            name: p.name,
        })
        .collect();
    super::print_table(rows);

    if count == available {
        info!("Showing all {} playlists", count);
    } else {
        info!("Showing {} of {} playlists (filtered)", count, available);
    }

    Ok(())
}

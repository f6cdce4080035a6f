use clap::{
    Args, CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use moodify::{
    cli::{self, DiscoverOptions, PlaylistFilter, SearchOptions},
    config, error,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authenticate with Spotify using OAuth2 PKCE
    Login(LoginOptions),

    /// Remove stored credentials
    Logout,

    /// Show authentication status and configuration
    Status,

    /// Search Spotify using natural language
    Search(SearchArgs),

    /// Discover new music by genre, decade, mood, energy or popularity
    Discover(DiscoverArgs),

    /// Show what's currently playing
    Now(NowArgs),

    /// List your playlists
    Playlists(PlaylistsArgs),

    /// Check the OpenAI query parser setup
    Test,

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Args, Debug, Clone)]
pub struct LoginOptions {
    /// Spotify client id (overrides SPOTIFY_CLIENT_ID)
    #[clap(long)]
    client_id: Option<String>,

    /// Port for the callback server
    #[clap(long)]
    port: Option<u16>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Free text description, e.g. "chill lofi study music"
    #[clap(required = true, num_args = 1..)]
    query: Vec<String>,

    /// Number of tracks to return (1-100)
    #[clap(short = 'n', long, default_value_t = 15)]
    limit: u32,

    /// ISO market code
    #[clap(long, default_value = "US")]
    market: String,

    /// Save results to a new playlist with this name
    #[clap(long)]
    save: Option<String>,

    /// Make the saved playlist public
    #[clap(long)]
    public: bool,

    /// Show parsing details
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DiscoverArgs {
    /// Genre, e.g. indie, jazz, electronic
    #[clap(short, long)]
    genre: Option<String>,

    /// Decade, e.g. 80s, 90s, 2000s, 2010s
    #[clap(short, long)]
    decade: Option<String>,

    /// happy, sad, energetic, chill, angry or romantic
    #[clap(short, long)]
    mood: Option<String>,

    /// low, medium or high
    #[clap(short, long)]
    energy: Option<String>,

    /// mainstream, underground or balanced
    #[clap(short, long)]
    popularity: Option<String>,

    /// Number of tracks (1-50)
    #[clap(short = 'n', long, default_value_t = 20)]
    limit: u32,
}

#[derive(Args, Debug, Clone)]
pub struct NowArgs {
    /// Show audio features of the track
    #[clap(short, long)]
    extended: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PlaylistsArgs {
    /// Only public playlists
    #[clap(long, conflicts_with = "private")]
    public: bool,

    /// Only private playlists
    #[clap(long)]
    private: bool,

    /// Include playlists you follow
    #[clap(long)]
    all: bool,

    /// Number of playlists (max 50)
    #[clap(short = 'n', long, default_value_t = 20)]
    limit: u32,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("MOODIFY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Login(opt) => cli::login(opt.client_id, opt.port).await,
        Command::Logout => cli::logout().await,
        Command::Status => cli::status().await,
        Command::Search(opt) => {
            let query = opt.query.join(" ");
            cli::search(
                &query,
                SearchOptions {
                    limit: opt.limit,
                    market: opt.market,
                    save: opt.save,
                    public: opt.public,
                    verbose: opt.verbose,
                },
            )
            .await
        }
        Command::Discover(opt) => {
            cli::discover(DiscoverOptions {
                genre: opt.genre,
                decade: opt.decade,
                mood: opt.mood,
                energy: opt.energy,
                popularity: opt.popularity,
                limit: opt.limit,
            })
            .await
        }
        Command::Now(opt) => cli::now(opt.extended).await,
        Command::Playlists(opt) => {
            let filter = match (opt.public, opt.private) {
                (true, _) => PlaylistFilter::Public,
                (_, true) => PlaylistFilter::Private,
                _ => PlaylistFilter::Any,
            };
            cli::playlists(filter, opt.all, opt.limit).await
        }
        Command::Test => cli::test_parser().await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{}", e);
    }
}

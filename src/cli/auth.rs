use std::time::Duration;

use tokio::time::Instant;

use crate::{
    Res, config,
    error::AuthError,
    info,
    query::QueryParser,
    server, success,
    types::AuthConfig,
    utils, warning,
};

/// Overall time budget for an interactive login.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// `moodify login`.
///
/// Without overrides every candidate port is tried in turn with the shared
/// client id. An explicit `--client-id` or non-default `--port` runs a single
/// attempt on exactly that port.
pub async fn login(client_id: Option<String>, port: Option<u16>) -> Res<()> {
    let authenticator = super::authenticator();
    let deadline = Instant::now() + LOGIN_TIMEOUT;

    let manual = client_id.is_some() || port.is_some_and(|p| p != config::DEFAULT_PORT);
    let mut auth_config = AuthConfig::from_env(config::DEFAULT_PORT);
    if let Some(id) = client_id {
        auth_config = auth_config.with_client_id(id);
    }

    info!("Starting Spotify authentication...");

    let result = if manual {
        let port = port.unwrap_or(config::DEFAULT_PORT);
        if !server::is_port_available(port) {
            return Err(format!(
                "port {} is not available, try a different one with --port",
                port
            )
            .into());
        }

        let auth_config = auth_config.with_port(port);
        info!("Redirect URI: {}", auth_config.redirect_uri);
        info!("Client ID: {}", utils::mask_client_id(&auth_config.client_id));
        authenticator.login(&auth_config, deadline).await
    } else {
        authenticator
            .smart_login(&auth_config, &config::CALLBACK_PORTS, deadline)
            .await
    };

    match result {
        Ok(token) => {
            success!(
                "Authenticated! Token valid for {}",
                utils::format_time_until(token.time_until_expiry())
            );
            info!("Try: moodify search happy upbeat songs");
            Ok(())
        }
        Err(e @ (AuthError::AllPortsFailed(_) | AuthError::NoPortAvailable(_))) => {
            print_port_help();
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_port_help() {
    warning!("Automatic login didn't work. Here's how to fix it:");
    println!();
    println!("  Option 1: try a specific port");
    println!("    moodify login --port 9999");
    println!();
    println!("  Option 2: use your own Spotify app");
    println!("    1. Go to https://developer.spotify.com/dashboard");
    println!(
        "    2. Create an app with redirect URI {}",
        config::redirect_uri(config::DEFAULT_PORT)
    );
    println!("    3. export SPOTIFY_CLIENT_ID=<your client id>");
    println!("    4. moodify login");
    println!();
    println!("  Option 3: specify both explicitly");
    println!("    moodify login --client-id <ID> --port 8808");
    println!();
}

/// `moodify logout`.
pub async fn logout() -> Res<()> {
    super::authenticator().logout().await?;
    success!("Logged out, stored credentials removed.");
    Ok(())
}

/// `moodify status`: configuration, token state and storage paths.
pub async fn status() -> Res<()> {
    let authenticator = super::authenticator();
    let store = authenticator.store();

    info!("Configuration");
    if config::uses_default_client_id() {
        println!("  Client ID: shared moodify app (no setup required)");
    } else {
        println!(
            "  Client ID: {} (custom)",
            utils::mask_client_id(&config::spotify_client_id())
        );
    }
    if QueryParser::from_env().is_hosted() {
        println!("  Query parsing: hosted model ({})", config::OPENAI_MODEL);
    } else {
        println!("  Query parsing: keywords (set OPENAI_API_KEY for smarter parsing)");
    }
    println!();

    info!("Authentication");
    if authenticator.quick_check().await {
        println!("  Status: authenticated");
        if let Ok(token) = store.load().await {
            println!(
                "  Token expires: {} ({} from now)",
                token.expiry.format("%Y-%m-%d %H:%M:%S UTC"),
                utils::format_time_until(token.time_until_expiry())
            );
        }
    } else {
        match store.load().await {
            Ok(_) => println!("  Status: token expired"),
            Err(AuthError::NotAuthenticated) => println!("  Status: not authenticated"),
            Err(e) => println!("  Status: unusable token ({})", e),
        }
        println!("  Action: run `moodify login`");
    }
    println!();

    info!("Storage");
    println!("  Config directory: {}", store.dir().display());
    let state = if store.exists().await { "present" } else { "not found" };
    println!("  Token file: {} ({})", store.path().display(), state);

    Ok(())
}

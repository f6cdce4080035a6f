use reqwest::Client;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::{
    browser::Opener,
    error::AuthError,
    info,
    management::TokenStore,
    server::{CallbackServer, pick_available_port},
    spotify::{client::SpotifyClient, token},
    types::{AuthConfig, PkceParams, TokenRecord},
    utils, warning,
};

/// Tokens expiring within this window are refreshed before use.
const REFRESH_WINDOW: chrono::Duration = chrono::Duration::minutes(5);

/// Margin `quick_check` requires before it calls a token usable.
const QUICK_CHECK_WINDOW: chrono::Duration = chrono::Duration::minutes(1);

/// Drives the OAuth 2.0 authorization code flow with PKCE and keeps the
/// stored token fresh.
///
/// Each command builds its own [`AuthConfig`] and hands it in, so nothing
/// here depends on process-wide state besides the token file.
///
/// # Login
///
/// A login attempt binds a callback listener, sends the user to the
/// authorization page and then waits for the first of:
/// - the listener's verdict on the redirect
/// - the deadline passing ([`AuthError::DeadlineExceeded`])
/// - Ctrl-C ([`AuthError::Cancelled`])
///
/// The listener is shut down whichever wins, and the token file is only
/// written when the exchange succeeded.
pub struct Authenticator {
    store: TokenStore,
    opener: Box<dyn Opener>,
    http: Client,
}

impl Authenticator {
    pub fn new(store: TokenStore, opener: impl Opener + 'static) -> Self {
        Self {
            store,
            opener: Box::new(opener),
            http: Client::new(),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Runs one login attempt on `config.port`.
    pub async fn login(
        &self,
        config: &AuthConfig,
        deadline: Instant,
    ) -> Result<TokenRecord, AuthError> {
        let pkce = PkceParams::generate();
        let auth_url = config.authorize_url(&pkce)?;

        let mut server = CallbackServer::bind(config.clone(), &pkce, self.http.clone()).await?;
        debug!(addr = %server.local_addr(), "waiting for authorization callback");

        if let Err(e) = self.opener.open(auth_url.as_str()) {
            warning!(
                "Failed to open browser ({}). Please navigate to the following URL manually:\n{}",
                e,
                auth_url
            );
        }

        let pb = utils::spinner("Waiting for authorization in your browser...");
        let outcome = tokio::select! {
            result = server.wait() => result,
            _ = sleep_until(deadline) => Err(AuthError::DeadlineExceeded),
            _ = interrupted() => Err(AuthError::Cancelled),
        };
        pb.finish_and_clear();

        server.shutdown().await;

        let token = outcome?;
        self.store.save(&token).await?;
        Ok(token)
    }

    /// Tries `candidates` in order until a login succeeds.
    ///
    /// Busy ports are skipped. A failed attempt moves on to the next free
    /// port, but cancellation and the deadline end the whole flow since
    /// another port would not change either.
    pub async fn smart_login(
        &self,
        config: &AuthConfig,
        candidates: &[u16],
        deadline: Instant,
    ) -> Result<TokenRecord, AuthError> {
        let mut remaining = candidates;
        let mut last_error = None;

        while let Ok(port) = pick_available_port(remaining) {
            let next = remaining
                .iter()
                .position(|&p| p == port)
                .map_or(remaining.len(), |i| i + 1);
            remaining = &remaining[next..];

            info!("Using callback port {}", port);
            match self.login(&config.clone().with_port(port), deadline).await {
                Ok(token) => return Ok(token),
                Err(e) if e.is_interruption() => return Err(e),
                Err(e) => {
                    warning!("Login on port {} failed: {}", port, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(AuthError::AllPortsFailed(Box::new(e))),
            None => Err(AuthError::NoPortAvailable(candidates.to_vec())),
        }
    }

    /// Returns an API client holding a token valid for at least a few more
    /// minutes, refreshing it first if needed.
    ///
    /// Persisting a refreshed token is best effort: the fresh token is still
    /// returned when the write fails. A failed refresh leaves the stored
    /// token as it was.
    pub async fn ensure_authenticated_client(
        &self,
        config: &AuthConfig,
    ) -> Result<SpotifyClient, AuthError> {
        let mut record = self.store.load().await?;

        if record.expires_within(REFRESH_WINDOW) {
            debug!(expiry = %record.expiry, "token expiring soon, refreshing");
            let refreshed = token::refresh_token(&self.http, config, &record.refresh_token).await?;

            if let Err(e) = self.store.save(&refreshed).await {
                warn!("failed to persist refreshed token: {}", e);
            }
            record = refreshed;
        }

        Ok(SpotifyClient::new(
            self.http.clone(),
            &config.api_url,
            record.access_token,
        ))
    }

    /// Whether a stored token exists and stays valid for over a minute.
    /// Never touches the network.
    pub async fn quick_check(&self) -> bool {
        match self.store.load().await {
            Ok(record) => !record.expires_within(QUICK_CHECK_WINDOW),
            Err(_) => false,
        }
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.store.delete().await
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves,
/// leaving the deadline to end the wait.
///
/// Once installed, tokio's handler replaces the default SIGINT behaviour for
/// the rest of the process, so Ctrl-C no longer terminates a caller that
/// keeps running after `login` returns.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

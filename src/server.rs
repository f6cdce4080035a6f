//! Short-lived loopback HTTP server receiving the OAuth redirect.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{Router, routing::get};
use reqwest::Client;
use tokio::{
    sync::{Mutex, oneshot},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    api,
    error::AuthError,
    types::{AuthConfig, PkceParams, TokenRecord},
};

/// Upper bound for a graceful stop before the server task is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub type CallbackResult = Result<TokenRecord, AuthError>;

/// Lifecycle of one callback listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Listening,
    Completed,
    Failed,
    Cancelled,
}

impl ListenerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ListenerState::Completed | ListenerState::Failed | ListenerState::Cancelled
        )
    }
}

/// Everything the `/callback` handler needs for one login attempt.
///
/// `result_tx` is the single-slot handoff to the waiting login flow; whoever
/// takes it out of the mutex owns the one terminal transition.
pub struct CallbackAttempt {
    expected_state: String,
    verifier: String,
    config: AuthConfig,
    http: Client,
    result_tx: Mutex<Option<oneshot::Sender<CallbackResult>>>,
    state: Mutex<ListenerState>,
}

impl CallbackAttempt {
    fn new(
        config: AuthConfig,
        pkce: &PkceParams,
        http: Client,
    ) -> (Self, oneshot::Receiver<CallbackResult>) {
        let (tx, rx) = oneshot::channel();
        let attempt = Self {
            expected_state: pkce.state.clone(),
            verifier: pkce.verifier.clone(),
            config,
            http,
            result_tx: Mutex::new(Some(tx)),
            state: Mutex::new(ListenerState::Idle),
        };
        (attempt, rx)
    }

    pub fn expected_state(&self) -> &str {
        &self.expected_state
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Takes the result sender. Only the first caller gets it.
    pub async fn claim(&self) -> Option<oneshot::Sender<CallbackResult>> {
        self.result_tx.lock().await.take()
    }

    /// Moves to `next` unless a terminal state was already reached.
    pub async fn transition(&self, next: ListenerState) {
        let mut state = self.state.lock().await;
        if state.is_terminal() {
            return;
        }
        debug!(from = ?*state, to = ?next, "callback listener transition");
        *state = next;
    }

    pub async fn state(&self) -> ListenerState {
        *self.state.lock().await
    }
}

/// A running callback listener bound to `127.0.0.1`.
pub struct CallbackServer {
    addr: SocketAddr,
    attempt: Arc<CallbackAttempt>,
    result_rx: Option<oneshot::Receiver<CallbackResult>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl CallbackServer {
    /// Binds `config.port` on loopback and starts serving `/callback` on its
    /// own task.
    pub async fn bind(
        config: AuthConfig,
        pkce: &PkceParams,
        http: Client,
    ) -> Result<Self, AuthError> {
        let port = config.port;
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|source| AuthError::Bind { port, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| AuthError::Bind { port, source })?;

        let (attempt, result_rx) = CallbackAttempt::new(config, pkce, http);
        let attempt = Arc::new(attempt);

        let app = Router::new()
            .route("/callback", get(api::callback))
            .with_state(Arc::clone(&attempt));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        attempt.transition(ListenerState::Listening).await;
        debug!(%addr, "callback server listening");

        Ok(Self {
            addr,
            attempt,
            result_rx: Some(result_rx),
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn state(&self) -> ListenerState {
        self.attempt.state().await
    }

    /// Resolves with the outcome of the first meaningful callback request.
    ///
    /// Cancel-safe: dropping the future leaves the result slot intact.
    pub async fn wait(&mut self) -> CallbackResult {
        let Some(rx) = self.result_rx.as_mut() else {
            return Err(AuthError::Cancelled);
        };

        let result = rx.await.unwrap_or(Err(AuthError::Cancelled));
        self.result_rx = None;
        result
    }

    /// Stops the server. Idempotent; waits at most [`SHUTDOWN_GRACE`] for
    /// in-flight requests before aborting the task.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.attempt.transition(ListenerState::Cancelled).await;
        // Closes the handoff unless a request already owns it, so `wait`
        // cannot block on a stopped server.
        drop(self.attempt.claim().await);

        let Some(task) = self.task.take() else {
            return;
        };

        let abort = task.abort_handle();
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(Ok(()))) => debug!(addr = %self.addr, "callback server stopped"),
            Ok(Ok(Err(e))) => warn!("callback server error: {}", e),
            Ok(Err(e)) => warn!("callback server task failed: {}", e),
            Err(_) => {
                warn!("callback server did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// First candidate, in the given order, that can currently be bound on
/// loopback.
///
/// The probe listener is released right away, so the port can still be lost
/// before the real bind; callers treat that as a failed attempt and move on.
pub fn pick_available_port(candidates: &[u16]) -> Result<u16, AuthError> {
    candidates
        .iter()
        .copied()
        .find(|&port| is_port_available(port))
        .ok_or_else(|| AuthError::NoPortAvailable(candidates.to_vec()))
}

pub fn is_port_available(port: u16) -> bool {
    std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

//! Authenticator flows: session checks, refresh and the interactive login
//! driven by a simulated browser.

use std::{
    io,
    net::{Ipv4Addr, TcpListener},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use mockito::{Matcher, Server, ServerGuard};
use moodify::{
    browser::Opener,
    error::AuthError,
    management::TokenStore,
    spotify::auth::Authenticator,
    types::{AuthConfig, TokenRecord},
};
use tempfile::TempDir;
use tokio::time::Instant;

const TOKEN_BODY: &str = r#"{
    "access_token": "fresh-access",
    "token_type": "Bearer",
    "refresh_token": "fresh-refresh",
    "expires_in": 3600,
    "scope": "user-top-read"
}"#;

fn test_config(server: &ServerGuard, port: u16) -> AuthConfig {
    AuthConfig {
        client_id: "client-123".to_string(),
        redirect_uri: format!("http://127.0.0.1:{port}/callback"),
        port,
        scopes: vec!["user-top-read".to_string()],
        auth_url: format!("{}/authorize", server.url()),
        token_url: format!("{}/api/token", server.url()),
        api_url: format!("{}/v1", server.url()),
    }
}

fn token_expiring_in(d: chrono::Duration) -> TokenRecord {
    TokenRecord {
        access_token: "old-access".to_string(),
        refresh_token: "old-refresh".to_string(),
        token_type: "Bearer".to_string(),
        expiry: Utc::now() + d,
    }
}

fn free_port() -> u16 {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// What the simulated provider does with the authorization request.
#[derive(Clone, Copy)]
enum Redirect {
    Grant,
    Deny,
    ForgeState,
    Ignore,
}

/// Stands in for the browser: records every authorization URL and, like the
/// provider would, redirects to the `redirect_uri` it carries.
#[derive(Clone)]
struct SimulatedBrowser {
    script: Arc<Vec<Redirect>>,
    opened: Arc<Mutex<Vec<url::Url>>>,
    calls: Arc<AtomicUsize>,
}

impl SimulatedBrowser {
    fn new(script: Vec<Redirect>) -> Self {
        Self {
            script: Arc::new(script),
            opened: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn opened(&self) -> Vec<url::Url> {
        self.opened.lock().unwrap().clone()
    }
}

impl Opener for SimulatedBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        let url = url::Url::parse(url).map_err(io::Error::other)?;
        self.opened.lock().unwrap().push(url.clone());

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let action = self
            .script
            .get(call)
            .copied()
            .unwrap_or(Redirect::Ignore);

        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default()
        };
        let mut redirect = url::Url::parse(&param("redirect_uri")).map_err(io::Error::other)?;
        let state = param("state");

        match action {
            Redirect::Grant => {
                redirect
                    .query_pairs_mut()
                    .append_pair("code", "auth-code")
                    .append_pair("state", &state);
            }
            Redirect::Deny => {
                redirect
                    .query_pairs_mut()
                    .append_pair("error", "access_denied")
                    .append_pair("state", &state);
            }
            Redirect::ForgeState => {
                redirect
                    .query_pairs_mut()
                    .append_pair("code", "auth-code")
                    .append_pair("state", "forged");
            }
            Redirect::Ignore => return Ok(()),
        }

        tokio::spawn(async move {
            let _ = reqwest::get(redirect).await;
        });
        Ok(())
    }
}

struct FailingBrowser;

impl Opener for FailingBrowser {
    fn open(&self, _url: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no browser"))
    }
}

fn deadline_in(d: Duration) -> Instant {
    Instant::now() + d
}

#[tokio::test]
async fn quick_check_without_token() {
    let dir = TempDir::new().unwrap();
    let auth = Authenticator::new(TokenStore::new(dir.path()), FailingBrowser);

    assert!(!auth.quick_check().await);
}

#[tokio::test]
async fn quick_check_respects_one_minute_margin() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    let auth = Authenticator::new(store.clone(), FailingBrowser);

    store
        .save(&token_expiring_in(chrono::Duration::minutes(10)))
        .await
        .unwrap();
    assert!(auth.quick_check().await);

    store
        .save(&token_expiring_in(chrono::Duration::seconds(30)))
        .await
        .unwrap();
    assert!(!auth.quick_check().await);
}

#[tokio::test]
async fn quick_check_with_expired_token() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    store
        .save(&token_expiring_in(chrono::Duration::minutes(-10)))
        .await
        .unwrap();

    let auth = Authenticator::new(store, FailingBrowser);
    assert!(!auth.quick_check().await);
}

#[tokio::test]
async fn quick_check_with_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    std::fs::write(store.path(), "garbage").unwrap();

    let auth = Authenticator::new(store, FailingBrowser);
    assert!(!auth.quick_check().await);
}

#[tokio::test]
async fn valid_token_is_used_without_refresh() {
    //* Given
    let mut server = Server::new_async().await;
    let refresh_mock = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    store
        .save(&token_expiring_in(chrono::Duration::minutes(10)))
        .await
        .unwrap();

    //* When
    let auth = Authenticator::new(store, FailingBrowser);
    let client = auth
        .ensure_authenticated_client(&test_config(&server, 0))
        .await
        .unwrap();

    //* Then
    refresh_mock.assert_async().await;
    assert_eq!(client.access_token(), "old-access");
    assert_eq!(client.api_url(), format!("{}/v1", server.url()));
}

#[tokio::test]
async fn expiring_token_is_refreshed_and_persisted() {
    //* Given
    let mut server = Server::new_async().await;
    let refresh_mock = server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "old-refresh".into()),
            Matcher::UrlEncoded("client_id".into(), "client-123".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .expect(1)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    store
        .save(&token_expiring_in(chrono::Duration::minutes(4)))
        .await
        .unwrap();

    //* When
    let auth = Authenticator::new(store.clone(), FailingBrowser);
    let client = auth
        .ensure_authenticated_client(&test_config(&server, 0))
        .await
        .unwrap();

    //* Then
    refresh_mock.assert_async().await;
    assert_eq!(client.access_token(), "fresh-access");
    let saved = store.load().await.unwrap();
    assert_eq!(saved.access_token, "fresh-access");
    assert_eq!(saved.refresh_token, "fresh-refresh");
    assert!(saved.expiry > Utc::now() + chrono::Duration::minutes(59));
}

#[tokio::test]
async fn token_two_minutes_from_expiry_is_refreshed_once() {
    //* Given
    let mut server = Server::new_async().await;
    let refresh_mock = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .expect(1)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    store
        .save(&token_expiring_in(chrono::Duration::minutes(2)))
        .await
        .unwrap();
    let auth = Authenticator::new(store.clone(), FailingBrowser);
    let config = test_config(&server, 0);

    //* When
    let before = Utc::now();
    auth.ensure_authenticated_client(&config).await.unwrap();
    let after = Utc::now();
    // Fresh token needs no further refresh
    auth.ensure_authenticated_client(&config).await.unwrap();

    //* Then
    refresh_mock.assert_async().await;
    let saved = store.load().await.unwrap();
    assert!(saved.expiry >= before + chrono::Duration::seconds(3600));
    assert!(saved.expiry <= after + chrono::Duration::seconds(3600));
}

#[tokio::test]
async fn refresh_with_out_of_range_lifetime_is_rejected() {
    let mut server = Server::new_async().await;
    let _refresh_mock = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "a", "token_type": "Bearer", "expires_in": 9223372036854775807}"#)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    store
        .save(&token_expiring_in(chrono::Duration::minutes(-1)))
        .await
        .unwrap();
    let before = std::fs::read_to_string(store.path()).unwrap();

    let auth = Authenticator::new(store.clone(), FailingBrowser);
    let result = auth
        .ensure_authenticated_client(&test_config(&server, 0))
        .await;

    match result {
        Err(AuthError::TokenExchange(message)) => assert!(message.contains("expires_in")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
}

#[tokio::test]
async fn refresh_without_new_refresh_token_keeps_old_one() {
    let mut server = Server::new_async().await;
    let _refresh_mock = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "fresh-access", "token_type": "Bearer", "expires_in": 3600}"#)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    store
        .save(&token_expiring_in(chrono::Duration::minutes(-5)))
        .await
        .unwrap();

    let auth = Authenticator::new(store.clone(), FailingBrowser);
    auth.ensure_authenticated_client(&test_config(&server, 0))
        .await
        .unwrap();

    let saved = store.load().await.unwrap();
    assert_eq!(saved.access_token, "fresh-access");
    assert_eq!(saved.refresh_token, "old-refresh");
}

#[tokio::test]
async fn failed_refresh_leaves_token_untouched() {
    let mut server = Server::new_async().await;
    let _refresh_mock = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error": "invalid_grant"}"#)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    let original = token_expiring_in(chrono::Duration::minutes(2));
    store.save(&original).await.unwrap();
    let before = std::fs::read_to_string(store.path()).unwrap();

    let auth = Authenticator::new(store.clone(), FailingBrowser);
    let result = auth
        .ensure_authenticated_client(&test_config(&server, 0))
        .await;

    assert!(matches!(result, Err(AuthError::TokenExchange(_))));
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
}

#[tokio::test]
async fn ensure_client_without_token() {
    let server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let auth = Authenticator::new(TokenStore::new(dir.path()), FailingBrowser);

    let result = auth
        .ensure_authenticated_client(&test_config(&server, 0))
        .await;

    assert!(matches!(result, Err(AuthError::NotAuthenticated)));
}

#[tokio::test]
async fn login_end_to_end() {
    //* Given
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "auth-code".into()),
            Matcher::Regex("code_verifier=[A-Za-z0-9_-]{43}".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .expect(1)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    let browser = SimulatedBrowser::new(vec![Redirect::Grant]);
    let port = free_port();

    let auth = Authenticator::new(store.clone(), browser.clone());
    assert!(!auth.quick_check().await);

    //* When
    let token = auth
        .login(&test_config(&server, port), deadline_in(Duration::from_secs(10)))
        .await
        .unwrap();

    //* Then
    token_mock.assert_async().await;
    assert_eq!(token.access_token, "fresh-access");
    assert_eq!(store.load().await.unwrap(), token);
    assert!(auth.quick_check().await);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let opened = browser.opened();
    assert_eq!(opened.len(), 1);
    let params: std::collections::HashMap<String, String> =
        opened[0].query_pairs().into_owned().collect();
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["response_type"], "code");
    assert_eq!(
        params["redirect_uri"],
        format!("http://127.0.0.1:{port}/callback")
    );

    // The listener is gone once login returns
    assert!(
        reqwest::get(format!("http://127.0.0.1:{port}/callback"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn login_with_forged_state_stores_nothing() {
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    let browser = SimulatedBrowser::new(vec![Redirect::ForgeState]);

    let auth = Authenticator::new(store.clone(), browser);
    let result = auth
        .login(
            &test_config(&server, free_port()),
            deadline_in(Duration::from_secs(10)),
        )
        .await;

    assert!(matches!(result, Err(AuthError::CsrfMismatch)));
    assert!(!store.exists().await);
    token_mock.assert_async().await;
}

#[tokio::test]
async fn login_times_out_when_browser_fails() {
    let server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    let port = free_port();

    let auth = Authenticator::new(store.clone(), FailingBrowser);
    let result = auth
        .login(
            &test_config(&server, port),
            deadline_in(Duration::from_millis(300)),
        )
        .await;

    assert!(matches!(result, Err(AuthError::DeadlineExceeded)));
    assert!(!store.exists().await);
}

#[tokio::test]
async fn smart_login_skips_busy_port() {
    //* Given
    let mut server = Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .create_async()
        .await;
    let busy = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let busy_port = busy.local_addr().unwrap().port();
    let free = free_port();
    let dir = TempDir::new().unwrap();
    let browser = SimulatedBrowser::new(vec![Redirect::Grant]);

    //* When
    let auth = Authenticator::new(TokenStore::new(dir.path()), browser.clone());
    let result = auth
        .smart_login(
            &test_config(&server, busy_port),
            &[busy_port, free],
            deadline_in(Duration::from_secs(10)),
        )
        .await;

    //* Then
    assert!(result.is_ok());
    let opened = browser.opened();
    assert_eq!(opened.len(), 1);
    let redirect_uri = opened[0]
        .query_pairs()
        .find(|(k, _)| k == "redirect_uri")
        .map(|(_, v)| v.into_owned());
    assert_eq!(
        redirect_uri,
        Some(format!("http://127.0.0.1:{free}/callback"))
    );
}

#[tokio::test]
async fn smart_login_moves_on_after_failure() {
    let mut server = Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    let browser = SimulatedBrowser::new(vec![Redirect::Deny, Redirect::Grant]);
    let ports = [free_port(), free_port()];

    let auth = Authenticator::new(store.clone(), browser.clone());
    let token = auth
        .smart_login(
            &test_config(&server, ports[0]),
            &ports,
            deadline_in(Duration::from_secs(10)),
        )
        .await
        .unwrap();

    assert_eq!(token.access_token, "fresh-access");
    assert_eq!(browser.opened().len(), 2);
    assert!(store.exists().await);
}

#[tokio::test]
async fn smart_login_reports_last_error_when_all_fail() {
    let server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let browser = SimulatedBrowser::new(vec![Redirect::Deny, Redirect::Deny]);
    let ports = [free_port(), free_port()];

    let auth = Authenticator::new(TokenStore::new(dir.path()), browser.clone());
    let result = auth
        .smart_login(
            &test_config(&server, ports[0]),
            &ports,
            deadline_in(Duration::from_secs(10)),
        )
        .await;

    match result {
        Err(AuthError::AllPortsFailed(last)) => {
            assert!(matches!(*last, AuthError::AuthorizationDenied { .. }))
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(browser.opened().len(), 2);
}

#[tokio::test]
async fn smart_login_deadline_ends_the_flow() {
    let server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let browser = SimulatedBrowser::new(vec![Redirect::Ignore, Redirect::Grant]);
    let ports = [free_port(), free_port()];

    let auth = Authenticator::new(TokenStore::new(dir.path()), browser.clone());
    let result = auth
        .smart_login(
            &test_config(&server, ports[0]),
            &ports,
            deadline_in(Duration::from_millis(300)),
        )
        .await;

    assert!(matches!(result, Err(AuthError::DeadlineExceeded)));
    // No second port is tried after the deadline
    assert_eq!(browser.opened().len(), 1);
}

#[tokio::test]
async fn smart_login_without_free_port() {
    let server = Server::new_async().await;
    let busy = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let busy_port = busy.local_addr().unwrap().port();
    let dir = TempDir::new().unwrap();
    let browser = SimulatedBrowser::new(vec![]);

    let auth = Authenticator::new(TokenStore::new(dir.path()), browser.clone());
    let result = auth
        .smart_login(
            &test_config(&server, busy_port),
            &[busy_port],
            deadline_in(Duration::from_secs(1)),
        )
        .await;

    assert!(matches!(result, Err(AuthError::NoPortAvailable(_))));
    assert!(browser.opened().is_empty());
}

#[tokio::test]
async fn logout_removes_token() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path());
    store
        .save(&token_expiring_in(chrono::Duration::hours(1)))
        .await
        .unwrap();
    let auth = Authenticator::new(store.clone(), FailingBrowser);

    auth.logout().await.unwrap();
    assert!(!store.exists().await);
    assert!(!auth.quick_check().await);

    // Logging out twice is fine
    auth.logout().await.unwrap();
}

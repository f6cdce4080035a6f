use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::{
    error::AuthError,
    types::{AuthConfig, TokenRecord, TokenResponse},
};

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Exchanges an authorization code plus the PKCE verifier for a token.
///
/// The verifier proves that the client completing the flow is the one that
/// started it. Any non-200 answer is a hard failure.
pub async fn exchange_code_pkce(
    http: &Client,
    config: &AuthConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenRecord, AuthError> {
    let response = request_token(
        http,
        &config.token_url,
        &[
            ("grant_type", "authorization_code"),
            ("client_id", &config.client_id),
            ("code", code),
            ("redirect_uri", &config.redirect_uri),
            ("code_verifier", verifier),
        ],
    )
    .await?;

    into_record(response, None)
}

/// Trades a refresh token for a new access token.
///
/// Spotify may or may not rotate the refresh token; when the response has
/// none the one we sent stays valid and is kept.
pub async fn refresh_token(
    http: &Client,
    config: &AuthConfig,
    refresh_token: &str,
) -> Result<TokenRecord, AuthError> {
    let response = request_token(
        http,
        &config.token_url,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &config.client_id),
        ],
    )
    .await?;

    into_record(response, Some(refresh_token))
}

async fn request_token(
    http: &Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, AuthError> {
    let res = http
        .post(token_url)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::TokenExchange(format!("token request failed: {e}")))?;

    let status = res.status();
    if status != StatusCode::OK {
        let body = res.text().await.unwrap_or_default();
        return Err(AuthError::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token = res
        .json::<TokenResponse>()
        .await
        .map_err(|e| AuthError::TokenExchange(format!("failed to decode token response: {e}")))?;

    debug!(
        expires_in = token.expires_in,
        scope = token.scope.as_deref().unwrap_or_default(),
        "token endpoint answered"
    );
    Ok(token)
}

fn into_record(
    response: TokenResponse,
    previous_refresh: Option<&str>,
) -> Result<TokenRecord, AuthError> {
    let expiry = Duration::try_seconds(response.expires_in)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            AuthError::TokenExchange(format!("invalid expires_in: {}", response.expires_in))
        })?;

    let refresh_token = response
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| previous_refresh.map(str::to_string))
        .unwrap_or_default();

    Ok(TokenRecord {
        access_token: response.access_token,
        refresh_token,
        token_type: response
            .token_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
        expiry,
    })
}

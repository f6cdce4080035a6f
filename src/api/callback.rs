use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
};
use tracing::{debug, warn};

use crate::{
    error::AuthError,
    server::{CallbackAttempt, ListenerState},
    spotify::token::exchange_code_pkce,
    types::TokenRecord,
};

type Evaluation = (StatusCode, String, Result<TokenRecord, AuthError>);

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Authentication Successful</title>
    <style>
        body { font-family: Arial, sans-serif; text-align: center; margin-top: 50px; }
        .success { color: #4CAF50; font-size: 24px; }
        .message { margin-top: 20px; color: #666; }
    </style>
</head>
<body>
    <div class="success">&#10003; Authentication Successful!</div>
    <div class="message">You can now close this tab and return to your terminal.</div>
</body>
</html>"#;

const ALREADY_COMPLETED_PAGE: &str =
    "<h4>This login attempt has already completed.</h4><p>Return to your terminal.</p>";

/// `GET /callback`: the redirect target of the authorization endpoint.
///
/// The first request claims the attempt's result slot and decides the
/// outcome; later requests only get a generic page and never reach the
/// token endpoint.
pub async fn callback(
    State(attempt): State<Arc<CallbackAttempt>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    let Some(result_tx) = attempt.claim().await else {
        debug!("callback hit after the attempt completed");
        return (StatusCode::OK, Html(ALREADY_COMPLETED_PAGE.to_string()));
    };

    let (status, page, outcome) = evaluate(&attempt, &params).await;

    let next = if outcome.is_ok() {
        ListenerState::Completed
    } else {
        ListenerState::Failed
    };
    attempt.transition(next).await;

    if let Err(e) = &outcome {
        warn!("callback failed: {}", e);
    }

    // The receiver is gone only if the login flow already gave up.
    let _ = result_tx.send(outcome);
    (status, Html(page))
}

async fn evaluate(
    attempt: &CallbackAttempt,
    params: &HashMap<String, String>,
) -> Evaluation {
    if params.get("state").map(String::as_str) != Some(attempt.expected_state()) {
        return failure(StatusCode::BAD_REQUEST, AuthError::CsrfMismatch);
    }

    if let Some(error) = params.get("error").filter(|e| !e.is_empty()) {
        let description = params.get("error_description").cloned().unwrap_or_default();
        return failure(
            StatusCode::BAD_REQUEST,
            AuthError::AuthorizationDenied {
                error: error.clone(),
                description,
            },
        );
    }

    let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, AuthError::MissingCode);
    };

    match exchange_code_pkce(attempt.http(), attempt.config(), code, attempt.verifier()).await {
        Ok(token) => (StatusCode::OK, SUCCESS_PAGE.to_string(), Ok(token)),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

fn failure(status: StatusCode, error: AuthError) -> Evaluation {
    let page = format!("<h4>Login failed.</h4><p>{}</p>", escape(&error.to_string()));
    (status, page, Err(error))
}

/// Provider-supplied text ends up in the page, so it is escaped.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

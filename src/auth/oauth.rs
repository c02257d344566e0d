//! Google OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with Google.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::middleware::SESSION_COOKIE;
use super::session::{Session, create_session_token};
use crate::AppState;
use crate::data::NewUser;
use crate::error::AppError;
use crate::metrics::LOGINS_TOTAL;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const GOOGLE_SCOPES: &str = "https://www.googleapis.com/auth/userinfo.email \
                             https://www.googleapis.com/auth/userinfo.profile";

/// Name of the short-lived CSRF state cookie
const STATE_COOKIE: &str = "oauth_state";

/// Create authentication router
///
/// Routes:
/// - GET /login - Redirect to Google
/// - GET /callback - OAuth callback
/// - GET /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
}

// =============================================================================
// Login
// =============================================================================

/// GET /login
///
/// Redirects the browser to Google's authorization page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect to Google with client_id, redirect_uri, scope, state
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = generate_csrf_state();

    let mut authorize_url =
        url::Url::parse(GOOGLE_AUTH_URL).map_err(|e| AppError::Internal(e.into()))?;
    authorize_url
        .query_pairs_mut()
        .append_pair("client_id", &state.config.auth.google.client_id)
        .append_pair("redirect_uri", &state.config.server.callback_url())
        .append_pair("response_type", "code")
        .append_pair("scope", GOOGLE_SCOPES)
        .append_pair("state", &csrf_state);

    let state_cookie = Cookie::build((STATE_COOKIE, csrf_state))
        .path("/")
        .http_only(true)
        .secure(state.config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(10))
        .build();

    Ok((
        jar.add(state_cookie),
        Redirect::temporary(authorize_url.as_str()),
    ))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from the Google callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    /// Authorization code
    code: String,
    /// CSRF state token
    state: String,
}

/// Google token response
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

/// Google user info
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

/// GET /callback
///
/// Handles the OAuth callback from Google.
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for access token
/// 3. Fetch user info from Google
/// 4. Upsert the user row
/// 5. Create session and set cookie
/// 6. Redirect to home
async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let result = complete_login(&state, &query, jar).await;
    let status = if result.is_ok() { "success" } else { "failure" };
    LOGINS_TOTAL.with_label_values(&[status]).inc();
    result
}

async fn complete_login(
    state: &AppState,
    query: &CallbackQuery,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    verify_csrf_state(&query.state, &jar)?;

    let token = exchange_code(state, &query.code).await?;
    let userinfo = fetch_userinfo(state, &token.access_token).await?;

    let user = state
        .db
        .upsert_user(&NewUser {
            email: userinfo.email,
            name: userinfo.name,
            picture: userinfo.picture,
        })
        .await?;

    let now = Utc::now();
    let session = Session {
        email: user.email.clone(),
        name: user.name.clone(),
        picture: user.picture.clone(),
        created_at: now,
        expires_at: now + Duration::seconds(state.config.auth.session_max_age),
    };
    let session_token = create_session_token(&session, &state.config.auth.session_secret)?;

    let session_cookie = Cookie::build((SESSION_COOKIE, session_token))
        .path("/")
        .http_only(true)
        .secure(state.config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(state.config.auth.session_max_age))
        .build();

    tracing::info!(email = %user.email, "User signed in");

    let jar = jar.remove(removal_cookie(STATE_COOKIE)).add(session_cookie);
    Ok((jar, Redirect::to("/")))
}

/// Exchange the authorization code for an access token
async fn exchange_code(state: &AppState, code: &str) -> Result<GoogleTokenResponse, AppError> {
    let redirect_uri = state.config.server.callback_url();
    let params = [
        ("client_id", state.config.auth.google.client_id.as_str()),
        (
            "client_secret",
            state.config.auth.google.client_secret.as_str(),
        ),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri.as_str()),
    ];

    let response = state
        .http_client
        .post(GOOGLE_TOKEN_URL)
        .form(&params)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AppError::OAuth(format!(
            "token endpoint returned {}",
            response.status()
        )));
    }

    Ok(response.json::<GoogleTokenResponse>().await?)
}

/// Fetch the signed-in user's identity
async fn fetch_userinfo(state: &AppState, access_token: &str) -> Result<GoogleUserInfo, AppError> {
    let response = state
        .http_client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(access_token)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AppError::OAuth(format!(
            "userinfo endpoint returned {}",
            response.status()
        )));
    }

    Ok(response.json::<GoogleUserInfo>().await?)
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Clears session and state cookies and redirects to login.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .remove(removal_cookie(SESSION_COOKIE))
        .remove(removal_cookie(STATE_COOKIE));

    (jar, Redirect::to("/login"))
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    use base64::{Engine as _, engine::general_purpose};
    use rand::Rng;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(state_param: &str, jar: &CookieJar) -> Result<(), AppError> {
    let cookie_state = jar
        .get(STATE_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .ok_or(AppError::Unauthorized)?;

    if cookie_state != state_param {
        return Err(AppError::Unauthorized);
    }

    Ok(())
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

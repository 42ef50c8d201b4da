//! Session tokens, CSRF tokens and the authenticated-user extractor.
//!
//! A session is a signed JWT stored in the `token` cookie. The claims carry a
//! random CSRF token which state-changing forms must echo back.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    models::User,
    SharedState,
};

/// Cookie holding the session JWT.
pub const SESSION_COOKIE: &str = "token";

/// How long a session stays valid.
pub const SESSION_TTL_DAYS: i64 = 30;

/// Claims embedded in a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID.
    pub sub: Uuid,
    /// CSRF token bound to this session.
    pub csrf: String,
    pub iat: i64,
    pub exp: i64,
}

/// Generate a URL-safe random token.
pub fn random_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Sign a new session token for a user.
pub fn generate_token(user_id: Uuid, secret: &str) -> Result<String> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user_id,
        csrf: random_token(),
        iat: now.timestamp(),
        exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp(),
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Verify a session token's signature and expiry.
pub fn validate_token(token: &str, secret: &str) -> Result<SessionClaims> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

/// Build the session cookie.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Build a removal cookie matching [`session_cookie`].
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Constant-time comparison of a submitted CSRF token with the session's.
pub fn validate_csrf(session: &AuthenticatedUser, token: &str) -> bool {
    let expected = session.csrf_token.as_bytes();
    let given = token.as_bytes();
    expected.len() == given.len() && bool::from(expected.ct_eq(given))
}

/// A request made with a valid session for an existing user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub csrf_token: String,
}

/// Resolve the session carried by a cookie jar, if any.
pub async fn session_user(jar: &CookieJar, state: &SharedState) -> Result<AuthenticatedUser> {
    let token = jar
        .get(SESSION_COOKIE)
        .ok_or_else(|| Error::AuthFailed("missing session cookie".to_string()))?;

    let claims = validate_token(token.value(), &state.config.security.jwt_secret)?;
    let user = state
        .storage
        .get_user(claims.sub)
        .await?
        .ok_or(Error::UserNotFound(claims.sub))?;

    Ok(AuthenticatedUser {
        user,
        csrf_token: claims.csrf,
    })
}

impl FromRequestParts<SharedState> for AuthenticatedUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        session_user(&jar, state).await.inspect_err(|e| {
            tracing::debug!("Rejected unauthenticated request: {}", e);
        })
    }
}

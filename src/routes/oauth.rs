//! `OAuth2` account linking routes.
//!
//! This module provides HTTP handlers for:
//! - Starting the authorization flow (redirect to the platform)
//! - The platform callback (code exchange, self lookup, login/register/link)

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use uuid::Uuid;

use super::method_not_allowed;
use crate::{
    auth,
    error::{Error, Result, StorageError},
    flash::{set_flash, Flash},
    models::ExternalAccount,
    oauth::{self, Intent, PendingAuthorization},
    AppState, SharedState,
};

/// Cookie remembering the pending authorization between redirect and callback.
pub const STATE_COOKIE: &str = "oauth_state";

/// Routes:
/// - `GET /{platform}/authorize?intent=login|register|link`
/// - `GET /{platform}/callback?code=..&state=..`
pub fn oauth_router() -> Router<SharedState> {
    Router::new()
        .route(
            "/{platform}/authorize",
            get(authorize).fallback(method_not_allowed),
        )
        .route(
            "/{platform}/callback",
            get(callback).fallback(method_not_allowed),
        )
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    #[serde(default)]
    pub intent: Intent,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Result of finishing a flow for a resolved platform account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Start a session for this user.
    SignedIn(Uuid),
    /// The account was added to the current user.
    Linked,
    /// Abort with a flash message.
    Rejected(Flash),
}

fn failure_target(intent: Intent, flash: Flash) -> &'static str {
    match (intent, flash) {
        (_, Flash::LoginRequired) => "/login",
        (Intent::Link, _) => "/me",
        (Intent::Login | Intent::Register, _) => "/login",
    }
}

fn redirect_with_flash(jar: CookieJar, flash: Flash, to: &str) -> Response {
    (set_flash(jar, flash), Redirect::to(to)).into_response()
}

/// Redirect to the platform's authorization page.
pub async fn authorize(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Query(params): Query<AuthorizeParams>,
    jar: CookieJar,
) -> Result<Response> {
    let provider = state
        .providers
        .get(&platform)
        .ok_or_else(|| Error::NotFound(format!("oauth platform {platform}")))?;

    let redirect_uri = state.config.server.redirect_uri(&platform);
    let (url, csrf_state) =
        oauth::authorization_url(provider.client(), &redirect_uri).map_err(|e| {
            tracing::error!("Failed to build {} authorization URL: {}", platform, e);
            Error::Upstream(e.to_string())
        })?;

    let pending = PendingAuthorization {
        platform: platform.clone(),
        intent: params.intent,
        state: csrf_state,
    };
    let cookie = Cookie::build((STATE_COOKIE, pending.encode()))
        .path("/oauth")
        .http_only(true)
        .secure(state.config.security.secure_cookies)
        .same_site(SameSite::Lax)
        .build();

    tracing::info!(
        "Starting {} authorization ({})",
        platform,
        params.intent.as_str()
    );
    Ok((jar.add(cookie), Redirect::to(&url)).into_response())
}

/// Handle the platform redirect back to us.
pub async fn callback(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<Response> {
    let provider = state
        .providers
        .get(&platform)
        .ok_or_else(|| Error::NotFound(format!("oauth platform {platform}")))?;

    let pending = jar
        .get(STATE_COOKIE)
        .and_then(|c| PendingAuthorization::decode(c.value()));
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path("/oauth"));

    let Some(pending) = pending.filter(|p| {
        params
            .state
            .as_deref()
            .is_some_and(|state| p.matches(&platform, state))
    }) else {
        tracing::warn!("Rejected {} callback with a mismatched state", platform);
        return Ok(redirect_with_flash(jar, Flash::OAuthState, "/login"));
    };
    let intent = pending.intent;
    let fail = |jar: CookieJar, flash: Flash| -> Result<Response> {
        Ok(redirect_with_flash(jar, flash, failure_target(intent, flash)))
    };

    let Some(code) = params.code else {
        tracing::info!(
            "{} authorization was not granted: {}",
            platform,
            params.error.as_deref().unwrap_or("no code")
        );
        return fail(jar, Flash::OAuthFetch);
    };

    let session = auth::session_user(&jar, &state).await.ok().map(|s| s.user.id);
    if intent == Intent::Link && session.is_none() {
        tracing::warn!("Rejected {} link callback without a session", platform);
        return fail(jar, Flash::LoginRequired);
    }

    let redirect_uri = state.config.server.redirect_uri(&platform);
    let exchanged =
        oauth::exchange_code(&state.http_client, provider.client(), &code, &redirect_uri).await;
    let token = match exchanged {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to exchange {} code: {}", platform, e);
            return fail(jar, Flash::OAuthFetch);
        }
    };

    let Some(account) = provider.get_self(&state.http_client, &token).await else {
        return fail(jar, Flash::OAuthFetch);
    };

    match complete_authorization(&state, intent, &account, session).await? {
        FlowOutcome::SignedIn(user_id) => {
            let token = auth::generate_token(user_id, &state.config.security.jwt_secret)?;
            tracing::info!(
                "Signed in user {} with {} account {}",
                user_id,
                account.platform,
                account.id
            );
            let jar = jar.add(auth::session_cookie(
                token,
                state.config.security.secure_cookies,
            ));
            Ok((jar, Redirect::to("/me")).into_response())
        }
        FlowOutcome::Linked => Ok(redirect_with_flash(jar, Flash::AccountLinked, "/me")),
        FlowOutcome::Rejected(flash) => fail(jar, flash),
    }
}

/// Apply the flow's intent for a resolved platform account.
///
/// `session` is the currently signed-in user. [`Intent::Link`] without one is
/// rejected with [`Flash::LoginRequired`].
pub async fn complete_authorization(
    state: &AppState,
    intent: Intent,
    account: &ExternalAccount,
    session: Option<Uuid>,
) -> Result<FlowOutcome> {
    match intent {
        Intent::Login => {
            let Some(user) = state
                .storage
                .find_user_by_account(&account.platform, &account.id)
                .await?
            else {
                return Ok(FlowOutcome::Rejected(Flash::AccountNotFound));
            };
            // Keep the stored handle in sync with the platform.
            state.storage.link_account(user.id, account).await?;
            Ok(FlowOutcome::SignedIn(user.id))
        }
        Intent::Register => match state.storage.create_user(account).await {
            Ok(user) => {
                tracing::info!("Registered user {}", user.id);
                Ok(FlowOutcome::SignedIn(user.id))
            }
            Err(Error::Storage(StorageError::AccountTaken { .. })) => {
                Ok(FlowOutcome::Rejected(Flash::AccountTaken))
            }
            Err(e) => Err(e),
        },
        Intent::Link => {
            let Some(user_id) = session else {
                return Ok(FlowOutcome::Rejected(Flash::LoginRequired));
            };
            match state.storage.link_account(user_id, account).await {
                Ok(()) => Ok(FlowOutcome::Linked),
                Err(Error::Storage(StorageError::AccountTaken { .. })) => {
                    Ok(FlowOutcome::Rejected(Flash::AccountTaken))
                }
                Err(e) => Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{
        config::{ClientCredentials, OAuthConfig},
        decorations::DecorationCollection,
        oauth::{DiscordProvider, ProviderRegistry},
        routes::{
            app,
            test_support::{session_for, set_cookies, test_state},
        },
        storage::{MemoryStorage, UserStorage},
    };

    fn discord(id: &str) -> ExternalAccount {
        ExternalAccount::new("discord", id, "cyn")
    }

    fn state_with_discord() -> SharedState {
        let mut state = test_state(MemoryStorage::new(), DecorationCollection::default());
        let registry = ProviderRegistry::from_config(&OAuthConfig {
            discord: Some(ClientCredentials {
                client_id: "1234".to_string(),
                client_secret: "secret".to_string(),
            }),
            github: None,
        });
        std::sync::Arc::get_mut(&mut state).unwrap().providers = registry;
        state
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let state = state_with_discord();

        let registered = complete_authorization(&state, Intent::Register, &discord("1"), None)
            .await
            .unwrap();
        let FlowOutcome::SignedIn(user_id) = registered else {
            panic!("unexpected outcome: {registered:?}");
        };

        let login = complete_authorization(&state, Intent::Login, &discord("1"), None)
            .await
            .unwrap();
        assert_eq!(login, FlowOutcome::SignedIn(user_id));
    }

    #[tokio::test]
    async fn test_login_unknown_account() {
        let state = state_with_discord();
        let outcome = complete_authorization(&state, Intent::Login, &discord("1"), None)
            .await
            .unwrap();
        assert_eq!(outcome, FlowOutcome::Rejected(Flash::AccountNotFound));
    }

    #[tokio::test]
    async fn test_register_taken_account() {
        let state = state_with_discord();
        state.storage.create_user(&discord("1")).await.unwrap();

        let outcome = complete_authorization(&state, Intent::Register, &discord("1"), None)
            .await
            .unwrap();
        assert_eq!(outcome, FlowOutcome::Rejected(Flash::AccountTaken));
    }

    #[tokio::test]
    async fn test_link_requires_session_and_free_account() {
        let state = state_with_discord();
        let owner = state.storage.create_user(&discord("1")).await.unwrap();
        let other = state.storage.create_user(&discord("2")).await.unwrap();
        let github = ExternalAccount::new("github", "9", "octocat");

        let outcome = complete_authorization(&state, Intent::Link, &github, None)
            .await
            .unwrap();
        assert_eq!(outcome, FlowOutcome::Rejected(Flash::LoginRequired));

        let outcome = complete_authorization(&state, Intent::Link, &github, Some(owner.id))
            .await
            .unwrap();
        assert_eq!(outcome, FlowOutcome::Linked);

        let outcome = complete_authorization(&state, Intent::Link, &github, Some(other.id))
            .await
            .unwrap();
        assert_eq!(outcome, FlowOutcome::Rejected(Flash::AccountTaken));
    }

    #[tokio::test]
    async fn test_authorize_redirects_and_sets_state() {
        let router = app(state_with_discord());
        let response = router
            .oneshot(
                Request::get("/oauth/discord/authorize?intent=link")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://discord.com/oauth2/authorize?"));
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("oauth_state=discord:link:")));
    }

    #[tokio::test]
    async fn test_unknown_platform_is_not_found() {
        let router = app(state_with_discord());
        let response = router
            .oneshot(
                Request::get("/oauth/myspace/authorize")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_callback_with_mismatched_state() {
        let router = app(state_with_discord());
        let response = router
            .oneshot(
                Request::get("/oauth/discord/callback?code=abc&state=forged")
                    .header(header::COOKIE, "oauth_state=discord:login:expected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("flash=E_OAUTH_STATE")));
        assert!(!cookies.iter().any(|c| c.starts_with("token=")));
    }

    #[tokio::test]
    async fn test_callback_denied_by_user() {
        let router = app(state_with_discord());
        let response = router
            .oneshot(
                Request::get("/oauth/discord/callback?error=access_denied&state=expected")
                    .header(header::COOKIE, "oauth_state=discord:link:expected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/me");
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("flash=E_OAUTH_FETCH")));
    }

    /// State whose Discord provider talks to `server`.
    fn state_with_mock_discord(server: &MockServer) -> SharedState {
        let mut state = test_state(MemoryStorage::new(), DecorationCollection::default());
        let mut registry = ProviderRegistry::default();
        registry.register(
            DiscordProvider::new(ClientCredentials {
                client_id: "1234".to_string(),
                client_secret: "secret".to_string(),
            })
            .with_endpoints(
                format!("{}/oauth2/token", server.uri()),
                format!("{}/users/@me", server.uri()),
            ),
        );
        std::sync::Arc::get_mut(&mut state).unwrap().providers = registry;
        state
    }

    async fn mock_token(server: &MockServer, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access_token": "tok" })),
            )
            .expect(calls)
            .mount(server)
            .await;
    }

    async fn mock_self(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn discord_user() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "42",
            "username": "cynthia",
            "discriminator": "0"
        }))
    }

    fn callback_request(cookie: &str) -> Request<Body> {
        Request::get("/oauth/discord/callback?code=abc&state=s")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_callback_signs_in() {
        let server = MockServer::start().await;
        mock_token(&server, 1).await;
        mock_self(&server, discord_user()).await;
        let state = state_with_mock_discord(&server);

        let response = app(state.clone())
            .oneshot(callback_request("oauth_state=discord:register:s"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/me");
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("token=")));
        assert!(cookies.iter().any(|c| c.starts_with("oauth_state=;")));

        let user = state
            .storage
            .find_user_by_account("discord", "42")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.accounts[0].name, "cynthia");
    }

    #[tokio::test]
    async fn test_link_callback_without_session_skips_exchange() {
        let server = MockServer::start().await;
        mock_token(&server, 0).await;
        let state = state_with_mock_discord(&server);

        let response = app(state)
            .oneshot(callback_request("oauth_state=discord:link:s"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("flash=E_LOGIN_REQUIRED")));
        assert!(cookies.iter().any(|c| c.starts_with("oauth_state=;")));
        assert!(!cookies.iter().any(|c| c.starts_with("token=")));
    }

    #[tokio::test]
    async fn test_link_callback_with_session() {
        let server = MockServer::start().await;
        mock_token(&server, 1).await;
        mock_self(&server, discord_user()).await;
        let state = state_with_mock_discord(&server);
        let owner = state
            .storage
            .create_user(&ExternalAccount::new("github", "9", "octocat"))
            .await
            .unwrap();
        let (session, _) = session_for(owner.id);

        let response = app(state.clone())
            .oneshot(callback_request(&format!(
                "{session}; oauth_state=discord:link:s"
            )))
            .await
            .unwrap();

        assert_eq!(response.headers()[header::LOCATION], "/me");
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("flash=S_ACCOUNT_LINKED")));
        let user = state.storage.get_user(owner.id).await.unwrap().unwrap();
        assert_eq!(user.accounts.len(), 2);
    }

    #[tokio::test]
    async fn test_callback_self_lookup_failure() {
        for status in [401, 500] {
            let server = MockServer::start().await;
            mock_token(&server, 1).await;
            mock_self(&server, ResponseTemplate::new(status)).await;
            let state = state_with_mock_discord(&server);

            let response = app(state.clone())
                .oneshot(callback_request("oauth_state=discord:register:s"))
                .await
                .unwrap();

            assert_eq!(response.headers()[header::LOCATION], "/login");
        assert!(set_cookies(&response)
                .iter()
                .any(|c| c.starts_with("flash=E_OAUTH_FETCH")));
            assert!(state
                .storage
                .find_user_by_account("discord", "42")
                .await
                .unwrap()
                .is_none());
        }
    }
}

//! Account page routes.
//!
//! Form handlers follow the same steps: authenticate, parse the form, check
//! the CSRF token, validate, then redirect back to `/me` with a flash message.

use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, State},
    http::{header, HeaderMap, Request},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use uuid::Uuid;

use super::method_not_allowed;
use crate::{
    auth::{self, AuthenticatedUser},
    error::{Error, Result},
    flash::{set_flash, take_flash, Flash},
    models::{ExternalAccount, NameChange, Pronouns},
    SharedState,
};

/// Routes:
/// - `GET /` - Current user, CSRF token and pending flash message
/// - `POST /update-name` - Set or clear the display name
/// - `POST /update-pronouns` - Set pronouns
/// - `POST /logout` - Drop the session cookie
pub fn account_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_account).fallback(method_not_allowed))
        .route("/update-name", post(update_name).fallback(method_not_allowed))
        .route(
            "/update-pronouns",
            post(update_pronouns).fallback(method_not_allowed),
        )
        .route("/logout", post(logout).fallback(method_not_allowed))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub name: Option<String>,
    pub pronouns: Pronouns,
    pub accounts: Vec<ExternalAccount>,
    pub csrf_token: String,
    pub flash: Option<Flash>,
}

/// Decoded form body. Text fields only; the first occurrence of a name wins.
#[derive(Debug, Default)]
struct FormData(HashMap<String, String>);

impl FormData {
    /// Parse a urlencoded or multipart body, `None` if it is not a readable form.
    async fn parse(headers: &HeaderMap, body: Bytes) -> Option<Self> {
        let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
        let mime = content_type.split(';').next()?.trim();

        if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            let fields = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&body).ok()?;
            let mut form = Self::default();
            for (name, value) in fields {
                form.insert(name, value);
            }
            Some(form)
        } else if mime.eq_ignore_ascii_case("multipart/form-data") {
            Self::parse_multipart(content_type, body).await
        } else {
            None
        }
    }

    async fn parse_multipart(content_type: &str, body: Bytes) -> Option<Self> {
        let request = Request::builder()
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .ok()?;
        let mut multipart = Multipart::from_request(request, &()).await.ok()?;

        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.ok()? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if field.file_name().is_some() {
                continue;
            }
            let value = field.text().await.ok()?;
            form.insert(name, value);
        }
        Some(form)
    }

    fn insert(&mut self, name: String, value: String) {
        self.0.entry(name).or_insert(value);
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Parse the body and check its CSRF token.
///
/// `Err` is the response to send: 400 for an unreadable body, a redirect
/// with `E_CSRF` for a missing or wrong token.
async fn checked_form(
    session: &AuthenticatedUser,
    jar: CookieJar,
    headers: &HeaderMap,
    body: Bytes,
) -> std::result::Result<(CookieJar, FormData), Response> {
    let Some(form) = FormData::parse(headers, body).await else {
        return Err(Error::InvalidRequest("unreadable form body".to_string()).into_response());
    };

    let csrf_ok = form
        .get("csrfToken")
        .is_some_and(|token| auth::validate_csrf(session, token));
    if !csrf_ok {
        tracing::warn!("CSRF check failed for user {}", session.user.id);
        return Err(redirect_with_flash(jar, Flash::Csrf));
    }

    Ok((jar, form))
}

fn redirect_with_flash(jar: CookieJar, flash: Flash) -> Response {
    (set_flash(jar, flash), Redirect::to("/me")).into_response()
}

/// Get the current user and consume the pending flash message.
pub async fn get_account(session: AuthenticatedUser, jar: CookieJar) -> (CookieJar, Json<AccountResponse>) {
    let (jar, flash) = take_flash(jar);
    let user = session.user;

    (
        jar,
        Json(AccountResponse {
            id: user.id,
            name: user.name,
            pronouns: user.pronouns,
            accounts: user.accounts,
            csrf_token: session.csrf_token,
            flash,
        }),
    )
}

/// Set or clear the display name.
pub async fn update_name(
    session: AuthenticatedUser,
    State(state): State<SharedState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let (jar, form) = match checked_form(&session, jar, &headers, body).await {
        Ok(checked) => checked,
        Err(response) => return Ok(response),
    };

    let name = form
        .get("name")
        .ok_or_else(|| Error::InvalidRequest("missing name".to_string()))?;

    let user_id = session.user.id;
    match NameChange::from_input(name) {
        NameChange::TooLong => return Ok(redirect_with_flash(jar, Flash::NameTooLong)),
        NameChange::Delete => {
            tracing::info!("Deleting display name of user {}", user_id);
            state.storage.delete_name(user_id).await?;
        }
        NameChange::Update(name) => {
            tracing::info!("Updating display name of user {}", user_id);
            state.storage.update_name(user_id, &name).await?;
        }
    }

    Ok(redirect_with_flash(jar, Flash::NameUpdated))
}

/// Set pronouns from a pronoun code.
pub async fn update_pronouns(
    session: AuthenticatedUser,
    State(state): State<SharedState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let (jar, form) = match checked_form(&session, jar, &headers, body).await {
        Ok(checked) => checked,
        Err(response) => return Ok(response),
    };

    let code = form
        .get("pronouns")
        .ok_or_else(|| Error::InvalidRequest("missing pronouns".to_string()))?;

    let Ok(pronouns) = code.parse::<Pronouns>() else {
        return Ok(redirect_with_flash(jar, Flash::InvalidPronouns));
    };

    tracing::info!(
        "Updating pronouns of user {} to {}",
        session.user.id,
        pronouns.code()
    );
    state
        .storage
        .update_pronouns(session.user.id, pronouns)
        .await?;

    Ok(redirect_with_flash(jar, Flash::PronounsUpdated))
}

/// Drop the session cookie.
pub async fn logout(
    session: AuthenticatedUser,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (jar, _) = match checked_form(&session, jar, &headers, body).await {
        Ok(checked) => checked,
        Err(response) => return response,
    };

    tracing::info!("Logging out user {}", session.user.id);
    (jar.remove(auth::clear_session_cookie()), Redirect::to("/")).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        decorations::DecorationCollection,
        routes::{
            app,
            test_support::{body_string, form_post, session_for, set_cookies, test_state},
        },
        storage::{MemoryStorage, UserStorage},
    };

    struct Fixture {
        router: Router,
        state: SharedState,
        user_id: Uuid,
        cookie: String,
        csrf: String,
    }

    async fn fixture() -> Fixture {
        let storage = MemoryStorage::new();
        let user = storage
            .create_user(&ExternalAccount::new("discord", "1", "cyn"))
            .await
            .unwrap();
        storage.update_name(user.id, "Original").await.unwrap();

        let state = test_state(storage, DecorationCollection::default());
        let (cookie, csrf) = session_for(user.id);
        Fixture {
            router: app(state.clone()),
            state,
            user_id: user.id,
            cookie,
            csrf,
        }
    }

    impl Fixture {
        async fn stored_name(&self) -> Option<String> {
            self.state
                .storage
                .get_user(self.user_id)
                .await
                .unwrap()
                .unwrap()
                .name
        }

        async fn post_name(&self, body: &str) -> Response {
            self.router
                .clone()
                .oneshot(form_post("/me/update-name", Some(&self.cookie), body))
                .await
                .unwrap()
        }
    }

    fn assert_flash_redirect(response: &Response, flash: Flash) {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/me");
        let expected = format!("flash={}", flash.code());
        assert!(
            set_cookies(response).iter().any(|c| c.starts_with(&expected)),
            "missing {expected} in {:?}",
            set_cookies(response)
        );
    }

    #[tokio::test]
    async fn test_update_name() {
        let f = fixture().await;
        let response = f
            .post_name(&format!("csrfToken={}&name=%20%20Cyn%20%20", f.csrf))
            .await;

        assert_flash_redirect(&response, Flash::NameUpdated);
        assert_eq!(f.stored_name().await.as_deref(), Some("Cyn"));
    }

    #[tokio::test]
    async fn test_empty_name_deletes() {
        let f = fixture().await;
        let response = f.post_name(&format!("csrfToken={}&name=+++", f.csrf)).await;

        assert_flash_redirect(&response, Flash::NameUpdated);
        assert_eq!(f.stored_name().await, None);
    }

    #[tokio::test]
    async fn test_name_too_long_not_persisted() {
        let f = fixture().await;
        let response = f
            .post_name(&format!("csrfToken={}&name=abcdefghijklmnopq", f.csrf))
            .await;

        assert_flash_redirect(&response, Flash::NameTooLong);
        assert_eq!(f.stored_name().await.as_deref(), Some("Original"));
    }

    #[tokio::test]
    async fn test_bad_csrf_redirects_without_mutation() {
        let f = fixture().await;

        for body in ["name=New", "csrfToken=wrong&name=New", "csrfToken=&name="] {
            let response = f.post_name(body).await;
            assert_flash_redirect(&response, Flash::Csrf);
        }
        assert_eq!(f.stored_name().await.as_deref(), Some("Original"));
    }

    #[tokio::test]
    async fn test_missing_name_is_bad_request() {
        let f = fixture().await;
        let response = f.post_name(&format!("csrfToken={}", f.csrf)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "400: Bad request");
    }

    #[tokio::test]
    async fn test_update_name_from_multipart_form() {
        let f = fixture().await;
        let body = format!(
            "--XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"csrfToken\"\r\n\r\n\
             {}\r\n\
             --XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"name\"\r\n\r\n\
             Cyn\r\n\
             --XBOUNDARY--\r\n",
            f.csrf
        );
        let request = Request::post("/me/update-name")
            .header(header::COOKIE, &f.cookie)
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();
        let response = f.router.clone().oneshot(request).await.unwrap();

        assert_flash_redirect(&response, Flash::NameUpdated);
        assert_eq!(f.stored_name().await.as_deref(), Some("Cyn"));
    }

    #[tokio::test]
    async fn test_first_duplicate_field_wins() {
        let f = fixture().await;
        let response = f
            .post_name(&format!("csrfToken={}&name=First&name=Second", f.csrf))
            .await;

        assert_flash_redirect(&response, Flash::NameUpdated);
        assert_eq!(f.stored_name().await.as_deref(), Some("First"));
    }

    #[tokio::test]
    async fn test_unparsable_body_is_bad_request() {
        let f = fixture().await;
        let request = Request::post("/me/update-name")
            .header(header::COOKIE, &f.cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"x"}"#))
            .unwrap();
        let response = f.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unauthenticated_before_body_parsing() {
        let f = fixture().await;
        // Unreadable body: authentication must still fail first.
        let request = Request::post("/me/update-name")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("garbage"))
            .unwrap();
        let response = f.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_string(response).await, "401: Unauthorized");

        let response = f
            .router
            .clone()
            .oneshot(form_post(
                "/me/update-name",
                Some("token=not-a-jwt"),
                &format!("csrfToken={}&name=x", f.csrf),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(f.stored_name().await.as_deref(), Some("Original"));
    }

    #[tokio::test]
    async fn test_update_name_rejects_other_methods() {
        let f = fixture().await;
        for method in ["GET", "PUT", "DELETE"] {
            let request = Request::builder()
                .method(method)
                .uri("/me/update-name")
                .header(header::COOKIE, &f.cookie)
                .body(Body::empty())
                .unwrap();
            let response = f.router.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(body_string(response).await, "405: Method not allowed");
        }
    }

    #[tokio::test]
    async fn test_update_pronouns() {
        let f = fixture().await;
        let response = f
            .router
            .clone()
            .oneshot(form_post(
                "/me/update-pronouns",
                Some(&f.cookie),
                &format!("csrfToken={}&pronouns=tt", f.csrf),
            ))
            .await
            .unwrap();
        assert_flash_redirect(&response, Flash::PronounsUpdated);
        assert_eq!(
            f.state.storage.lookup_pronouns("discord", "1").await.unwrap(),
            Pronouns::Tt
        );

        let response = f
            .router
            .clone()
            .oneshot(form_post(
                "/me/update-pronouns",
                Some(&f.cookie),
                &format!("csrfToken={}&pronouns=nope", f.csrf),
            ))
            .await
            .unwrap();
        assert_flash_redirect(&response, Flash::InvalidPronouns);
    }

    #[tokio::test]
    async fn test_account_page_consumes_flash() {
        let f = fixture().await;
        let request = Request::get("/me")
            .header(header::COOKIE, format!("{}; flash=S_NAME_UPDATED", f.cookie))
            .body(Body::empty())
            .unwrap();
        let response = f.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("flash=;") || c.starts_with("flash=\"\"")));

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["flash"], "S_NAME_UPDATED");
        assert_eq!(body["name"], "Original");
        assert_eq!(body["csrfToken"], f.csrf.as_str());
        assert_eq!(body["accounts"][0]["platform"], "discord");
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let f = fixture().await;
        let response = f
            .router
            .clone()
            .oneshot(form_post(
                "/me/logout",
                Some(&f.cookie),
                &format!("csrfToken={}", f.csrf),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("token=")));
    }
}

//! One-shot status messages carried across a redirect in a cookie.

use std::{fmt, str::FromStr};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;

/// Cookie holding the pending flash message.
pub const FLASH_COOKIE: &str = "flash";

/// Status codes shown once on the account page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Flash {
    #[serde(rename = "E_CSRF")]
    Csrf,
    #[serde(rename = "E_NAME_TOO_LONG")]
    NameTooLong,
    #[serde(rename = "E_INVALID_PRONOUNS")]
    InvalidPronouns,
    #[serde(rename = "E_OAUTH_STATE")]
    OAuthState,
    #[serde(rename = "E_OAUTH_FETCH")]
    OAuthFetch,
    #[serde(rename = "E_ACCOUNT_NOT_FOUND")]
    AccountNotFound,
    #[serde(rename = "E_ACCOUNT_TAKEN")]
    AccountTaken,
    #[serde(rename = "E_LOGIN_REQUIRED")]
    LoginRequired,
    #[serde(rename = "S_NAME_UPDATED")]
    NameUpdated,
    #[serde(rename = "S_PRONOUNS_UPDATED")]
    PronounsUpdated,
    #[serde(rename = "S_ACCOUNT_LINKED")]
    AccountLinked,
}

impl Flash {
    const ALL: [Flash; 11] = [
        Self::Csrf,
        Self::NameTooLong,
        Self::InvalidPronouns,
        Self::OAuthState,
        Self::OAuthFetch,
        Self::AccountNotFound,
        Self::AccountTaken,
        Self::LoginRequired,
        Self::NameUpdated,
        Self::PronounsUpdated,
        Self::AccountLinked,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Csrf => "E_CSRF",
            Self::NameTooLong => "E_NAME_TOO_LONG",
            Self::InvalidPronouns => "E_INVALID_PRONOUNS",
            Self::OAuthState => "E_OAUTH_STATE",
            Self::OAuthFetch => "E_OAUTH_FETCH",
            Self::AccountNotFound => "E_ACCOUNT_NOT_FOUND",
            Self::AccountTaken => "E_ACCOUNT_TAKEN",
            Self::LoginRequired => "E_LOGIN_REQUIRED",
            Self::NameUpdated => "S_NAME_UPDATED",
            Self::PronounsUpdated => "S_PRONOUNS_UPDATED",
            Self::AccountLinked => "S_ACCOUNT_LINKED",
        }
    }
}

impl fmt::Display for Flash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Flash {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter().copied().find(|f| f.code() == s).ok_or(())
    }
}

/// Queue a flash message for the next page view.
pub fn set_flash(jar: CookieJar, flash: Flash) -> CookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, flash.code()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build(),
    )
}

/// Read and discard the pending flash message. Unknown codes are dropped.
pub fn take_flash(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    let flash = jar
        .get(FLASH_COOKIE)
        .and_then(|c| c.value().parse::<Flash>().ok());

    if jar.get(FLASH_COOKIE).is_some() {
        (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flash)
    } else {
        (jar, flash)
    }
}

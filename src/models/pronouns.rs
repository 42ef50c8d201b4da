//! Pronoun sets a user can pick.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A pronoun set, identified by its short code (`hh`, `tt`, `any`, ...).
///
/// Two-letter codes combine a subject and an object form: `ht` is "he/they".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pronouns {
    #[default]
    Unspecified,
    Hh,
    Hi,
    Hs,
    Ht,
    Ih,
    Ii,
    Is,
    It,
    Shh,
    Sh,
    Si,
    St,
    Th,
    Ti,
    Ts,
    Tt,
    Any,
    Other,
    Ask,
    Avoid,
}

impl Pronouns {
    pub const ALL: [Pronouns; 21] = [
        Self::Unspecified,
        Self::Hh,
        Self::Hi,
        Self::Hs,
        Self::Ht,
        Self::Ih,
        Self::Ii,
        Self::Is,
        Self::It,
        Self::Shh,
        Self::Sh,
        Self::Si,
        Self::St,
        Self::Th,
        Self::Ti,
        Self::Ts,
        Self::Tt,
        Self::Any,
        Self::Other,
        Self::Ask,
        Self::Avoid,
    ];

    /// Short code used on the wire and in storage.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Hh => "hh",
            Self::Hi => "hi",
            Self::Hs => "hs",
            Self::Ht => "ht",
            Self::Ih => "ih",
            Self::Ii => "ii",
            Self::Is => "is",
            Self::It => "it",
            Self::Shh => "shh",
            Self::Sh => "sh",
            Self::Si => "si",
            Self::St => "st",
            Self::Th => "th",
            Self::Ti => "ti",
            Self::Ts => "ts",
            Self::Tt => "tt",
            Self::Any => "any",
            Self::Other => "other",
            Self::Ask => "ask",
            Self::Avoid => "avoid",
        }
    }

    /// Human readable form, as rendered next to a username.
    #[must_use]
    pub fn format(&self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Hh => "he/him",
            Self::Hi => "he/it",
            Self::Hs => "he/she",
            Self::Ht => "he/they",
            Self::Ih => "it/him",
            Self::Ii => "it/its",
            Self::Is => "it/she",
            Self::It => "it/they",
            Self::Shh => "she/he",
            Self::Sh => "she/her",
            Self::Si => "she/it",
            Self::St => "she/they",
            Self::Th => "they/he",
            Self::Ti => "they/it",
            Self::Ts => "they/she",
            Self::Tt => "they/them",
            Self::Any => "Any pronouns",
            Self::Other => "Other pronouns",
            Self::Ask => "Ask me my pronouns",
            Self::Avoid => "Avoid pronouns, use my name",
        }
    }

    #[must_use]
    pub fn is_specified(&self) -> bool {
        !matches!(self, Self::Unspecified)
    }
}

impl fmt::Display for Pronouns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.format())
    }
}

/// Unknown pronoun code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pronouns code: {0}")]
pub struct UnknownPronouns(pub String);

impl FromStr for Pronouns {
    type Err = UnknownPronouns;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.code() == s)
            .ok_or_else(|| UnknownPronouns(s.to_string()))
    }
}

#[cfg(feature = "sqlx-storage")]
impl sqlx::Type<sqlx::Postgres> for Pronouns {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "sqlx-storage")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Pronouns {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse().unwrap_or_default())
    }
}

#[cfg(feature = "sqlx-storage")]
impl sqlx::Encode<'_, sqlx::Postgres> for Pronouns {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.code(), buf)
    }
}

//! Data models for the PronounDB service.

mod account;
mod pronouns;
mod user;

pub use account::ExternalAccount;
pub use pronouns::{Pronouns, UnknownPronouns};
pub use user::{NameChange, User, MAX_NAME_LENGTH};

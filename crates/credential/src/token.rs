//! Refresh endpoint payloads
//!
//! The refresh call POSTs `{"refreshToken": ...}` and receives the new pair
//! inside the envelope's `data`. Older backends name the access token
//! `token`; both spellings are accepted. A response without a refresh token
//! keeps the one the client already holds.

use serde::{Deserialize, Serialize};

use crate::store::Credential;

/// Body of the refresh call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Token pair returned by the refresh endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenPair {
    #[serde(rename = "accessToken", alias = "token", alias = "access_token")]
    pub access_token: String,
    #[serde(
        rename = "refreshToken",
        alias = "refresh_token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// Build the next credential, carrying over `previous`'s refresh token
    /// when the endpoint did not rotate it.
    pub fn into_credential(self, previous: &Credential) -> Credential {
        let refresh = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous.refresh_token().map(str::to_owned));
        Credential::new(self.access_token, refresh)
    }
}

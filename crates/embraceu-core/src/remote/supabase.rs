//! Supabase (PostgREST) insert client.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::models::{Destination, JsonObject};
use crate::util::{compact_text, normalize_text_option};

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Writes records through the project's `/rest/v1` endpoint.
#[derive(Clone)]
pub struct SupabaseRestStore {
    rest_url: String,
    anon_key: String,
    access_token: Option<String>,
    client: Client,
}

impl SupabaseRestStore {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>) -> RemoteResult<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            rest_url,
            anon_key,
            access_token: None,
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
        })
    }

    /// Authenticate inserts as a signed-in user instead of the anon role.
    #[must_use]
    pub fn with_access_token(mut self, access_token: Option<String>) -> Self {
        self.access_token = normalize_text_option(access_token);
        self
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    fn table_url(&self, destination: Destination) -> String {
        format!("{}/{}", self.rest_url, destination.as_str())
    }
}

impl fmt::Debug for SupabaseRestStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SupabaseRestStore")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl RemoteStore for SupabaseRestStore {
    async fn insert(&self, destination: Destination, record: &JsonObject) -> RemoteResult<()> {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        let response = self
            .client
            .post(self.table_url(destination))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Api {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }
}

/// Normalize a project URL into its PostgREST base (`.../rest/v1`).
pub fn normalize_rest_url(url: &str) -> RemoteResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !crate::util::is_http_url(trimmed) {
        return Err(RemoteError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            let detail = payload
                .details
                .or(payload.hint)
                .and_then(|detail| normalize_text_option(Some(detail)));
            return match detail {
                Some(detail) => format!("{} - {} ({})", message.trim(), detail, status.as_u16()),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

//! # Waitlist Store
//!
//! Hosted Postgres behind a PostgREST RPC surface (Supabase).
//!
//! All waitlist rules live in stored procedures: email uniqueness, position assignment, referral
//! bookkeeping and the 24h token expiry. This module only calls them by name and decodes what comes back.
//!
//! ## Procedures
//!
//! - `join_waitlist`: inserts an unconfirmed entry, returns one row with the confirmation token and position
//! - `confirm_waitlist`: consumes a token, returns one row with email, position and referral code
//! - `get_waitlist_count`: scalar count of confirmed entries
//!
//! ## Failure Channels
//!
//! Two distinct ways a call can go wrong:
//!
//! - [`StoreError`]: the procedure never ran or its reply was unusable (network, auth, bad payload)
//! - `success: false` inside the outcome: the procedure ran and declined, `error_message` is meant for the user
//!
//! No retries. Each request is bounded by the configured store timeout.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

pub const JOIN_PROCEDURE: &str = "join_waitlist";
pub const CONFIRM_PROCEDURE: &str = "confirm_waitlist";
pub const COUNT_PROCEDURE: &str = "get_waitlist_count";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Store responded with {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Unexpected store payload: {0}")]
    Decode(String),
}

/// Body of `POST /api/waitlist/join`.
///
/// Attribution fields are passed through untouched. A number or boolean is kept as its text, anything
/// that is not a scalar is dropped, so a stray tracking value never rejects an otherwise valid join.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct JoinRequest {
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub utm_source: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub utm_medium: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub utm_campaign: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub utm_term: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub utm_content: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub referrer: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub landing_page: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub referred_by_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct JoinOutcome {
    pub success: bool,
    #[serde(default)]
    pub waitlist_id: Option<String>,
    #[serde(default)]
    pub confirmation_token: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ConfirmOutcome {
    pub success: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Why a confirmation was declined.
///
/// The store only reports free text, so this is the one place that reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmFailure {
    Expired,
    Invalid,
    Unknown,
}

impl ConfirmFailure {
    pub fn classify(error_message: Option<&str>) -> Self {
        match error_message {
            Some(message) if message.contains("expired") => Self::Expired,
            Some(message) if message.contains("Invalid") => Self::Invalid,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Invalid => "invalid",
            Self::Unknown => "unknown",
        }
    }
}

#[async_trait]
pub trait WaitlistStore: Send + Sync {
    async fn join(&self, request: &JoinRequest) -> Result<JoinOutcome, StoreError>;

    async fn confirm(&self, token: &str) -> Result<ConfirmOutcome, StoreError>;

    /// Raw confirmed entry count, before any display policy.
    async fn count(&self) -> Result<u64, StoreError>;
}

pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        service_key: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn rpc_url(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{procedure}", self.base_url)
    }

    #[instrument(name = "store_rpc", skip(self, params))]
    async fn rpc<T: DeserializeOwned>(&self, procedure: &str, params: Value) -> Result<T, StoreError> {
        let response = self
            .client
            .post(self.rpc_url(procedure))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        let payload: Value = response.json().await?;
        serde_json::from_value(payload).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl WaitlistStore for RestStore {
    async fn join(&self, request: &JoinRequest) -> Result<JoinOutcome, StoreError> {
        let rows: Vec<JoinOutcome> = self.rpc(JOIN_PROCEDURE, join_params(request)).await?;

        Ok(rows.into_iter().next().unwrap_or_default())
    }

    async fn confirm(&self, token: &str) -> Result<ConfirmOutcome, StoreError> {
        let rows: Vec<ConfirmOutcome> = self
            .rpc(CONFIRM_PROCEDURE, json!({ "p_token": token }))
            .await?;

        Ok(rows.into_iter().next().unwrap_or_default())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: Option<u64> = self.rpc(COUNT_PROCEDURE, json!({})).await?;

        Ok(count.unwrap_or(0))
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(match value {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

/// Named parameters for `join_waitlist`. Blank optional fields become `null`.
pub fn join_params(request: &JoinRequest) -> Value {
    let optional = |field: &Option<String>| {
        field
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    json!({
        "p_email": request.email,
        "p_utm_source": optional(&request.utm_source),
        "p_utm_medium": optional(&request.utm_medium),
        "p_utm_campaign": optional(&request.utm_campaign),
        "p_utm_term": optional(&request.utm_term),
        "p_utm_content": optional(&request.utm_content),
        "p_referrer": optional(&request.referrer),
        "p_landing_page": optional(&request.landing_page),
        "p_referred_by_code": optional(&request.referred_by_code),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_confirm_failures() {
        assert_eq!(
            ConfirmFailure::classify(Some("Token expired")),
            ConfirmFailure::Expired
        );
        assert_eq!(
            ConfirmFailure::classify(Some("Invalid token")),
            ConfirmFailure::Invalid
        );
        assert_eq!(
            ConfirmFailure::classify(Some("Something else")),
            ConfirmFailure::Unknown
        );
        assert_eq!(ConfirmFailure::classify(None), ConfirmFailure::Unknown);
    }

    #[test]
    fn classification_is_case_sensitive() {
        assert_eq!(
            ConfirmFailure::classify(Some("invalid token")),
            ConfirmFailure::Unknown
        );
        assert_eq!(
            ConfirmFailure::classify(Some("Expired")),
            ConfirmFailure::Unknown
        );
    }

    #[test]
    fn blank_attribution_becomes_null() {
        let request = JoinRequest {
            email: "a@example.com".to_string(),
            utm_source: Some("twitter".to_string()),
            utm_medium: Some(String::new()),
            referred_by_code: Some("XYZ1".to_string()),
            ..JoinRequest::default()
        };

        let params = join_params(&request);

        assert_eq!(params["p_email"], "a@example.com");
        assert_eq!(params["p_utm_source"], "twitter");
        assert_eq!(params["p_utm_medium"], Value::Null);
        assert_eq!(params["p_landing_page"], Value::Null);
        assert_eq!(params["p_referred_by_code"], "XYZ1");
    }

    #[test]
    fn attribution_accepts_non_string_scalars() {
        let request: JoinRequest = serde_json::from_value(json!({
            "email": "a@example.com",
            "utm_term": 123,
            "utm_content": true,
            "utm_source": { "nested": "x" },
            "referrer": null,
            "landing_page": "/quiz"
        }))
        .unwrap();

        assert_eq!(request.utm_term.as_deref(), Some("123"));
        assert_eq!(request.utm_content.as_deref(), Some("true"));
        assert_eq!(request.utm_source, None);
        assert_eq!(request.referrer, None);
        assert_eq!(request.landing_page.as_deref(), Some("/quiz"));
        assert_eq!(request.utm_medium, None);
    }

    #[test]
    fn email_must_be_a_string() {
        assert!(serde_json::from_value::<JoinRequest>(json!({ "email": 42 })).is_err());
        assert!(serde_json::from_value::<JoinRequest>(json!({ "utm_term": "x" })).is_err());
    }

    #[test]
    fn decodes_rows_with_nulls() {
        let rows: Vec<JoinOutcome> = serde_json::from_value(json!([{
            "success": true,
            "waitlist_id": "7f1c",
            "confirmation_token": "tok",
            "position": 42,
            "error_message": null
        }]))
        .unwrap();

        assert_eq!(rows[0].position, Some(42));
        assert_eq!(rows[0].confirmation_token.as_deref(), Some("tok"));
        assert!(rows[0].error_message.is_none());

        let rows: Vec<ConfirmOutcome> =
            serde_json::from_value(json!([{ "success": false, "error_message": "Token expired" }]))
                .unwrap();

        assert!(!rows[0].success);
        assert!(rows[0].referral_code.is_none());
    }

    #[test]
    fn builds_rpc_urls() {
        let store = RestStore::new("https://db.example.com/", "key", Duration::from_secs(1)).unwrap();

        assert_eq!(
            store.rpc_url(COUNT_PROCEDURE),
            "https://db.example.com/rest/v1/rpc/get_waitlist_count"
        );
    }
}

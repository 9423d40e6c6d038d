use anyhow::{bail, Context};
use chrono::Utc;
use oauth2::{AccessToken, ClientId, ClientSecret};
use serde::Deserialize;
use tracing::{debug, error};

pub mod api;
pub mod token;

use token::{Credentials, MemoryTokenManager, TokenManager, TokenRecord};

const PRODUCTION_BASE_URL: &str = "https://energyoptimizer.azure-api.net/eco/v2";
const AAD_TOKEN_URL: &str =
    "https://login.microsoftonline.com/privagroup.onmicrosoft.com/oauth2/token";

#[derive(Debug)]
enum ApiException {
    /// Invalid or expired bearer token
    InvalidToken,
    /// The credentials are not authorized for this twin
    NotAuthorized,
    /// No twin with that identifier
    UnknownTwin,
    /// Too many requests
    TooManyRequests,
    UnknownError,
}

impl ApiException {
    fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 => ApiException::InvalidToken,
            403 => ApiException::NotAuthorized,
            404 => ApiException::UnknownTwin,
            429 => ApiException::TooManyRequests,
            _ => ApiException::UnknownError,
        }
    }
}

pub trait ApiClient {
    fn http_get(
        &self,
        path: &str,
        query_string: &[(String, String)],
    ) -> Result<String, anyhow::Error>;

    fn http_put(&self, path: &str, body: &str) -> Result<String, anyhow::Error>;
}

/// Token reply of the AAD v1 endpoint. `expires_in` arrives as a JSON
/// string there, while RFC 6749 servers send a number; accept both.
#[derive(Deserialize)]
struct AadTokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in", deserialize_with = "expires_in_seconds")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

fn expires_in_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

pub struct EcoTwinApi {
    client_id: ClientId,
    client_secret: ClientSecret,
    resource: String,
    base_url: String,
    token_url: String,
    token_manager: Box<dyn TokenManager>,
}

impl EcoTwinApi {
    pub fn new(token_manager: Box<dyn TokenManager>) -> Result<Self, anyhow::Error> {
        let credentials = token_manager.get_credentials()?;

        Ok(EcoTwinApi {
            client_id: ClientId::new(credentials.client_id),
            client_secret: ClientSecret::new(credentials.client_secret),
            resource: credentials.resource,
            base_url: PRODUCTION_BASE_URL.to_string(),
            token_url: AAD_TOKEN_URL.to_string(),
            token_manager,
        })
    }

    pub fn from_env_values() -> Self {
        let manager = MemoryTokenManager::new(Credentials::from_env_values());

        EcoTwinApi::new(Box::new(manager)).expect("in-memory manager always has credentials")
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Points the client-credentials exchange at another tenant's endpoint.
    pub fn with_token_url(mut self, token_url: String) -> Self {
        self.token_url = token_url;
        self
    }

    /// Returns a usable bearer token, going through the exchange if needed.
    pub fn access_token(&self) -> Result<AccessToken, anyhow::Error> {
        self.ensure_valid_token()
    }

    /// A stored token is only reused while it is still fresh; a missing or
    /// expired record goes through a new client-credentials exchange.
    fn ensure_valid_token(&self) -> Result<AccessToken, anyhow::Error> {
        if let Some(record) = self.token_manager.get_token() {
            if !record.is_expired() {
                return Ok(AccessToken::new(record.access_token));
            }
        }

        let record = self.fetch_new_token()?;
        Ok(AccessToken::new(record.access_token))
    }

    fn fetch_new_token(&self) -> Result<TokenRecord, anyhow::Error> {
        let payload = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.secret().as_str()),
            ("resource", self.resource.as_str()),
        ];

        let http_client = reqwest::blocking::Client::new();

        debug!(url = %self.token_url, "requesting access token");
        let response = http_client.post(&self.token_url).form(&payload).send()?;

        let status_code = response.status();
        let body = response.text()?;
        if !status_code.is_success() {
            error!(status = %status_code, body = %body, "token request failed");
            bail!(
                "token request failed: HTTP {}: {}",
                status_code.as_str(),
                body
            );
        }

        let reply: AadTokenResponse = serde_json::from_str(&body)
            .with_context(|| format!("parsing token reply of {}", self.token_url))?;

        let record = TokenRecord {
            access_token: reply.access_token,
            expires_at: Utc::now().timestamp() + reply.expires_in,
        };
        self.token_manager.store_token(record.clone());

        Ok(record)
    }
}

impl ApiClient for EcoTwinApi {
    fn http_get(
        &self,
        path: &str,
        query_string: &[(String, String)],
    ) -> Result<String, anyhow::Error> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.ensure_valid_token()?;

        let http_client = reqwest::blocking::Client::new();

        debug!(url = %url, "GET");
        let response = http_client
            .get(&url)
            .query(&query_string)
            .bearer_auth(token.secret())
            .send()?;

        check_response(response)
    }

    fn http_put(&self, path: &str, body: &str) -> Result<String, anyhow::Error> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.ensure_valid_token()?;

        let http_client = reqwest::blocking::Client::new();

        debug!(url = %url, "PUT");
        let response = http_client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .bearer_auth(token.secret())
            .send()?;

        check_response(response)
    }
}

fn check_response(response: reqwest::blocking::Response) -> Result<String, anyhow::Error> {
    let status_code = response.status();

    let body = response.text()?;
    if !status_code.is_success() {
        let status = ApiException::from_status(status_code);
        error!(status = %status_code, kind = ?status, body = %body, "request failed");
        bail!("HTTP {} ({:?}): {}", status_code.as_str(), status, body);
    }

    Ok(body)
}

//! Google service-account credentials for the Sheets API.
//!
//! The key's private key signs an RS256 assertion, which the key's token
//! endpoint exchanges for a short-lived access token. The token is cached
//! and reused until shortly before it expires.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::data::ProviderError;

/// Read-only access to spreadsheets
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// A cached token is replaced this long before it expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Fields of a downloaded service-account key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Account identity, used as the assertion issuer
    pub client_email: String,
    private_key: String,
    /// Token endpoint, also the assertion audience
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".into()
}

impl ServiceAccountKey {
    /// Parse a key file's JSON content.
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(json).map_err(|e| {
            ProviderError::InvalidRequest(format!("Invalid service-account key: {}", e))
        })
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Claims of the signed assertion
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Issues access tokens for one service account.
pub struct ServiceAccountAuth {
    client: reqwest::Client,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Create an issuer for the Sheets read-only scope.
    pub fn new(client: reqwest::Client, key: ServiceAccountKey) -> Result<Self, ProviderError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            ProviderError::InvalidRequest(format!("Invalid service-account private key: {}", e))
        })?;

        Ok(Self {
            client,
            key,
            signing_key,
            scope: SHEETS_READONLY_SCOPE.to_string(),
            cached: Mutex::new(None),
        })
    }

    /// Create an issuer straight from key file JSON.
    pub fn from_json(client: reqwest::Client, json: &str) -> Result<Self, ProviderError> {
        Self::new(client, ServiceAccountKey::from_json(json)?)
    }

    /// Service account identity
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// A valid access token, exchanging a new assertion when the cached one
    /// is missing or about to expire.
    pub async fn access_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.value.clone());
        }

        let token = self.exchange().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn assertion(&self, now: i64) -> Result<String, ProviderError> {
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| ProviderError::Internal(format!("Failed to sign assertion: {}", e)))
    }

    async fn exchange(&self) -> Result<CachedToken, ProviderError> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status(), "google_oauth"));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            ProviderError::Internal(format!("Failed to parse token response: {}", e))
        })?;

        debug!(
            client_email = %self.key.client_email,
            expires_in = body.expires_in,
            "Service-account token issued"
        );

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(REFRESH_MARGIN);
        Ok(CachedToken {
            value: body.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}

impl fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.key.client_email)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

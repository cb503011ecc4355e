//! Service-account authentication for the Firestore REST API.
//!
//! The key is the JSON blob Google issues for a service account. An RS256
//! JWT assertion signed with the key is exchanged at the key's `token_uri`
//! for a short-lived bearer token, which is reused until shortly before it
//! expires.

use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::FetchError;
use crate::logging::{info, obj, v_num, v_str, Domain};

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// A cached token is replaced this long before it expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON text. Base64-encoded JSON is accepted too,
    /// since secrets are often stored that way in environment variables.
    pub fn parse(blob: &str) -> Result<Self, FetchError> {
        let trimmed = blob.trim();
        let text = if trimmed.starts_with('{') {
            trimmed.to_string()
        } else {
            let bytes = STANDARD.decode(trimmed).map_err(|e| {
                FetchError::Credentials(format!("key is neither JSON nor base64: {}", e))
            })?;
            String::from_utf8(bytes)
                .map_err(|e| FetchError::Credentials(format!("decoded key is not UTF-8: {}", e)))?
        };
        let key: Self = serde_json::from_str(&text)
            .map_err(|e| FetchError::Credentials(format!("malformed service account key: {}", e)))?;
        if let Some(t) = &key.key_type {
            if t != "service_account" {
                return Err(FetchError::Credentials(format!(
                    "expected a service_account key, got `{}`",
                    t
                )));
            }
        }
        Ok(key)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, FetchError> {
        let text = std::fs::read_to_string(path).map_err(|source| FetchError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_key(key: &ServiceAccountKey, now: i64) -> Self {
        Self {
            iss: key.client_email.clone(),
            scope: DATASTORE_SCOPE.to_string(),
            aud: key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        }
    }
}

/// Sign the JWT assertion presented to the token endpoint.
pub fn sign_assertion(key: &ServiceAccountKey, now: i64) -> Result<String, FetchError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let encoding = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| FetchError::Credentials(format!("unusable private key: {}", e)))?;
    jsonwebtoken::encode(&header, &Claims::for_key(key, now), &encoding)
        .map_err(|e| FetchError::Credentials(format!("failed to sign assertion: {}", e)))
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

#[derive(Clone)]
pub struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

/// How requests to the document store are authorized.
#[derive(Debug)]
pub enum Authenticator {
    ServiceAccount {
        key: ServiceAccountKey,
        cached: Mutex<Option<CachedToken>>,
    },
    /// The local emulator accepts this fixed token.
    Emulator,
}

impl Authenticator {
    pub fn service_account(key: ServiceAccountKey) -> Self {
        Authenticator::ServiceAccount {
            key,
            cached: Mutex::new(None),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        match self {
            Authenticator::ServiceAccount { key, .. } => Some(&key.project_id),
            Authenticator::Emulator => None,
        }
    }

    pub async fn bearer_token(&self, client: &Client) -> Result<String, FetchError> {
        match self {
            Authenticator::Emulator => Ok("owner".to_string()),
            Authenticator::ServiceAccount { key, cached } => {
                let mut guard = cached.lock().await;
                if let Some(tok) = guard.as_ref().filter(|t| t.is_fresh()) {
                    return Ok(tok.token.clone());
                }
                let fresh = exchange(client, key).await?;
                let token = fresh.token.clone();
                *guard = Some(fresh);
                Ok(token)
            }
        }
    }
}

async fn exchange(client: &Client, key: &ServiceAccountKey) -> Result<CachedToken, FetchError> {
    let assertion = sign_assertion(key, chrono::Utc::now().timestamp())?;
    let resp = client
        .post(&key.token_uri)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Auth(format!(
            "token endpoint returned {}: {}",
            status.as_u16(),
            body
        )));
    }
    let parsed: TokenResponse = resp
        .json()
        .await
        .map_err(|e| FetchError::Auth(format!("malformed token response: {}", e)))?;
    info(
        Domain::Auth,
        "token_acquired",
        obj(&[
            ("client_email", v_str(&key.client_email)),
            ("expires_in", v_num(parsed.expires_in as f64)),
        ]),
    );
    Ok(CachedToken {
        token: parsed.access_token,
        expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
    })
}

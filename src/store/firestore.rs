use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::error::FetchError;
use crate::logging::{info, obj, v_num, v_str, Domain};
use crate::state::Config;
use crate::store::auth::{Authenticator, ServiceAccountKey};
use crate::store::value::decode_fields;
use crate::store::DocumentStore;
use crate::trial::FieldMap;

pub const DEFAULT_BASE: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_DATABASE: &str = "(default)";

/// Firestore REST client for single-document reads.
pub struct Firestore {
    client: Client,
    base: String,
    project_id: String,
    database: String,
    auth: Authenticator,
}

#[derive(Deserialize, Debug)]
struct DocumentResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize, Debug)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize, Debug)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl Firestore {
    pub fn new(
        base: impl Into<String>,
        project_id: impl Into<String>,
        database: impl Into<String>,
        auth: Authenticator,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: base.into(),
            project_id: project_id.into(),
            database: database.into(),
            auth,
        })
    }

    /// Emulator mode when `FIRESTORE_EMULATOR_HOST` is set, otherwise a
    /// service-account key from `FIRESTORE_CREDENTIALS` or
    /// `FIRESTORE_CREDENTIALS_FILE`.
    pub fn from_config(cfg: &Config) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(cfg.http_timeout_secs);
        if let Some(host) = &cfg.emulator_host {
            let project = cfg.project_id.clone().unwrap_or_else(|| "demo-project".to_string());
            return Self::new(
                format!("http://{}/v1", host),
                project,
                cfg.database.clone(),
                Authenticator::Emulator,
                timeout,
            );
        }

        let key = match (&cfg.credentials_json, &cfg.credentials_file) {
            (Some(blob), _) => ServiceAccountKey::parse(blob)?,
            (None, Some(path)) => ServiceAccountKey::from_file(path)?,
            (None, None) => {
                return Err(FetchError::Credentials(
                    "set FIRESTORE_CREDENTIALS or FIRESTORE_CREDENTIALS_FILE".to_string(),
                ))
            }
        };
        let project = cfg.project_id.clone().unwrap_or_else(|| key.project_id.clone());
        Self::new(
            cfg.firestore_base.clone(),
            project,
            cfg.database.clone(),
            Authenticator::service_account(key),
            timeout,
        )
    }

    pub fn document_url(&self, collection: &str, document: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base)
            .map_err(|e| FetchError::Config(format!("invalid FIRESTORE_BASE url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::Config("FIRESTORE_BASE must be an http(s) url".to_string())
            })?
            .pop_if_empty()
            .extend([
                "projects",
                self.project_id.as_str(),
                "databases",
                self.database.as_str(),
                "documents",
                collection,
                document,
            ]);
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for Firestore {
    async fn fetch(&self, collection: &str, document: &str) -> Result<FieldMap, FetchError> {
        let url = self.document_url(collection, document)?;
        let token = self.auth.bearer_token(&self.client).await?;
        let resp = self.client.get(url).bearer_auth(token).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| match e.error.status {
                    Some(s) => format!("{}: {}", s, e.error.message),
                    None => e.error.message,
                })
                .unwrap_or(body);
            return Err(match status {
                StatusCode::NOT_FOUND => FetchError::NotFound {
                    collection: collection.to_string(),
                    document: document.to_string(),
                },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Auth(detail),
                _ => FetchError::Http {
                    status: status.as_u16(),
                    message: detail,
                },
            });
        }

        let doc: DocumentResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(format!("unexpected document body: {}", e)))?;
        let fields = decode_fields(&doc.fields)?;
        info(
            Domain::Fetch,
            "document_fetched",
            obj(&[
                ("collection", v_str(collection)),
                ("document", v_str(document)),
                ("name", v_str(doc.name.as_deref().unwrap_or(""))),
                ("fields", v_num(fields.len() as f64)),
            ]),
        );
        Ok(fields)
    }
}

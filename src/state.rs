use std::path::PathBuf;

use crate::dashboard::{DEFAULT_COLLECTION, DEFAULT_DOCUMENT};
use crate::store::firestore::{DEFAULT_BASE, DEFAULT_DATABASE};
use crate::trial::IncompleteTrialPolicy;

#[derive(Clone)]
pub struct Config {
    pub collection: String,
    pub document: String,
    /// Service-account key JSON (or base64 of it).
    pub credentials_json: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub project_id: Option<String>,
    pub database: String,
    pub firestore_base: String,
    pub emulator_host: Option<String>,
    /// Read documents from `{dir}/{collection}/{document}.json` instead.
    pub fixture_dir: Option<PathBuf>,
    pub http_timeout_secs: u64,
    pub bind_addr: String,
    pub preview_rows: usize,
    pub incomplete_trials: IncompleteTrialPolicy,
    /// Re-fetch on every page view instead of only on explicit refresh.
    pub refresh_on_view: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("collection", &self.collection)
            .field("document", &self.document)
            .field("credentials_json", &self.credentials_json.as_ref().map(|_| "[REDACTED]"))
            .field("credentials_file", &self.credentials_file)
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("firestore_base", &self.firestore_base)
            .field("emulator_host", &self.emulator_host)
            .field("fixture_dir", &self.fixture_dir)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("bind_addr", &self.bind_addr)
            .field("preview_rows", &self.preview_rows)
            .field("incomplete_trials", &self.incomplete_trials)
            .field("refresh_on_view", &self.refresh_on_view)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            collection: get("COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            document: get("DOCUMENT").unwrap_or_else(|| DEFAULT_DOCUMENT.to_string()),
            credentials_json: get("FIRESTORE_CREDENTIALS"),
            credentials_file: get("FIRESTORE_CREDENTIALS_FILE").map(PathBuf::from),
            project_id: get("FIRESTORE_PROJECT"),
            database: get("FIRESTORE_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            firestore_base: get("FIRESTORE_BASE").unwrap_or_else(|| DEFAULT_BASE.to_string()),
            emulator_host: get("FIRESTORE_EMULATOR_HOST"),
            fixture_dir: get("DOCUMENT_FIXTURE_DIR").map(PathBuf::from),
            http_timeout_secs: get("HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()).unwrap_or(30),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8501".to_string()),
            preview_rows: get("PREVIEW_ROWS").and_then(|v| v.parse().ok()).unwrap_or(5),
            incomplete_trials: get("INCOMPLETE_TRIALS")
                .and_then(|v| IncompleteTrialPolicy::parse(&v))
                .unwrap_or_default(),
            refresh_on_view: get("REFRESH_ON_VIEW")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

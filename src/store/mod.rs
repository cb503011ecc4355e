use async_trait::async_trait;

use crate::error::FetchError;
use crate::state::Config;
use crate::trial::FieldMap;

pub mod auth;
pub mod firestore;
pub mod fixture;
pub mod value;

/// Which backend `StoreKind::build` produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Firestore,
    Fixture,
}

impl StoreKind {
    pub fn from_config(cfg: &Config) -> Self {
        if cfg.fixture_dir.is_some() {
            StoreKind::Fixture
        } else {
            StoreKind::Firestore
        }
    }

    pub fn build(self, cfg: &Config) -> Result<Box<dyn DocumentStore + Send + Sync>, FetchError> {
        match self {
            StoreKind::Firestore => Ok(Box::new(firestore::Firestore::from_config(cfg)?)),
            StoreKind::Fixture => {
                let root = cfg.fixture_dir.clone().ok_or_else(|| {
                    FetchError::Config(
                        "fixture store selected without DOCUMENT_FIXTURE_DIR".to_string(),
                    )
                })?;
                Ok(Box::new(fixture::FixtureStore::new(root)))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Firestore => "firestore",
            StoreKind::Fixture => "fixture",
        }
    }
}

/// Read access to a remote document database.
#[async_trait]
pub trait DocumentStore {
    /// Return the document's fields as plain JSON.
    async fn fetch(&self, collection: &str, document: &str) -> Result<FieldMap, FetchError>;
}

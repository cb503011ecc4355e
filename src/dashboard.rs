//! One fetch, one build: the snapshot a page is rendered from.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::DashboardError;
use crate::group::{GroupDocument, GroupSummary};
use crate::logging::{error, info, obj, v_str, Domain, ProfileScope};
use crate::plot::{ScatterPlot, DEFAULT_PLOTS};
use crate::store::DocumentStore;
use crate::table::TrialTable;
use crate::trial::{FieldMap, IncompleteTrialPolicy};

pub const DEFAULT_COLLECTION: &str = "groups";
pub const DEFAULT_DOCUMENT: &str = "000";

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub collection: String,
    pub document_id: String,
    pub group: GroupSummary,
    pub table: TrialTable,
    /// The document exactly as fetched.
    pub document: FieldMap,
    pub fetched_at: DateTime<Utc>,
    /// SHA-256 of the document's JSON text.
    pub fingerprint: String,
}

impl Dashboard {
    /// Build from an already fetched document.
    pub fn from_document(
        collection: &str,
        document_id: &str,
        fields: FieldMap,
        policy: IncompleteTrialPolicy,
    ) -> Result<Self, DashboardError> {
        let fingerprint = fingerprint(&fields);
        let group = GroupDocument::from_fields(fields)?;
        let table = {
            let _scope = ProfileScope::with_context(
                "build_table",
                &[("trials", json!(group.trials.len()))],
            );
            TrialTable::build_with(&group.trials, policy)?
        };
        Ok(Self {
            collection: collection.to_string(),
            document_id: document_id.to_string(),
            group: group.summary,
            table,
            document: group.raw,
            fetched_at: Utc::now(),
            fingerprint,
        })
    }

    pub fn plots(&self) -> Vec<ScatterPlot> {
        DEFAULT_PLOTS
            .iter()
            .map(|(x, y)| ScatterPlot::from_table(&self.table, x, y))
            .collect()
    }

    pub fn table_json(&self) -> Value {
        json!({
            "collection": self.collection,
            "document": self.document_id,
            "fingerprint": self.fingerprint,
            "columns": self.table.columns,
            "rows": self.table.to_records(),
            "excluded": self.table.excluded,
        })
    }
}

fn fingerprint(fields: &FieldMap) -> String {
    let text = Value::Object(fields.clone()).to_string();
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Fetch `collection/document_id` once and build the dashboard snapshot.
///
/// Nothing is retried; any failure aborts the whole load.
pub async fn load_and_build(
    store: &(dyn DocumentStore + Send + Sync),
    collection: &str,
    document_id: &str,
    policy: IncompleteTrialPolicy,
) -> Result<Dashboard, DashboardError> {
    let fields = {
        let _scope = ProfileScope::with_context(
            "fetch_document",
            &[("collection", v_str(collection)), ("document", v_str(document_id))],
        );
        store.fetch(collection, document_id).await
    };
    let fields = fields.map_err(|e| {
        error(
            Domain::Fetch,
            "fetch_failed",
            obj(&[
                ("collection", v_str(collection)),
                ("document", v_str(document_id)),
                ("error", v_str(&e.to_string())),
            ]),
        );
        e
    })?;

    let dashboard = Dashboard::from_document(collection, document_id, fields, policy)?;
    info(
        Domain::Fetch,
        "dashboard_loaded",
        obj(&[
            ("collection", v_str(collection)),
            ("document", v_str(document_id)),
            ("group_id", v_str(&dashboard.group.group_id)),
            ("rows", json!(dashboard.table.len())),
            ("fingerprint", v_str(&dashboard.fingerprint)),
        ]),
    );
    Ok(dashboard)
}

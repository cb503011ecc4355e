//! Trust game analysis dashboard.
//!
//! Reads one group document from Firestore, turns its `trials` array into a
//! table with four normalized percentage columns, and renders a single HTML
//! page with a trial preview, three regression plots and the raw document.

pub mod dashboard;
pub mod error;
pub mod group;
pub mod logging;
pub mod plot;
pub mod regression;
pub mod render;
pub mod server;
pub mod state;
pub mod store;
pub mod table;
pub mod trial;

pub use dashboard::{load_and_build, Dashboard};
pub use error::{DashboardError, DocumentError, FetchError, ValidationError};
pub use store::DocumentStore;
pub use table::TrialTable;
pub use trial::{IncompleteTrialPolicy, TrialRecord};

//! One-shot render: fetch the group document, build the trial table and
//! write the dashboard page to a file.
//!
//! Usage: snapshot [OUT_PATH]   (default: dashboard.html)
//! Configuration comes from the same environment variables as the server.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;
use trust_game_analysis::load_and_build;
use trust_game_analysis::logging::{info, obj, v_str, Domain};
use trust_game_analysis::render::{render_page, PageOptions};
use trust_game_analysis::state::Config;
use trust_game_analysis::store::StoreKind;

#[tokio::main]
async fn main() -> Result<()> {
    let out = PathBuf::from(env::args().nth(1).unwrap_or_else(|| "dashboard.html".to_string()));
    let cfg = Config::from_env();
    let store = StoreKind::from_config(&cfg)
        .build(&cfg)
        .context("failed to set up document store")?;

    let dashboard = load_and_build(
        store.as_ref(),
        &cfg.collection,
        &cfg.document,
        cfg.incomplete_trials,
    )
    .await
    .with_context(|| format!("failed to load {}/{}", cfg.collection, cfg.document))?;

    let html = render_page(
        &dashboard,
        &PageOptions {
            preview_rows: cfg.preview_rows,
            refresh_action: None,
        },
    );
    std::fs::write(&out, html).with_context(|| format!("failed to write {}", out.display()))?;

    info(
        Domain::Render,
        "snapshot_written",
        obj(&[
            ("path", v_str(&out.to_string_lossy())),
            ("group_id", v_str(&dashboard.group.group_id)),
            ("rows", json!(dashboard.table.len())),
            ("excluded", json!(dashboard.table.excluded.len())),
            ("fingerprint", v_str(&dashboard.fingerprint)),
        ]),
    );
    Ok(())
}

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use trust_game_analysis::logging::{error, info, obj, v_str, Domain};
use trust_game_analysis::server::{build_router, AppState, ServerOptions};
use trust_game_analysis::state::Config;
use trust_game_analysis::store::StoreKind;

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (Ok(mut sigterm), Ok(mut sigint)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let kind = StoreKind::from_config(&cfg);
    let store = kind.build(&cfg).context("failed to set up document store")?;

    info(
        Domain::System,
        "startup",
        obj(&[
            ("store", v_str(kind.as_str())),
            ("collection", v_str(&cfg.collection)),
            ("document", v_str(&cfg.document)),
            ("bind_addr", v_str(&cfg.bind_addr)),
            ("preview_rows", json!(cfg.preview_rows)),
            ("incomplete_trials", json!(cfg.incomplete_trials)),
            ("refresh_on_view", json!(cfg.refresh_on_view)),
        ]),
    );

    let state = AppState::new(
        Arc::from(store),
        ServerOptions {
            collection: cfg.collection.clone(),
            document: cfg.document.clone(),
            policy: cfg.incomplete_trials,
            preview_rows: cfg.preview_rows,
            refresh_on_view: cfg.refresh_on_view,
        },
    );

    // Warm the snapshot; a failure here is reported again on the first view.
    if let Err(e) = state.refresh().await {
        error(
            Domain::System,
            "initial_load_failed",
            obj(&[("error", v_str(&e.to_string()))]),
        );
    }

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    info(
        Domain::Server,
        "listening",
        obj(&[("url", v_str(&format!("http://{}", cfg.bind_addr)))]),
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("server failed")?;

    info(Domain::System, "shutdown", obj(&[]));
    Ok(())
}

//! HTML page assembly.

use std::fmt::Write as _;

use serde_json::Value;

use crate::dashboard::Dashboard;
use crate::logging::{log, obj, v_num, Domain, Level, ProfileScope};
use crate::plot::DEFAULT_PLOTS;

pub const TITLE: &str = "Trust Game Demo Data Analysis";

#[derive(Debug, Clone)]
pub struct PageOptions {
    pub preview_rows: usize,
    /// Show the refresh form (off for static snapshots).
    pub refresh_action: Option<String>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            refresh_action: Some("/refresh".to_string()),
        }
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => escape_html(s),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() != 0.0 => format!("{:.2}", f),
            _ => n.to_string(),
        },
        Some(other) => escape_html(&other.to_string()),
    }
}

const STYLE: &str = "body{font-family:sans-serif;margin:0;display:flex}\
aside{width:260px;min-height:100vh;background:#f0f2f6;padding:16px;box-sizing:border-box}\
main{flex:1;padding:24px;overflow-x:auto}\
table{border-collapse:collapse;font-size:13px}\
th,td{border:1px solid #ddd;padding:4px 8px;text-align:right}\
.figures{display:flex;gap:16px;flex-wrap:wrap}\
pre{background:#f7f7f7;padding:12px;overflow-x:auto}\
.notice{background:#fff4e5;padding:8px 12px;border-left:4px solid #f0a020}";

fn sidebar(out: &mut String, dashboard: &Dashboard) {
    let s = &dashboard.group;
    let _ = write!(out, "<aside><h1>Group ID: {}</h1><hr/>", escape_html(&s.group_id));
    for (label, value) in [
        ("Current Trial", &s.current_trial),
        ("Current State", &s.current_state),
        ("Investor", &s.investor_name),
        ("Trustee", &s.trustee_name),
    ] {
        let _ = write!(
            out,
            "<h2><em>{}:</em> {}</h2>",
            label,
            escape_html(value)
        );
    }
    let _ = write!(
        out,
        "<p><small>Fetched {} &middot; {}</small></p></aside>",
        escape_html(&dashboard.fetched_at.to_rfc3339()),
        escape_html(&dashboard.fingerprint[..12.min(dashboard.fingerprint.len())])
    );
}

fn preview(out: &mut String, dashboard: &Dashboard, rows: usize) {
    let table = &dashboard.table;
    out.push_str("<table class=\"trials\"><thead><tr><th>trials</th>");
    for c in &table.columns {
        let _ = write!(out, "<th>{}</th>", escape_html(c));
    }
    out.push_str("</tr></thead><tbody>");
    for row in table.head(rows) {
        let _ = write!(out, "<tr><th>{}</th>", row.index);
        for c in &table.columns {
            let _ = write!(out, "<td>{}</td>", cell(row.get(c)));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    let _ = write!(
        out,
        "<p><small>Showing {} of {} trials.</small></p>",
        table.head(rows).len(),
        table.len()
    );
}

pub fn render_page(dashboard: &Dashboard, opts: &PageOptions) -> String {
    let _scope = ProfileScope::new("render_page");
    let mut out = String::with_capacity(16 * 1024);
    let _ = write!(
        out,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"/><title>{}</title><style>{}</style></head><body>",
        TITLE, STYLE
    );
    sidebar(&mut out, dashboard);

    let _ = write!(out, "<main><h1>{}</h1>", TITLE);
    out.push_str(
        "<p>This page reads the group document from the same database that powers the \
         trust game web app and shows the trial-level data.</p>",
    );
    if let Some(action) = &opts.refresh_action {
        let _ = write!(
            out,
            "<form method=\"post\" action=\"{}\"><button type=\"submit\">Refresh data</button></form>",
            escape_html(action)
        );
    }

    out.push_str(
        "<h2>Trial Level Data</h2><p>Each row is a single trial and each column is the \
         corresponding decision, rating, and/or outcome data for that trial:</p>",
    );
    if !dashboard.table.excluded.is_empty() {
        let indices: Vec<String> = dashboard
            .table
            .excluded
            .iter()
            .map(|e| e.index.to_string())
            .collect();
        let _ = write!(
            out,
            "<p class=\"notice\">Excluded incomplete trials: {}</p>",
            indices.join(", ")
        );
    }
    preview(&mut out, dashboard, opts.preview_rows);

    out.push_str(
        "<h2>Figures</h2><p>Investors' and Trustees' expectations compared to their \
         actual behavior:</p><div class=\"figures\">",
    );
    for plot in dashboard.plots() {
        out.push_str("<figure>");
        out.push_str(&plot.render_svg());
        if let Some(f) = &plot.fit {
            let _ = write!(
                out,
                "<figcaption>y = {:.2} + {:.2}x, R&sup2; = {:.2}, n = {}</figcaption>",
                f.intercept, f.slope, f.r_squared, f.n
            );
        }
        out.push_str("</figure>");
    }
    out.push_str("</div>");

    let pretty = serde_json::to_string_pretty(&Value::Object(dashboard.document.clone()))
        .unwrap_or_default();
    let _ = write!(
        out,
        "<h2>Raw Firestore Document Data:</h2><details><summary>Click to open</summary><pre>{}</pre></details>",
        escape_html(&pretty)
    );
    out.push_str("</main></body></html>");

    log(
        Level::Debug,
        Domain::Render,
        "page_rendered",
        obj(&[
            ("bytes", v_num(out.len() as f64)),
            ("plots", v_num(DEFAULT_PLOTS.len() as f64)),
        ]),
    );
    out
}

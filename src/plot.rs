//! Scatter plots with a regression line and confidence band, as inline SVG.

use std::fmt::Write as _;

use serde::Serialize;

use crate::regression::{fit, LinearFit};
use crate::render::escape_html;
use crate::table::TrialTable;
use crate::trial::{INVESTOR_BEHAVIOR, INVESTOR_EXPECTATION, TRUSTEE_BEHAVIOR, TRUSTEE_EXPECTATION};

/// Column pairs plotted on the dashboard, (x, y).
pub const DEFAULT_PLOTS: [(&str, &str); 3] = [
    (INVESTOR_EXPECTATION, INVESTOR_BEHAVIOR),
    (TRUSTEE_EXPECTATION, TRUSTEE_BEHAVIOR),
    (INVESTOR_EXPECTATION, TRUSTEE_EXPECTATION),
];

const WIDTH: f64 = 360.0;
const HEIGHT: f64 = 320.0;
const MARGIN_LEFT: f64 = 52.0;
const MARGIN_RIGHT: f64 = 14.0;
const MARGIN_TOP: f64 = 14.0;
const MARGIN_BOTTOM: f64 = 46.0;
const TICKS: usize = 5;
const BAND_STEPS: usize = 40;

#[derive(Debug, Clone, Serialize)]
pub struct ScatterPlot {
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
    pub fit: Option<LinearFit>,
}

impl ScatterPlot {
    pub fn new(x_label: &str, y_label: &str, points: Vec<(f64, f64)>) -> Self {
        let fit = fit(&points);
        Self {
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            points,
            fit,
        }
    }

    pub fn from_table(table: &TrialTable, x: &str, y: &str) -> Self {
        Self::new(x, y, table.pairs(x, y))
    }

    /// Data bounds padded by 5% (at least 1 unit when a range is flat).
    fn bounds(&self) -> (f64, f64, f64, f64) {
        let xs = self.points.iter().map(|p| p.0);
        let ys = self.points.iter().map(|p| p.1);
        let (x0, x1) = padded(xs);
        let (mut y0, mut y1) = padded(ys);
        if let Some(f) = &self.fit {
            for x in [x0, x1] {
                let (lo, hi) = f.confidence_band(x);
                if lo.is_finite() && hi.is_finite() {
                    y0 = y0.min(lo);
                    y1 = y1.max(hi);
                }
            }
        }
        (x0, x1, y0, y1)
    }

    pub fn render_svg(&self) -> String {
        let (x0, x1, y0, y1) = self.bounds();
        let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let sx = |x: f64| MARGIN_LEFT + (x - x0) / (x1 - x0) * plot_w;
        let sy = |y: f64| MARGIN_TOP + plot_h - (y - y0) / (y1 - y0) * plot_h;

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="scatter" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
            w = WIDTH,
            h = HEIGHT
        );
        let _ = write!(
            svg,
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="#fafafa" stroke="#888"/>"##,
            MARGIN_LEFT, MARGIN_TOP, plot_w, plot_h
        );

        for i in 0..=TICKS {
            let t = i as f64 / TICKS as f64;
            let xv = x0 + t * (x1 - x0);
            let yv = y0 + t * (y1 - y0);
            let _ = write!(
                svg,
                r##"<text x="{:.1}" y="{:.1}" font-size="10" text-anchor="middle" fill="#444">{}</text>"##,
                sx(xv),
                MARGIN_TOP + plot_h + 14.0,
                tick_label(xv)
            );
            let _ = write!(
                svg,
                r##"<text x="{:.1}" y="{:.1}" font-size="10" text-anchor="end" fill="#444">{}</text>"##,
                MARGIN_LEFT - 4.0,
                sy(yv) + 3.0,
                tick_label(yv)
            );
        }

        if let Some(f) = &self.fit {
            let mut upper = Vec::with_capacity(BAND_STEPS + 1);
            let mut lower = Vec::with_capacity(BAND_STEPS + 1);
            for i in 0..=BAND_STEPS {
                let x = x0 + (x1 - x0) * i as f64 / BAND_STEPS as f64;
                let (lo, hi) = f.confidence_band(x);
                if lo.is_finite() && hi.is_finite() {
                    upper.push(format!("{:.1},{:.1}", sx(x), sy(hi)));
                    lower.push(format!("{:.1},{:.1}", sx(x), sy(lo)));
                }
            }
            if !upper.is_empty() {
                lower.reverse();
                upper.extend(lower);
                let _ = write!(
                    svg,
                    r##"<polygon class="band" points="{}" fill="#1f77b4" fill-opacity="0.15" stroke="none"/>"##,
                    upper.join(" ")
                );
            }
            let _ = write!(
                svg,
                r##"<line class="fit" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#1f77b4" stroke-width="2"/>"##,
                sx(x0),
                sy(f.predict(x0)),
                sx(x1),
                sy(f.predict(x1))
            );
        }

        for &(x, y) in &self.points {
            let _ = write!(
                svg,
                r##"<circle cx="{:.1}" cy="{:.1}" r="3.5" fill="#1f77b4" fill-opacity="0.8"/>"##,
                sx(x),
                sy(y)
            );
        }

        let _ = write!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" font-size="12" text-anchor="middle" fill="#222">{}</text>"##,
            MARGIN_LEFT + plot_w / 2.0,
            HEIGHT - 8.0,
            escape_html(&self.x_label)
        );
        let _ = write!(
            svg,
            r##"<text x="12" y="{:.1}" font-size="12" text-anchor="middle" fill="#222" transform="rotate(-90 12 {:.1})">{}</text>"##,
            MARGIN_TOP + plot_h / 2.0,
            MARGIN_TOP + plot_h / 2.0,
            escape_html(&self.y_label)
        );
        svg.push_str("</svg>");
        svg
    }
}

fn padded(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 100.0);
    }
    let span = hi - lo;
    if span <= f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    (lo - span * 0.05, hi + span * 0.05)
}

fn tick_label(v: f64) -> String {
    if v.abs() >= 100.0 || v.fract().abs() < 1e-9 {
        format!("{:.0}", v)
    } else {
        format!("{:.1}", v)
    }
}

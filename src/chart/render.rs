//! SVG assembly.
//!
//! Series paths and gridlines are emitted in local data coordinates inside a
//! `translate` + `scale` group pair; labels and the current-value column are
//! emitted directly in pixel space.

use std::fmt::Write;
use std::sync::Arc;

use tracing::trace;

use crate::chart::config::ChartConfig;
use crate::chart::format::format_kb_label;
use crate::chart::grid::{GridCache, GridCacheStats, GridLine};
use crate::chart::transform::ChartTransform;
use crate::error::ChartError;
use crate::metric::{MetricKind, MetricVisibility};
use crate::store::{ProcessExtrema, SeriesSnapshot};

const NO_DATA_TEXT: &str = "No data";
const CURRENT_VALUE_ROW_HEIGHT: f64 = 16.0;
const CURRENT_VALUE_SWATCH: f64 = 10.0;

struct Theme {
    background: &'static str,
    frame: &'static str,
    grid: &'static str,
}

impl Theme {
    fn for_dark(prefers_dark: bool) -> Self {
        if prefers_dark {
            Theme {
                background: "#202020",
                frame: "white",
                grid: "#606060",
            }
        } else {
            Theme {
                background: "#f3f3f3",
                frame: "black",
                grid: "#c0c0c0",
            }
        }
    }
}

/// Renders one process chart at a time; keeps gridline caches between calls.
#[derive(Debug)]
pub struct ChartRenderer {
    config: ChartConfig,
    grid: GridCache,
}

impl ChartRenderer {
    pub fn new(config: ChartConfig) -> Result<Self, ChartError> {
        config.validate()?;
        Ok(Self {
            config,
            grid: GridCache::default(),
        })
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Resizes the container. Invalid sizes leave the renderer untouched.
    pub fn update_size(&mut self, width: f64, height: f64) -> Result<(), ChartError> {
        let candidate = ChartConfig {
            container_width: width,
            container_height: height,
            ..self.config.clone()
        };
        candidate.validate()?;
        self.config = candidate;
        Ok(())
    }

    pub fn update_theme(&mut self, prefers_dark: bool) {
        self.config.prefers_dark = prefers_dark;
    }

    pub fn set_visibility(&mut self, visibility: MetricVisibility) {
        self.config.visibility = visibility;
    }

    pub fn transform(&self, extrema: &ProcessExtrema) -> ChartTransform {
        ChartTransform::compute(&self.config, extrema)
    }

    /// Vertical gridlines across the displayed time window.
    pub fn vertical_grid_lines(&mut self, transform: &ChartTransform) -> Arc<[GridLine]> {
        let window_end = transform.min_moment.saturating_add(transform.time_range);
        self.grid.vertical(transform.min_moment, window_end)
    }

    pub fn horizontal_grid_lines(&mut self, extrema: &ProcessExtrema) -> Arc<[GridLine]> {
        let max_kb = extrema.max_kb.max(0);
        self.grid.horizontal(max_kb, self.config.label_precision)
    }

    pub fn clear_cache(&mut self) {
        self.grid.clear();
    }

    pub fn cache_stats(&self) -> GridCacheStats {
        self.grid.stats()
    }

    /// Renders the complete chart for one process.
    pub fn render_to_string(&mut self, extrema: &ProcessExtrema, series: &[SeriesSnapshot]) -> String {
        let transform = self.transform(extrema);
        let theme = Theme::for_dark(self.config.prefers_dark);
        let has_data = extrema.has_data();

        let (vertical, horizontal) = if has_data {
            (
                self.vertical_grid_lines(&transform),
                self.horizontal_grid_lines(extrema),
            )
        } else {
            (Arc::from(Vec::<GridLine>::new()), Arc::from(Vec::<GridLine>::new()))
        };

        let visible: Vec<&SeriesSnapshot> = series
            .iter()
            .filter(|s| !s.points.is_empty() && self.config.visibility.is_visible(s.kind))
            .collect();

        let config = &self.config;
        let mut out = String::with_capacity(4096);
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="graph-plot" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = px(config.container_width),
            h = px(config.container_height)
        )
        .ok();
        write_styles(&mut out, config, &theme);
        writeln!(
            out,
            r#"<rect x="0" y="0" width="100%" height="100%" fill="{}"/>"#,
            theme.background
        )
        .ok();

        writeln!(
            out,
            r#"<g transform="translate({}, {})"><g transform="scale({}, {})">"#,
            px(transform.translate_x),
            px(transform.translate_y),
            scale(transform.scale_x),
            scale(transform.scale_y)
        )
        .ok();
        writeln!(
            out,
            r#"<rect class="generic-frame" x="0" y="0" width="{}" height="{}"/>"#,
            transform.time_range, transform.amount_range
        )
        .ok();
        write_grid_path(&mut out, &vertical, &horizontal, &transform);
        for snapshot in &visible {
            write_series_path(&mut out, snapshot, &transform);
        }
        writeln!(out, "</g></g>").ok();

        write_axis_labels(&mut out, config, &transform, &vertical, &horizontal);

        if !has_data {
            writeln!(
                out,
                r#"<text class="no-data" x="{}" y="{}" text-anchor="middle" dominant-baseline="middle">{}</text>"#,
                px(transform.translate_x + transform.graph_area_width / 2.0),
                px(transform.translate_y + transform.graph_area_height / 2.0),
                NO_DATA_TEXT
            )
            .ok();
        }

        if config.has_current_value_column() {
            write_current_values(&mut out, config, &transform, &visible);
        }

        writeln!(out, "</svg>").ok();
        trace!(
            "rendered {} series, {} vertical and {} horizontal gridlines",
            visible.len(),
            vertical.len(),
            horizontal.len()
        );
        out
    }
}

/// Pixel value with at most two decimals.
fn px(value: f64) -> String {
    trim_decimals(format!("{:.2}", value))
}

/// Scale factors can be tiny; keep more digits.
fn scale(value: f64) -> String {
    trim_decimals(format!("{:.9}", value))
}

fn trim_decimals(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn write_styles(out: &mut String, config: &ChartConfig, theme: &Theme) {
    writeln!(out, "<style>").ok();
    writeln!(
        out,
        ".graph-path {{ fill: none; stroke-width: 1.5; vector-effect: non-scaling-stroke; }}"
    )
    .ok();
    writeln!(
        out,
        ".generic-frame {{ fill: none; stroke: {}; stroke-width: 1; vector-effect: non-scaling-stroke; }}",
        theme.frame
    )
    .ok();
    writeln!(
        out,
        ".grid-lines {{ fill: none; stroke: {}; stroke-width: 0.5; stroke-dasharray: 2 2; vector-effect: non-scaling-stroke; }}",
        theme.grid
    )
    .ok();
    writeln!(
        out,
        ".grid-label-x, .grid-label-y, .current-value, .no-data {{ font: 11px sans-serif; fill: {}; }}",
        theme.frame
    )
    .ok();
    for kind in MetricKind::ALL {
        if config.visibility.is_visible(kind) {
            writeln!(
                out,
                ".graph-path-{} {{ stroke: {}; }}",
                kind.name(),
                kind.color(config.prefers_dark)
            )
            .ok();
        }
    }
    writeln!(out, "</style>").ok();
}

fn write_grid_path(
    out: &mut String,
    vertical: &[GridLine],
    horizontal: &[GridLine],
    transform: &ChartTransform,
) {
    if vertical.is_empty() && horizontal.is_empty() {
        return;
    }
    let mut d = String::new();
    for line in vertical {
        write!(d, "M {x},0 L {x},{h} ", x = line.position, h = transform.amount_range).ok();
    }
    for line in horizontal {
        write!(d, "M 0,{y} L {w},{y} ", y = line.position, w = transform.time_range).ok();
    }
    writeln!(out, r#"<path class="grid-lines" d="{}"/>"#, d.trim_end()).ok();
}

fn write_series_path(out: &mut String, snapshot: &SeriesSnapshot, transform: &ChartTransform) {
    let mut d = String::with_capacity(snapshot.points.len() * 12);
    for (i, point) in snapshot.points.iter().enumerate() {
        let kb = i64::try_from(point.kb).unwrap_or(i64::MAX);
        let command = if i == 0 { 'M' } else { 'L' };
        if i > 0 {
            d.push(' ');
        }
        write!(
            d,
            "{} {},{}",
            command,
            transform.local_x(point.moment),
            transform.local_y(kb)
        )
        .ok();
    }
    writeln!(
        out,
        r#"<path class="graph-path graph-path-{}" d="{}"/>"#,
        snapshot.kind.name(),
        d
    )
    .ok();
}

fn write_axis_labels(
    out: &mut String,
    config: &ChartConfig,
    transform: &ChartTransform,
    vertical: &[GridLine],
    horizontal: &[GridLine],
) {
    let label_y = config.container_height - config.bottom_label_space;
    for line in vertical {
        writeln!(
            out,
            r#"<text class="grid-label-x" x="{}" y="{}" text-anchor="middle" dominant-baseline="hanging">{}</text>"#,
            px(transform.to_x(line.position as f64)),
            px(label_y),
            line.label
        )
        .ok();
    }
    for line in horizontal {
        writeln!(
            out,
            r#"<text class="grid-label-y" x="{}" y="{}" dominant-baseline="middle">{}</text>"#,
            px(config.padding_x()),
            px(transform.to_y(line.position as f64)),
            line.label
        )
        .ok();
    }
}

fn write_current_values(
    out: &mut String,
    config: &ChartConfig,
    transform: &ChartTransform,
    visible: &[&SeriesSnapshot],
) {
    let column_x = transform.right() + config.right_current_value_padding;
    writeln!(
        out,
        r#"<rect class="generic-frame" x="{}" y="{}" width="{}" height="{}"/>"#,
        px(column_x),
        px(transform.translate_y),
        px(config.right_current_value_width),
        px(transform.graph_area_height)
    )
    .ok();

    for (row, snapshot) in visible.iter().enumerate() {
        let Some(last) = snapshot.last() else {
            continue;
        };
        let row_y = transform.translate_y + CURRENT_VALUE_ROW_HEIGHT * (row as f64 + 1.0);
        writeln!(
            out,
            "<g><title>{}</title>",
            snapshot.kind.display_name()
        )
        .ok();
        writeln!(
            out,
            r#"<rect x="{}" y="{}" width="{s}" height="{s}" fill="{}"/>"#,
            px(column_x + 6.0),
            px(row_y - CURRENT_VALUE_SWATCH / 2.0),
            snapshot.kind.color(config.prefers_dark),
            s = px(CURRENT_VALUE_SWATCH)
        )
        .ok();
        writeln!(
            out,
            r#"<text class="current-value" x="{}" y="{}" dominant-baseline="middle">{} {}</text>"#,
            px(column_x + 10.0 + CURRENT_VALUE_SWATCH),
            px(row_y),
            snapshot.kind.name(),
            format_kb_label(last.kb as f64, config.label_precision)
        )
        .ok();
        out.push_str("</g>\n");
    }
}

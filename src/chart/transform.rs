//! Mapping from data space (moments, kilobytes) to pixels.

use crate::chart::config::ChartConfig;
use crate::store::{Moment, ProcessExtrema};

/// Affine transform of one render pass.
///
/// Data coordinates are first made local to the data rectangle: x is the
/// offset from `min_moment`, y is `amount_range - kb` so that larger amounts
/// end up higher on screen. The local rectangle is then scaled and translated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub min_moment: Moment,
    pub max_moment: Moment,
    /// Width of the data rectangle in tenths of a second.
    pub time_range: i64,
    /// Height of the data rectangle in kilobytes.
    pub amount_range: i64,
    pub graph_area_width: f64,
    pub graph_area_height: f64,
}

impl ChartTransform {
    /// Builds the transform for `extrema`. A process without data maps onto
    /// an empty window starting at moment 0.
    pub fn compute(config: &ChartConfig, extrema: &ProcessExtrema) -> Self {
        let (min_moment, max_moment, max_kb) = if extrema.has_data() {
            (extrema.min_moment, extrema.max_moment, extrema.max_kb)
        } else {
            (0, 0, 0)
        };

        let time_range = max_moment
            .saturating_sub(min_moment)
            .max(config.min_time_range)
            .max(1);
        let amount_range = max_kb.max(1);

        let graph_area_width = config.graph_area_width();
        let graph_area_height = config.graph_area_height();

        Self {
            translate_x: config.padding_x() + config.left_label_space,
            translate_y: config.padding_y(),
            scale_x: graph_area_width / time_range as f64,
            scale_y: graph_area_height / amount_range as f64,
            min_moment,
            max_moment,
            time_range,
            amount_range,
            graph_area_width,
            graph_area_height,
        }
    }

    /// Local x of a moment inside the data rectangle.
    pub fn local_x(&self, moment: Moment) -> i64 {
        moment.saturating_sub(self.min_moment)
    }

    /// Local y of an amount inside the data rectangle (inverted).
    pub fn local_y(&self, kb: i64) -> i64 {
        self.amount_range.saturating_sub(kb)
    }

    /// Pixel x for a local data x.
    pub fn to_x(&self, local_x: f64) -> f64 {
        self.translate_x + local_x * self.scale_x
    }

    /// Pixel y for a local data y.
    pub fn to_y(&self, local_y: f64) -> f64 {
        self.translate_y + local_y * self.scale_y
    }

    pub fn to_pixel(&self, moment: Moment, kb: i64) -> (f64, f64) {
        (
            self.to_x(self.local_x(moment) as f64),
            self.to_y(self.local_y(kb) as f64),
        )
    }

    /// Pixel x of the right edge of the graph area.
    pub fn right(&self) -> f64 {
        self.translate_x + self.graph_area_width
    }

    /// Pixel y of the bottom edge of the graph area.
    pub fn bottom(&self) -> f64 {
        self.translate_y + self.graph_area_height
    }
}

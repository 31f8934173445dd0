//! Chart geometry and theme, resolved once at construction.

use crate::error::ChartError;
use crate::metric::MetricVisibility;
use crate::store::Moment;

pub const DEFAULT_CONTAINER_WIDTH: f64 = 800.0;
pub const DEFAULT_CONTAINER_HEIGHT: f64 = 400.0;
pub const DEFAULT_PADDING_PERCENT: f64 = 0.02;
pub const DEFAULT_BOTTOM_LABEL_SPACE: f64 = 20.0;
pub const DEFAULT_LEFT_LABEL_SPACE: f64 = 60.0;
pub const DEFAULT_RIGHT_CURRENT_VALUE_WIDTH: f64 = 120.0;
pub const DEFAULT_RIGHT_CURRENT_VALUE_PADDING: f64 = 10.0;
/// Two minutes in tenths of a second.
pub const DEFAULT_MIN_TIME_RANGE: Moment = 1_200;
pub const DEFAULT_LABEL_PRECISION: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub container_width: f64,
    pub container_height: f64,
    /// Fraction of each dimension reserved as outer margin.
    pub padding_percent: f64,
    pub bottom_label_space: f64,
    pub left_label_space: f64,
    /// Width of the current-value column; 0 disables the column.
    pub right_current_value_width: f64,
    pub right_current_value_padding: f64,
    /// Floor on the time axis span, in tenths of a second.
    pub min_time_range: Moment,
    pub prefers_dark: bool,
    pub label_precision: usize,
    pub visibility: MetricVisibility,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            container_width: DEFAULT_CONTAINER_WIDTH,
            container_height: DEFAULT_CONTAINER_HEIGHT,
            padding_percent: DEFAULT_PADDING_PERCENT,
            bottom_label_space: DEFAULT_BOTTOM_LABEL_SPACE,
            left_label_space: DEFAULT_LEFT_LABEL_SPACE,
            right_current_value_width: DEFAULT_RIGHT_CURRENT_VALUE_WIDTH,
            right_current_value_padding: DEFAULT_RIGHT_CURRENT_VALUE_PADDING,
            min_time_range: DEFAULT_MIN_TIME_RANGE,
            prefers_dark: false,
            label_precision: DEFAULT_LABEL_PRECISION,
            visibility: MetricVisibility::default(),
        }
    }
}

impl ChartConfig {
    pub fn with_size(width: f64, height: f64) -> Self {
        Self {
            container_width: width,
            container_height: height,
            ..Self::default()
        }
    }

    pub fn padding_x(&self) -> f64 {
        self.container_width * self.padding_percent
    }

    pub fn padding_y(&self) -> f64 {
        self.container_height * self.padding_percent
    }

    pub fn has_current_value_column(&self) -> bool {
        self.right_current_value_width > 0.0
    }

    /// Horizontal space taken by the current-value column and its gap.
    pub fn right_column_width(&self) -> f64 {
        if self.has_current_value_column() {
            self.right_current_value_width + self.right_current_value_padding
        } else {
            0.0
        }
    }

    pub fn graph_area_width(&self) -> f64 {
        self.container_width
            - 2.0 * self.padding_x()
            - self.left_label_space
            - self.right_column_width()
    }

    pub fn graph_area_height(&self) -> f64 {
        self.container_height - 2.0 * self.padding_y() - self.bottom_label_space
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        let (width, height) = (self.container_width, self.container_height);
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(ChartError::InvalidContainer { width, height });
        }
        if !(self.padding_percent.is_finite() && (0.0..0.5).contains(&self.padding_percent)) {
            return Err(ChartError::InvalidPadding(self.padding_percent));
        }
        for (name, value) in [
            ("bottom_label_space", self.bottom_label_space),
            ("left_label_space", self.left_label_space),
            ("right_current_value_width", self.right_current_value_width),
            ("right_current_value_padding", self.right_current_value_padding),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ChartError::InvalidSpace { name, value });
            }
        }
        if self.min_time_range <= 0 {
            return Err(ChartError::InvalidMinTimeRange(self.min_time_range));
        }

        let (area_w, area_h) = (self.graph_area_width(), self.graph_area_height());
        if area_w <= 0.0 || area_h <= 0.0 {
            return Err(ChartError::EmptyGraphArea {
                width: area_w,
                height: area_h,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ChartConfig::default().validate().is_ok());
    }

    #[test]
    fn graph_area_subtracts_margins_and_columns() {
        let config = ChartConfig {
            container_width: 1000.0,
            container_height: 500.0,
            padding_percent: 0.1,
            bottom_label_space: 20.0,
            left_label_space: 50.0,
            right_current_value_width: 100.0,
            right_current_value_padding: 10.0,
            ..ChartConfig::default()
        };
        assert_eq!(config.graph_area_width(), 1000.0 - 200.0 - 50.0 - 110.0);
        assert_eq!(config.graph_area_height(), 500.0 - 100.0 - 20.0);
    }

    #[test]
    fn zero_width_column_takes_no_space() {
        let config = ChartConfig {
            right_current_value_width: 0.0,
            right_current_value_padding: 10.0,
            ..ChartConfig::default()
        };
        assert_eq!(config.right_column_width(), 0.0);
    }

    #[test]
    fn rejects_collapsed_geometry() {
        let tiny = ChartConfig::with_size(100.0, 30.0);
        assert!(matches!(tiny.validate(), Err(ChartError::EmptyGraphArea { .. })));

        let bad_padding = ChartConfig {
            padding_percent: 0.6,
            ..ChartConfig::default()
        };
        assert_eq!(bad_padding.validate(), Err(ChartError::InvalidPadding(0.6)));

        let bad_range = ChartConfig {
            min_time_range: 0,
            ..ChartConfig::default()
        };
        assert_eq!(bad_range.validate(), Err(ChartError::InvalidMinTimeRange(0)));
    }
}

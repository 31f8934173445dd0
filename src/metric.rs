//! Memory-accounting categories tracked per process.
//!
//! `MetricKind` is a closed set: codes and names outside it are rejected with
//! [`UnknownMetricKind`] at the boundary and never reach the store.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownMetricKind;

/// Operating systems a metric can be collected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    Windows,
}

/// Memory metric kinds, ordered by their wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    Rss,
    Pss,
    Uss,
    Ws,
    Pb,
    HeapUsed,
    HeapCommitted,
    NmtUsed,
    NmtCommitted,
}

/// Stroke colors for one metric in both themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricColors {
    pub light: &'static str,
    pub dark: &'static str,
}

static BY_NAME: Lazy<HashMap<&'static str, MetricKind>> = Lazy::new(|| {
    MetricKind::ALL
        .iter()
        .map(|kind| (kind.name(), *kind))
        .collect()
});

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::Rss,
        MetricKind::Pss,
        MetricKind::Uss,
        MetricKind::Ws,
        MetricKind::Pb,
        MetricKind::HeapUsed,
        MetricKind::HeapCommitted,
        MetricKind::NmtUsed,
        MetricKind::NmtCommitted,
    ];

    /// Stable wire code (0..=8).
    pub fn code(self) -> u8 {
        match self {
            MetricKind::Rss => 0,
            MetricKind::Pss => 1,
            MetricKind::Uss => 2,
            MetricKind::Ws => 3,
            MetricKind::Pb => 4,
            MetricKind::HeapUsed => 5,
            MetricKind::HeapCommitted => 6,
            MetricKind::NmtUsed => 7,
            MetricKind::NmtCommitted => 8,
        }
    }

    /// Short upper-case name, also used as CSS class suffix.
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Rss => "RSS",
            MetricKind::Pss => "PSS",
            MetricKind::Uss => "USS",
            MetricKind::Ws => "WS",
            MetricKind::Pb => "PB",
            MetricKind::HeapUsed => "HEAP_USED",
            MetricKind::HeapCommitted => "HEAP_COMMITTED",
            MetricKind::NmtUsed => "NMT_USED",
            MetricKind::NmtCommitted => "NMT_COMMITTED",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MetricKind::Rss => "Resident Set Size",
            MetricKind::Pss => "Proportional Set Size",
            MetricKind::Uss => "Unique Set Size",
            MetricKind::Ws => "Working Set",
            MetricKind::Pb => "Private Bytes",
            MetricKind::HeapUsed => "Heap Used",
            MetricKind::HeapCommitted => "Heap Committed",
            MetricKind::NmtUsed => "Native Memory Used",
            MetricKind::NmtCommitted => "Native Memory Committed",
        }
    }

    pub fn colors(self) -> MetricColors {
        let (light, dark) = match self {
            MetricKind::Rss => ("red", "rgb(255, 70, 70)"),
            MetricKind::Pss => ("green", "rgb(0, 155, 70)"),
            MetricKind::Uss => ("blue", "rgb(70, 70, 255)"),
            MetricKind::Ws => ("red", "rgb(255, 70, 70)"),
            MetricKind::Pb => ("blue", "rgb(70, 70, 255)"),
            MetricKind::HeapUsed => ("magenta", "magenta"),
            MetricKind::HeapCommitted => ("cyan", "cyan"),
            MetricKind::NmtUsed => ("rgb(128, 0, 255)", "rgb(128, 0, 255)"),
            MetricKind::NmtCommitted => ("rgb(32, 42, 69)", "rgb(0, 155, 255)"),
        };
        MetricColors { light, dark }
    }

    /// Color for the requested theme.
    pub fn color(self, prefers_dark: bool) -> &'static str {
        let colors = self.colors();
        if prefers_dark {
            colors.dark
        } else {
            colors.light
        }
    }

    pub fn is_applicable(self, os: Os) -> bool {
        match self {
            MetricKind::Rss | MetricKind::Pss | MetricKind::Uss => os == Os::Linux,
            MetricKind::Ws | MetricKind::Pb => os == Os::Windows,
            _ => true,
        }
    }

    pub fn visible_by_default(self) -> bool {
        !matches!(self, MetricKind::Uss | MetricKind::Pb)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for MetricKind {
    type Error = UnknownMetricKind;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        MetricKind::ALL
            .iter()
            .copied()
            .find(|kind| i64::from(kind.code()) == code)
            .ok_or(UnknownMetricKind::Code(code))
    }
}

impl FromStr for MetricKind {
    type Err = UnknownMetricKind;

    /// Accepts the short name in any case, with `-` or `_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        BY_NAME
            .get(normalized.as_str())
            .copied()
            .ok_or_else(|| UnknownMetricKind::Name(s.to_string()))
    }
}

/// Set of metric kinds hidden from the chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricVisibility {
    hidden: BTreeSet<MetricKind>,
}

impl Default for MetricVisibility {
    fn default() -> Self {
        Self {
            hidden: MetricKind::ALL
                .iter()
                .copied()
                .filter(|kind| !kind.visible_by_default())
                .collect(),
        }
    }
}

impl MetricVisibility {
    /// Every metric visible.
    pub fn all_visible() -> Self {
        Self {
            hidden: BTreeSet::new(),
        }
    }

    pub fn with_hidden<I: IntoIterator<Item = MetricKind>>(hidden: I) -> Self {
        Self {
            hidden: hidden.into_iter().collect(),
        }
    }

    pub fn is_visible(&self, kind: MetricKind) -> bool {
        !self.hidden.contains(&kind)
    }

    pub fn set_visible(&mut self, kind: MetricKind) {
        self.hidden.remove(&kind);
    }

    pub fn set_invisible(&mut self, kind: MetricKind) {
        self.hidden.insert(kind);
    }

    pub fn hidden(&self) -> impl Iterator<Item = MetricKind> + '_ {
        self.hidden.iter().copied()
    }
}

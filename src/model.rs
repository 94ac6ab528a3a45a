use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One price bar. `time` is unix seconds.
///
/// Bar slices handed to the engine must be strictly ascending by `time`;
/// nothing in the engine sorts them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    /// `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Rule deciding where an anchor period starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorType {
    Session,
    Week,
    Month,
    /// Regular trading hours; like `Session` with the anchor pinned to 09:30.
    Rth,
}

impl AnchorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Week => "week",
            Self::Month => "month",
            Self::Rth => "rth",
        }
    }
}

impl fmt::Display for AnchorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Anchor settings as they arrive from the settings surface, before they are
/// resolved against a timezone and ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSettings {
    pub anchor_type: AnchorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_time: Option<String>,
    #[serde(default)]
    pub band_multipliers: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub time: i64,
    pub value: Option<f64>,
}

impl IndicatorPoint {
    pub fn new(time: i64, value: f64) -> Self {
        Self {
            time,
            value: Some(value),
        }
    }
}

/// Series keyed by band key (see [`band_key`]).
pub type BandSeries = BTreeMap<String, Vec<IndicatorPoint>>;

/// Stable map key for a band multiplier: one decimal place with the point
/// replaced by an underscore, so `2.0` becomes `"2_0"`.
pub fn band_key(multiplier: f64) -> String {
    format!("{multiplier:.1}").replace('.', "_")
}

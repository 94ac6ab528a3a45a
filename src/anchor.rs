pub mod calendar;
pub mod detector;
pub mod ticker;

use std::collections::HashSet;

use chrono::{NaiveTime, Timelike};
use chrono_tz::Tz;
use error_stack::{Report, bail};

use crate::error::ComputeError;
use crate::model::{AnchorSettings, AnchorType, band_key};

pub use detector::AnchorDetector;

/// Regular trading hours always anchor at 09:30 local time.
pub const RTH_ANCHOR_MINUTES: u32 = 9 * 60 + 30;

/// Anchor settings resolved against a timezone and ticker, ready for the
/// detector.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorConfig {
    pub anchor_type: AnchorType,
    /// Minutes after local midnight at which a session starts.
    pub anchor_minutes: u32,
    pub timezone: Tz,
    /// Positive, unique by band key, in caller order.
    pub band_multipliers: Vec<f64>,
}

impl AnchorConfig {
    /// Resolve wire settings.
    ///
    /// `rth` ignores any configured anchor time. A missing anchor time falls
    /// back to the ticker default (09:30 for equities, 18:00 for futures).
    pub fn resolve(
        settings: &AnchorSettings,
        timezone: &str,
        ticker: &str,
    ) -> Result<Self, Report<ComputeError>> {
        let timezone = parse_timezone(timezone)?;

        let anchor_minutes = match (settings.anchor_type, settings.anchor_time.as_deref()) {
            (AnchorType::Rth, _) => RTH_ANCHOR_MINUTES,
            (_, Some(value)) => parse_anchor_time(value)?,
            (_, None) => ticker::default_anchor_minutes(ticker),
        };

        let band_multipliers = normalize_multipliers(&settings.band_multipliers)?;

        Ok(Self {
            anchor_type: settings.anchor_type,
            anchor_minutes,
            timezone,
            band_multipliers,
        })
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, Report<ComputeError>> {
    name.parse::<Tz>().map_err(|_| {
        Report::new(ComputeError::InvalidTimezone {
            timezone: name.to_owned(),
        })
    })
}

/// Parse `"HH:MM"` into minutes after midnight.
pub fn parse_anchor_time(value: &str) -> Result<u32, Report<ComputeError>> {
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        Report::new(ComputeError::InvalidAnchorTime {
            value: value.to_owned(),
        })
    })?;
    Ok(time.hour() * 60 + time.minute())
}

fn normalize_multipliers(multipliers: &[f64]) -> Result<Vec<f64>, Report<ComputeError>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(multipliers.len());
    for &m in multipliers {
        if !m.is_finite() || m <= 0.0 {
            bail!(ComputeError::InvalidMultiplier { value: m });
        }
        if seen.insert(band_key(m)) {
            out.push(m);
        }
    }
    Ok(out)
}

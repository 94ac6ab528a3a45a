pub mod accumulator;
pub mod period;
pub mod vwap;
pub mod window;

use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::model::{AnchorSettings, Bar};

/// Bars the window selector may walk back looking for a period start.
pub const DEFAULT_LOOKBACK_CAP: usize = 2000;

/// An anchored indicator computation that runs inside an execution host.
///
/// `compute` runs to completion on the host thread; it never yields.
pub trait ComputeKernel: Clone + Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Short name used in logs and host thread names (e.g. "vwap").
    fn name(&self) -> &str;

    fn compute(&self, input: Self::Input) -> Result<Self::Output, Report<ComputeError>>;
}

/// Request input shared by the anchored kernels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeInput {
    pub data: Vec<Bar>,
    pub settings: AnchorSettings,
    pub ticker: String,
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_start: Option<i64>,
}

/// Reject bars the accumulators cannot use. `offset` is the slice's
/// position in the full series, for error reporting.
pub(crate) fn validate_bars(bars: &[Bar], offset: usize) -> Result<(), Report<ComputeError>> {
    for (i, bar) in bars.iter().enumerate() {
        let index = offset + i;
        if ![bar.high, bar.low, bar.close].iter().all(|p| p.is_finite()) {
            bail!(ComputeError::InvalidBar {
                index,
                reason: "non-finite price".into(),
            });
        }
        if !bar.volume.is_finite() || bar.volume < 0.0 {
            bail!(ComputeError::InvalidBar {
                index,
                reason: format!("invalid volume {}", bar.volume),
            });
        }
        if i > 0 && bar.time <= bars[i - 1].time {
            bail!(ComputeError::InvalidBar {
                index,
                reason: "time is not strictly increasing".into(),
            });
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::bar;
    use super::*;

    #[test]
    fn valid_bars_pass() {
        let bars = vec![bar(0, 2.0, 1.0, 1.5, 10.0), bar(60, 2.0, 1.0, 1.5, 0.0)];
        assert!(validate_bars(&bars, 0).is_ok());
    }

    #[test]
    fn nan_price_rejected_with_absolute_index() {
        let bars = vec![bar(0, 2.0, 1.0, 1.5, 10.0), bar(60, f64::NAN, 1.0, 1.5, 1.0)];
        let err = validate_bars(&bars, 100).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ComputeError::InvalidBar { index: 101, .. }
        ));
    }

    #[test]
    fn negative_volume_rejected() {
        let bars = vec![bar(0, 2.0, 1.0, 1.5, -1.0)];
        assert!(validate_bars(&bars, 0).is_err());
    }

    #[test]
    fn non_increasing_time_rejected() {
        let bars = vec![bar(60, 2.0, 1.0, 1.5, 1.0), bar(60, 2.0, 1.0, 1.5, 1.0)];
        assert!(validate_bars(&bars, 0).is_err());
    }

    #[test]
    fn input_wire_format() {
        let input: ComputeInput = serde_json::from_str(
            r#"{
                "data": [{"time": 0, "high": 10, "low": 8, "close": 9, "volume": 100}],
                "settings": {"anchorType": "session", "bandMultipliers": [2.0]},
                "ticker": "SPY",
                "timezone": "America/New_York",
                "visibleStart": 0
            }"#,
        )
        .unwrap();
        assert_eq!(input.data.len(), 1);
        assert_eq!(input.visible_start, Some(0));
    }
}

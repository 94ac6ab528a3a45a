use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::anchor::{AnchorConfig, AnchorDetector};
use crate::error::ComputeError;
use crate::indicator::window::select_start_index;
use crate::indicator::{ComputeInput, ComputeKernel, DEFAULT_LOOKBACK_CAP, validate_bars};
use crate::model::{Bar, IndicatorPoint};

/// Running high, low, and midpoint of each anchor period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRangeOutput {
    pub high_series: Vec<IndicatorPoint>,
    pub low_series: Vec<IndicatorPoint>,
    pub mid_series: Vec<IndicatorPoint>,
}

#[derive(Debug, Clone, Copy)]
struct RangeState {
    high: f64,
    low: f64,
}

impl RangeState {
    fn start(bar: &Bar) -> Self {
        Self {
            high: bar.high,
            low: bar.low,
        }
    }

    fn extend(&mut self, bar: &Bar) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
    }
}

/// Period aggregation kernel. Shares anchor detection and window selection
/// with [`VwapKernel`](crate::indicator::vwap::VwapKernel).
#[derive(Debug, Clone)]
pub struct PeriodRangeKernel {
    lookback_cap: usize,
}

impl PeriodRangeKernel {
    pub fn new(lookback_cap: usize) -> Self {
        Self { lookback_cap }
    }

    pub fn calculate(
        &self,
        bars: &[Bar],
        config: &AnchorConfig,
        visible_start: Option<i64>,
    ) -> Result<PeriodRangeOutput, Report<ComputeError>> {
        let detector = AnchorDetector::new(config);
        let start = select_start_index(bars, visible_start, &detector, self.lookback_cap);
        let slice = &bars[start..];
        validate_bars(slice, start)?;

        let mut output = PeriodRangeOutput {
            high_series: Vec::with_capacity(slice.len()),
            low_series: Vec::with_capacity(slice.len()),
            mid_series: Vec::with_capacity(slice.len()),
        };

        let mut state: Option<RangeState> = None;
        for (i, bar) in slice.iter().enumerate() {
            let reset = i == 0 || detector.is_new_period(slice[i - 1].time, bar.time);
            let range = match state {
                Some(mut s) if !reset => {
                    s.extend(bar);
                    s
                }
                _ => RangeState::start(bar),
            };
            state = Some(range);

            output
                .high_series
                .push(IndicatorPoint::new(bar.time, range.high));
            output
                .low_series
                .push(IndicatorPoint::new(bar.time, range.low));
            output
                .mid_series
                .push(IndicatorPoint::new(bar.time, (range.high + range.low) / 2.0));
        }

        tracing::debug!(
            bars = bars.len(),
            start,
            processed = slice.len(),
            anchor = %config.anchor_type,
            "period range computed"
        );

        Ok(output)
    }
}

impl Default for PeriodRangeKernel {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK_CAP)
    }
}

impl ComputeKernel for PeriodRangeKernel {
    type Input = ComputeInput;
    type Output = PeriodRangeOutput;

    fn name(&self) -> &str {
        "period-range"
    }

    fn compute(&self, input: ComputeInput) -> Result<PeriodRangeOutput, Report<ComputeError>> {
        let config = AnchorConfig::resolve(&input.settings, &input.timezone, &input.ticker)?;
        self.calculate(&input.data, &config, input.visible_start)
    }
}

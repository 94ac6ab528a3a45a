use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::anchor::{AnchorConfig, AnchorDetector};
use crate::error::ComputeError;
use crate::indicator::accumulator::VwapAccumulator;
use crate::indicator::window::select_start_index;
use crate::indicator::{ComputeInput, ComputeKernel, DEFAULT_LOOKBACK_CAP, validate_bars};
use crate::model::{Bar, BandSeries, IndicatorPoint, band_key};

/// Anchored VWAP series plus upper/lower dispersion bands per multiplier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VwapOutput {
    /// One point per processed bar; `value` is `None` while the period has
    /// seen no volume.
    pub vwap_series: Vec<IndicatorPoint>,
    pub upper_bands: BandSeries,
    pub lower_bands: BandSeries,
}

#[derive(Debug, Clone)]
pub struct VwapKernel {
    lookback_cap: usize,
}

impl VwapKernel {
    pub fn new(lookback_cap: usize) -> Self {
        Self { lookback_cap }
    }

    /// Full recomputation over `bars[start..]`, where `start` comes from the
    /// window selector. Output is aligned to that slice.
    pub fn calculate(
        &self,
        bars: &[Bar],
        config: &AnchorConfig,
        visible_start: Option<i64>,
    ) -> Result<VwapOutput, Report<ComputeError>> {
        let detector = AnchorDetector::new(config);
        let start = select_start_index(bars, visible_start, &detector, self.lookback_cap);
        let slice = &bars[start..];
        validate_bars(slice, start)?;

        let keys: Vec<(f64, String)> = config
            .band_multipliers
            .iter()
            .map(|&m| (m, band_key(m)))
            .collect();

        let mut output = VwapOutput {
            vwap_series: Vec::with_capacity(slice.len()),
            ..VwapOutput::default()
        };
        for (_, key) in &keys {
            output.upper_bands.insert(key.clone(), Vec::new());
            output.lower_bands.insert(key.clone(), Vec::new());
        }

        let mut acc = VwapAccumulator::new();
        for (i, bar) in slice.iter().enumerate() {
            if i == 0 || detector.is_new_period(slice[i - 1].time, bar.time) {
                acc.reset();
            }

            let Some(stats) = acc.push(bar) else {
                output.vwap_series.push(IndicatorPoint {
                    time: bar.time,
                    value: None,
                });
                continue;
            };

            output
                .vwap_series
                .push(IndicatorPoint::new(bar.time, stats.vwap));
            for (m, key) in &keys {
                if let Some(series) = output.upper_bands.get_mut(key) {
                    series.push(IndicatorPoint::new(bar.time, stats.upper(*m)));
                }
                if let Some(series) = output.lower_bands.get_mut(key) {
                    series.push(IndicatorPoint::new(bar.time, stats.lower(*m)));
                }
            }
        }

        tracing::debug!(
            bars = bars.len(),
            start,
            processed = slice.len(),
            anchor = %config.anchor_type,
            "vwap computed"
        );

        Ok(output)
    }
}

impl Default for VwapKernel {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK_CAP)
    }
}

impl ComputeKernel for VwapKernel {
    type Input = ComputeInput;
    type Output = VwapOutput;

    fn name(&self) -> &str {
        "vwap"
    }

    fn compute(&self, input: ComputeInput) -> Result<VwapOutput, Report<ComputeError>> {
        let config = AnchorConfig::resolve(&input.settings, &input.timezone, &input.ticker)?;
        self.calculate(&input.data, &config, input.visible_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::RTH_ANCHOR_MINUTES;
    use crate::indicator::test_support::{bar, flat_bars};
    use crate::model::{AnchorSettings, AnchorType};
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn config(anchor_type: AnchorType, multipliers: &[f64]) -> AnchorConfig {
        AnchorConfig {
            anchor_type,
            anchor_minutes: RTH_ANCHOR_MINUTES,
            timezone: New_York,
            band_multipliers: multipliers.to_vec(),
        }
    }

    fn ny(d: u32, h: u32, mi: u32) -> i64 {
        New_York
            .with_ymd_and_hms(2024, 3, d, h, mi, 0)
            .unwrap()
            .timestamp()
    }

    #[test]
    fn two_bar_end_to_end() {
        let bars = vec![
            bar(0, 10.0, 8.0, 9.0, 100.0),
            bar(60, 11.0, 9.0, 10.0, 100.0),
        ];
        let out = VwapKernel::default()
            .calculate(&bars, &config(AnchorType::Month, &[1.0]), None)
            .unwrap();

        assert_eq!(out.vwap_series[0], IndicatorPoint::new(0, 9.0));
        assert_eq!(out.vwap_series[1], IndicatorPoint::new(60, 9.5));

        let upper = &out.upper_bands["1_0"];
        let lower = &out.lower_bands["1_0"];
        assert_eq!(upper.len(), 2);
        // First bar of a period has zero spread
        assert_eq!(upper[0].value, Some(9.0));
        assert_eq!(lower[0].value, Some(9.0));
        assert!((upper[1].value.unwrap() - 10.0).abs() < 1e-12);
        assert!((lower[1].value.unwrap() - 9.0).abs() < 1e-12);
    }

    #[test]
    fn zero_volume_yields_no_values() {
        let bars = flat_bars(0, 60, 20, 5.0, 0.0);
        let out = VwapKernel::default()
            .calculate(&bars, &config(AnchorType::Week, &[1.0, 2.0]), None)
            .unwrap();
        assert_eq!(out.vwap_series.len(), 20);
        assert!(out.vwap_series.iter().all(|p| p.value.is_none()));
        assert!(out.upper_bands["2_0"].is_empty());
        assert!(out.lower_bands["1_0"].is_empty());
    }

    #[test]
    fn week_window_over_extreme_timestamps() {
        let bars = vec![
            bar(i64::MIN, 10.0, 10.0, 10.0, 1.0),
            bar(i64::MAX, 10.0, 10.0, 10.0, 1.0),
        ];
        let out = VwapKernel::default()
            .calculate(&bars, &config(AnchorType::Week, &[]), Some(i64::MAX))
            .unwrap();
        assert_eq!(out.vwap_series, vec![IndicatorPoint::new(i64::MAX, 10.0)]);
    }

    #[test]
    fn resets_at_session_open() {
        let bars = vec![
            bar(ny(12, 10, 0), 10.0, 10.0, 10.0, 100.0),
            bar(ny(12, 15, 0), 20.0, 20.0, 20.0, 100.0),
            bar(ny(13, 9, 30), 30.0, 30.0, 30.0, 50.0),
            bar(ny(13, 10, 0), 40.0, 40.0, 40.0, 50.0),
        ];
        let out = VwapKernel::default()
            .calculate(&bars, &config(AnchorType::Session, &[2.0]), None)
            .unwrap();
        let values: Vec<f64> = out.vwap_series.iter().map(|p| p.value.unwrap()).collect();
        assert_eq!(values, vec![10.0, 15.0, 30.0, 35.0]);
        // New period starts with zero-width bands
        assert_eq!(out.upper_bands["2_0"][2].value, Some(30.0));
    }

    #[test]
    fn visible_window_trims_to_period_start() {
        // Three sessions of hourly-ish bars
        let mut bars = Vec::new();
        for day in 11..=13 {
            for (h, m) in [(9, 30), (11, 0), (13, 0), (15, 0)] {
                let p = day as f64;
                bars.push(bar(ny(day, h, m), p, p, p, 10.0));
            }
        }
        let visible = ny(13, 13, 0);
        let out = VwapKernel::default()
            .calculate(&bars, &config(AnchorType::Rth, &[]), Some(visible))
            .unwrap();
        // Starts at the 13th's open, not at the visible bar or history start
        assert_eq!(out.vwap_series.len(), 4);
        assert_eq!(out.vwap_series[0].time, ny(13, 9, 30));
        assert!(out.vwap_series.iter().all(|p| p.value == Some(13.0)));
    }

    #[test]
    fn windowed_values_match_full_history() {
        let mut bars = Vec::new();
        for day in 11..=14 {
            for (i, (h, m)) in [(9, 30), (10, 30), (12, 0), (14, 0), (15, 30)]
                .into_iter()
                .enumerate()
            {
                let p = 100.0 + day as f64 + i as f64 * 0.25;
                bars.push(bar(ny(day, h, m), p + 1.0, p - 1.0, p, 10.0 + i as f64));
            }
        }
        let kernel = VwapKernel::default();
        let cfg = config(AnchorType::Session, &[1.0]);
        let full = kernel.calculate(&bars, &cfg, None).unwrap();
        let windowed = kernel.calculate(&bars, &cfg, Some(ny(13, 12, 0))).unwrap();

        let offset = full.vwap_series.len() - windowed.vwap_series.len();
        assert_eq!(offset, 10);
        assert_eq!(&full.vwap_series[offset..], &windowed.vwap_series[..]);
    }

    #[test]
    fn idempotent() {
        let bars: Vec<Bar> = (0..500)
            .map(|i| {
                let p = 50.0 + (i as f64 * 0.37).sin() * 3.0;
                bar(i * 300, p + 0.5, p - 0.5, p, 1.0 + (i % 7) as f64)
            })
            .collect();
        let kernel = VwapKernel::default();
        let cfg = config(AnchorType::Session, &[1.0, 2.0, 3.0]);
        let a = kernel.calculate(&bars, &cfg, Some(bars[400].time)).unwrap();
        let b = kernel.calculate(&bars, &cfg, Some(bars[400].time)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn compute_resolves_wire_input() {
        let input = ComputeInput {
            data: vec![
                bar(0, 10.0, 8.0, 9.0, 100.0),
                bar(60, 11.0, 9.0, 10.0, 100.0),
            ],
            settings: AnchorSettings {
                anchor_type: AnchorType::Session,
                anchor_time: None,
                band_multipliers: vec![2.0],
            },
            ticker: "SPY".into(),
            timezone: "America/New_York".into(),
            visible_start: None,
        };
        let out = VwapKernel::default().compute(input).unwrap();
        assert_eq!(out.vwap_series.len(), 2);
        assert!(out.upper_bands.contains_key("2_0"));
        assert!((out.upper_bands["2_0"][1].value.unwrap() - 10.5).abs() < 1e-12);
    }

    #[test]
    fn compute_reports_bad_timezone() {
        let input = ComputeInput {
            data: vec![],
            settings: AnchorSettings {
                anchor_type: AnchorType::Session,
                anchor_time: None,
                band_multipliers: vec![],
            },
            ticker: "SPY".into(),
            timezone: "Not/AZone".into(),
            visible_start: None,
        };
        let err = VwapKernel::default().compute(input).unwrap_err();
        assert_eq!(err.current_context().to_string(), "unknown timezone: Not/AZone");
    }

    #[test]
    fn empty_input_is_empty_output() {
        let out = VwapKernel::default()
            .calculate(&[], &config(AnchorType::Session, &[1.0]), Some(0))
            .unwrap();
        assert!(out.vwap_series.is_empty());
        assert!(out.upper_bands["1_0"].is_empty());
    }

    #[test]
    fn serializes_to_camel_case_payload() {
        let bars = vec![bar(0, 1.0, 1.0, 1.0, 0.0)];
        let out = VwapKernel::default()
            .calculate(&bars, &config(AnchorType::Week, &[2.0]), None)
            .unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("vwapSeries").is_some());
        assert!(json["upperBands"].get("2_0").is_some());
        assert!(json["vwapSeries"][0]["value"].is_null());
    }
}

use crate::anchor::AnchorDetector;
use crate::model::Bar;

/// Pick the index to start recomputing from so the visible window is
/// covered by correctly reset accumulators.
///
/// Binary-searches for the first bar at or after `visible_start`, then walks
/// back until the detector reports a period start or `lookback_cap` bars
/// have been examined. Without a hint the whole history is processed.
/// Cost is bounded by `lookback_cap` regardless of history length.
pub fn select_start_index(
    bars: &[Bar],
    visible_start: Option<i64>,
    detector: &AnchorDetector,
    lookback_cap: usize,
) -> usize {
    let Some(visible_start) = visible_start else {
        return 0;
    };
    if bars.is_empty() {
        return 0;
    }

    // A hint past the last bar still anchors the final period.
    let visible_index = bars
        .partition_point(|b| b.time < visible_start)
        .min(bars.len() - 1);
    let floor = visible_index.saturating_sub(lookback_cap);

    let mut i = visible_index;
    while i > floor {
        if detector.is_new_period(bars[i - 1].time, bars[i].time) {
            return i;
        }
        i -= 1;
    }
    floor
}

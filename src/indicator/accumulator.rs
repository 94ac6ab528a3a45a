use crate::model::Bar;

/// Running volume-weighted sums since the last anchor reset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VwapAccumulator {
    sum_price_volume: f64,
    sum_volume: f64,
    sum_volume_price_sq: f64,
}

/// VWAP and volume-weighted standard deviation at one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VwapStats {
    pub vwap: f64,
    pub stdev: f64,
}

impl VwapStats {
    pub fn upper(&self, multiplier: f64) -> f64 {
        self.vwap + self.stdev * multiplier
    }

    pub fn lower(&self, multiplier: f64) -> f64 {
        self.vwap - self.stdev * multiplier
    }
}

impl VwapAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold one bar into the sums and return the stats including it.
    pub fn push(&mut self, bar: &Bar) -> Option<VwapStats> {
        let tp = bar.typical_price();
        let v = bar.volume;
        self.sum_price_volume += tp * v;
        self.sum_volume += v;
        self.sum_volume_price_sq += v * tp * tp;
        self.stats()
    }

    /// `None` until some volume has been seen in the current period.
    pub fn stats(&self) -> Option<VwapStats> {
        if self.sum_volume <= 0.0 {
            return None;
        }
        let vwap = self.sum_price_volume / self.sum_volume;
        // Clamp: cancellation can push a zero variance slightly negative.
        let variance = (self.sum_volume_price_sq / self.sum_volume - vwap * vwap).max(0.0);
        Some(VwapStats {
            vwap,
            stdev: variance.sqrt(),
        })
    }
}

use crate::tick::NetworkTick;

// Fractions are fixed point with 4 fractional bits
const FRACTION_ONE: i64 = 16;

/// Builds the predicted baseline from three acknowledged baselines by linear
/// extrapolation, assuming every field keeps moving by its last first
/// difference.
///
/// Sender and receiver build the predictor from the same four ticks, so they
/// always predict the same values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GhostDeltaPredictor {
    predict_frac: i64,
    apply_frac: i64,
}

impl GhostDeltaPredictor {
    /// `tick` is the snapshot being written, `baseline0` the newest baseline
    pub fn new(
        tick: NetworkTick,
        baseline0: NetworkTick,
        baseline1: NetworkTick,
        baseline2: NetworkTick,
    ) -> Self {
        let newest_gap = i64::from(baseline0.ticks_since(baseline1));
        let oldest_gap = i64::from(baseline1.ticks_since(baseline2));
        let target_gap = i64::from(tick.ticks_since(baseline0));

        if newest_gap <= 0 || oldest_gap <= 0 || target_gap <= 0 {
            // baselines out of order, prediction disabled
            return Self {
                predict_frac: i64::MAX,
                apply_frac: i64::MAX,
            };
        }

        Self {
            predict_frac: FRACTION_ONE * newest_gap / oldest_gap,
            apply_frac: FRACTION_ONE * target_gap / newest_gap,
        }
    }

    fn is_enabled(&self) -> bool {
        self.predict_frac <= FRACTION_ONE && self.apply_frac <= FRACTION_ONE
    }

    /// Predict the value at the target tick. Falls back to `baseline0` when the
    /// two differences point in opposite directions or the baselines are
    /// spaced too unevenly to extrapolate.
    pub fn predict_int(&self, baseline0: i32, baseline1: i32, baseline2: i32) -> i32 {
        if !self.is_enabled() {
            return baseline0;
        }
        let delta = i64::from(baseline0) - i64::from(baseline1);
        let previous_delta = i64::from(baseline1) - i64::from(baseline2);
        if delta == 0 || delta.signum() != previous_delta.signum() {
            return baseline0;
        }
        (i64::from(baseline0) + delta * self.apply_frac / FRACTION_ONE) as i32
    }
}

//! Stage bookkeeping: percent-range remapping and the per-stage outcome
//! type that makes the orchestrator's failure policy explicit.

use crate::error::ScrivenError;

/// The slice of the overall 0-100 scale one stage owns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentRange {
    pub start: f64,
    pub end: f64,
}

impl PercentRange {
    pub fn new(start: f64, end: f64) -> Self {
        debug_assert!(start <= end);
        PercentRange { start, end }
    }

    /// Map a stage-local percent (0..=100) into this range by linear
    /// interpolation. Out-of-range input is clamped, not rejected.
    pub fn remap(&self, sub_percent: f64) -> f64 {
        let fraction = (sub_percent / 100.0).clamp(0.0, 1.0);
        self.start + fraction * (self.end - self.start)
    }
}

/// How one stage ended. Recognition failures are fatal to the request;
/// alignment failures degrade to segment-level output and the pipeline
/// continues. The transition table lives in the orchestrator, not in
/// scattered error handling.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Ok(T),
    /// The stage failed but the pipeline continues without its output.
    Recoverable(ScrivenError),
    /// The stage failed and the request must error out.
    Fatal(ScrivenError),
}

impl<T> StageOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, StageOutcome::Ok(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_endpoints() {
        let range = PercentRange::new(58.0, 88.0);
        assert_eq!(range.remap(0.0), 58.0);
        assert_eq!(range.remap(100.0), 88.0);
        assert_eq!(range.remap(50.0), 73.0);
    }

    #[test]
    fn remap_clamps_out_of_range_input() {
        let range = PercentRange::new(58.0, 88.0);
        assert_eq!(range.remap(-10.0), 58.0);
        assert_eq!(range.remap(250.0), 88.0);
    }

    #[test]
    fn remap_is_monotone() {
        let range = PercentRange::new(10.0, 38.0);
        let mut last = f64::MIN;
        for step in 0..=100 {
            let percent = range.remap(step as f64);
            assert!(percent >= last);
            last = percent;
        }
    }

    #[test]
    fn outcome_is_ok() {
        assert!(StageOutcome::Ok(1).is_ok());
        assert!(!StageOutcome::<i32>::Recoverable(ScrivenError::Other("x".into())).is_ok());
        assert!(!StageOutcome::<i32>::Fatal(ScrivenError::Other("x".into())).is_ok());
    }
}

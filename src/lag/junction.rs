//! Junction policies: the single decision point for section growth.

use super::Section;
use super::run::Run;

/// Decides whether a candidate run may extend an existing section.
///
/// Only called when the run is the unique continuation of the section's last
/// run (and vice versa); topology is the builder's concern, consistency the
/// policy's.
pub trait JunctionPolicy: Send + Sync {
    fn consistent_run(&self, run: &Run, section: &Section) -> bool;
}

/// Accepts a run iff its length differs from the section's last run by at
/// most `max_delta_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JunctionDeltaPolicy {
    pub max_delta_length: usize,
}

impl JunctionDeltaPolicy {
    pub fn new(max_delta_length: usize) -> Self {
        Self { max_delta_length }
    }
}

impl JunctionPolicy for JunctionDeltaPolicy {
    fn consistent_run(&self, run: &Run, section: &Section) -> bool {
        run.length().abs_diff(section.last_run().length()) <= self.max_delta_length
    }
}

/// Accepts a run iff its length stays within `[mean / max_ratio, mean * max_ratio]`
/// where `mean` is the section's mean run length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionRatioPolicy {
    pub max_ratio: f64,
}

impl JunctionRatioPolicy {
    pub fn new(max_ratio: f64) -> Self {
        Self {
            max_ratio: max_ratio.max(1.0),
        }
    }
}

impl JunctionPolicy for JunctionRatioPolicy {
    fn consistent_run(&self, run: &Run, section: &Section) -> bool {
        let mean = section.mean_run_length();
        if mean <= 0.0 {
            return false;
        }
        let ratio = run.length() as f64 / mean;
        ratio <= self.max_ratio && ratio >= 1.0 / self.max_ratio
    }
}

/// Accepts every run: sections then follow pure 1-to-1 topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JunctionAllPolicy;

impl JunctionPolicy for JunctionAllPolicy {
    fn consistent_run(&self, _run: &Run, _section: &Section) -> bool {
        true
    }
}

impl<P: JunctionPolicy + ?Sized> JunctionPolicy for &P {
    fn consistent_run(&self, run: &Run, section: &Section) -> bool {
        (**self).consistent_run(run, section)
    }
}

impl<P: JunctionPolicy + ?Sized> JunctionPolicy for Box<P> {
    fn consistent_run(&self, run: &Run, section: &Section) -> bool {
        (**self).consistent_run(run, section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lag::{Lag, Orientation};

    fn section_with_last_length(length: usize) -> Lag {
        let mut lag = Lag::new("test", Orientation::Horizontal);
        lag.create_section(Run::new(0, length, 0));
        lag
    }

    #[test]
    fn delta_policy_boundary() {
        let lag = section_with_last_length(10);
        let section = &lag.sections()[0];
        let policy = JunctionDeltaPolicy::new(2);
        assert!(policy.consistent_run(&Run::new(0, 12, 1), section));
        assert!(policy.consistent_run(&Run::new(0, 8, 1), section));
        assert!(!policy.consistent_run(&Run::new(0, 13, 1), section));
        assert!(!policy.consistent_run(&Run::new(0, 7, 1), section));
    }

    #[test]
    fn identical_runs_pass_any_threshold() {
        let lag = section_with_last_length(6);
        let section = &lag.sections()[0];
        for delta in [0, 1, 5, 100] {
            assert!(JunctionDeltaPolicy::new(delta).consistent_run(&Run::new(3, 6, 1), section));
        }
    }

    #[test]
    fn ratio_policy_uses_mean_length() {
        let lag = section_with_last_length(10);
        let section = &lag.sections()[0];
        let policy = JunctionRatioPolicy::new(1.5);
        assert!(policy.consistent_run(&Run::new(0, 15, 1), section));
        assert!(!policy.consistent_run(&Run::new(0, 16, 1), section));
        assert!(policy.consistent_run(&Run::new(0, 7, 1), section));
        assert!(!policy.consistent_run(&Run::new(0, 6, 1), section));
    }

    #[test]
    fn boxed_policy_delegates() {
        let lag = section_with_last_length(4);
        let policy: Box<dyn JunctionPolicy> = Box::new(JunctionAllPolicy);
        assert!(policy.consistent_run(&Run::new(0, 40, 1), &lag.sections()[0]));
    }
}

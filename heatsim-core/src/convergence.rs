use serde::{Deserialize, Serialize};

/// Which side of `epsilon` counts as settled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergenceRule {
    /// `|delta| >= epsilon` keeps the plate running.
    #[default]
    Inclusive,
    /// Only `|delta| > epsilon` keeps the plate running.
    Strict,
}

impl ConvergenceRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvergenceRule::Inclusive => "inclusive",
            ConvergenceRule::Strict => "strict",
        }
    }

    #[inline]
    pub fn is_change(&self, delta: f64, epsilon: f64) -> bool {
        match self {
            ConvergenceRule::Inclusive => delta >= epsilon,
            ConvergenceRule::Strict => delta > epsilon,
        }
    }
}

/// One worker's verdict for one iteration.
#[derive(Clone, Copy, Debug)]
pub struct LocalConvergence {
    rule: ConvergenceRule,
    epsilon: f64,
    changed: bool,
}

impl LocalConvergence {
    #[inline]
    pub fn observe(&mut self, old: f64, new: f64) {
        if !self.changed && self.rule.is_change((new - old).abs(), self.epsilon) {
            self.changed = true;
        }
    }

    /// A worker with nothing to compute is trivially settled.
    pub fn is_settled(&self) -> bool {
        !self.changed
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ConvergenceTracker {
    rule: ConvergenceRule,
    epsilon: f64,
}

impl ConvergenceTracker {
    pub fn new(epsilon: f64, rule: ConvergenceRule) -> ConvergenceTracker {
        ConvergenceTracker { rule, epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn rule(&self) -> ConvergenceRule {
        self.rule
    }

    pub fn local(&self) -> LocalConvergence {
        LocalConvergence {
            rule: self.rule,
            epsilon: self.epsilon,
            changed: false,
        }
    }

    /// Converged only when every worker reports settled.
    pub fn combine<I>(reports: I) -> bool
    where
        I: IntoIterator<Item = bool>,
    {
        reports.into_iter().all(|settled| settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_rule_counts_delta_equal_to_epsilon() {
        let tracker = ConvergenceTracker::new(0.5, ConvergenceRule::Inclusive);
        let mut local = tracker.local();
        local.observe(1.0, 1.5);
        assert!(!local.is_settled());
    }

    #[test]
    fn strict_rule_settles_on_equal_delta() {
        let tracker = ConvergenceTracker::new(0.5, ConvergenceRule::Strict);
        let mut local = tracker.local();
        local.observe(1.0, 1.5);
        assert!(local.is_settled());
        local.observe(1.0, 0.25);
        assert!(!local.is_settled());
    }

    #[test]
    fn negative_deltas_use_magnitude() {
        let tracker = ConvergenceTracker::new(0.1, ConvergenceRule::Inclusive);
        let mut local = tracker.local();
        local.observe(5.0, 4.0);
        assert!(!local.is_settled());
    }

    #[test]
    fn fresh_local_is_settled() {
        let tracker = ConvergenceTracker::new(1e-3, ConvergenceRule::default());
        assert!(tracker.local().is_settled());
    }

    #[test]
    fn combine_is_and_over_reports() {
        assert!(ConvergenceTracker::combine([true, true, true]));
        assert!(!ConvergenceTracker::combine([true, false, true]));
        assert!(ConvergenceTracker::combine(std::iter::empty()));
    }
}

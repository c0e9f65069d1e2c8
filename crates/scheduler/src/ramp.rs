// Rust guideline compliant 2026-10-18

//! Step-based state machine behind the progressive load profile.

/// Outcome of one ramp step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampStep {
    /// `added` workers must be started; the offered rate is now `rate`.
    Grow {
        /// Workers to add.
        added: usize,
        /// Offered rate after the step.
        rate: usize,
    },
    /// The next step would exceed the target. Sticky.
    Complete,
}

/// Offered-rate state of a progressive run.
///
/// Invariants: the rate never decreases and never exceeds `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ramp {
    rate: usize,
    step: usize,
    target: usize,
    complete: bool,
}

impl Ramp {
    /// Start at `start`, or at `step` when `start` is zero.
    ///
    /// Callers validate that the starting rate is within `[1, target]` and
    /// that `step >= 1`.
    #[must_use]
    pub fn new(start: usize, step: usize, target: usize) -> Self {
        let rate = if start == 0 { step } else { start };
        Self {
            rate,
            step,
            target,
            complete: false,
        }
    }

    /// Current offered rate.
    #[must_use]
    pub fn rate(&self) -> usize {
        self.rate
    }

    /// `true` once [`advance`](Self::advance) has returned [`RampStep::Complete`].
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Take one step.
    pub fn advance(&mut self) -> RampStep {
        if self.complete {
            return RampStep::Complete;
        }
        match self.rate.checked_add(self.step) {
            Some(next) if next <= self.target => {
                self.rate = next;
                RampStep::Grow {
                    added: self.step,
                    rate: next,
                }
            }
            _ => {
                self.complete = true;
                RampStep::Complete
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Ramp, RampStep};

    #[test]
    fn one_two_three_then_complete() {
        let mut ramp = Ramp::new(1, 1, 3);
        assert_eq!(ramp.rate(), 1);
        assert_eq!(ramp.advance(), RampStep::Grow { added: 1, rate: 2 });
        assert_eq!(ramp.advance(), RampStep::Grow { added: 1, rate: 3 });
        assert_eq!(ramp.advance(), RampStep::Complete);
        assert!(ramp.is_complete());
        assert_eq!(ramp.rate(), 3);
    }

    #[test]
    fn zero_start_means_first_step() {
        let ramp = Ramp::new(0, 5, 50);
        assert_eq!(ramp.rate(), 5);
    }

    #[test]
    fn stops_below_target_when_step_does_not_divide() {
        let mut ramp = Ramp::new(2, 4, 12);
        assert_eq!(ramp.advance(), RampStep::Grow { added: 4, rate: 6 });
        assert_eq!(ramp.advance(), RampStep::Grow { added: 4, rate: 10 });
        assert_eq!(ramp.advance(), RampStep::Complete);
        assert_eq!(ramp.rate(), 10);
    }

    #[test]
    fn complete_is_sticky() {
        let mut ramp = Ramp::new(3, 1, 3);
        assert_eq!(ramp.advance(), RampStep::Complete);
        assert_eq!(ramp.advance(), RampStep::Complete);
        assert_eq!(ramp.rate(), 3);
    }

    #[test]
    fn rates_are_monotonic_and_bounded() {
        let mut ramp = Ramp::new(0, 7, 100);
        let mut last = ramp.rate();
        while let RampStep::Grow { added, rate } = ramp.advance() {
            assert_eq!(added, 7);
            assert_eq!(rate, last + 7);
            assert!(rate <= 100);
            last = rate;
        }
        assert_eq!(last, 98);
    }
}

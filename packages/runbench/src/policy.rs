use std::fmt::{self, Display};
use std::num::NonZero;

use new_zealand::nz;

use crate::Statistics;

pub(crate) const FIXED_REPETITIONS: NonZero<u32> = nz!(10);
pub(crate) const FIXED_MIN_SAMPLES: usize = 100;
pub(crate) const FIXED_MAX_CI_RELATIVE_WIDTH: f64 = 0.005;

pub(crate) const ADAPTIVE_INITIAL_REPETITIONS: NonZero<u32> = nz!(20);
pub(crate) const ADAPTIVE_GROWTH_FACTOR: f64 = 1.2;
pub(crate) const ADAPTIVE_MAX_REPETITIONS: NonZero<u32> = nz!(100);
pub(crate) const ADAPTIVE_MAX_CV: f64 = 0.01;
pub(crate) const ADAPTIVE_MAX_CI_RELATIVE_WIDTH: f64 = 0.01;

/// The rule that decides when a benchmark has collected enough samples, together with the
/// schedule of repetition counts requested from the benchmark executable on each attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum StoppingRule {
    /// Every attempt requests the same number of repetitions. Sampling stops once enough
    /// samples exist and the confidence interval of the mean is narrow enough.
    FixedRepetitions {
        /// Repetitions requested on every attempt.
        repetitions: NonZero<u32>,

        /// Minimum number of iteration samples before the interval is considered.
        min_samples: usize,

        /// Largest acceptable confidence interval width, relative to the mean.
        max_ci_relative_width: f64,
    },

    /// The repetition count grows geometrically from attempt to attempt, up to a cap.
    /// Sampling stops once either the coefficient of variation or the relative
    /// confidence interval width is small enough.
    AdaptiveRepetitions {
        /// Repetitions requested on the first attempt.
        initial_repetitions: NonZero<u32>,

        /// Multiplier applied to the repetition count after each attempt (rounded).
        growth_factor: f64,

        /// Upper bound for the repetition count.
        max_repetitions: NonZero<u32>,

        /// Coefficient of variation at or below which sampling stops.
        max_cv: f64,

        /// Relative confidence interval width at or below which sampling stops.
        max_ci_relative_width: f64,
    },
}

impl StoppingRule {
    /// Fixed schedule of 10 repetitions per attempt, stopping at 100+ samples with a
    /// relative interval width of at most 0.5%.
    #[must_use]
    pub const fn fixed() -> Self {
        Self::FixedRepetitions {
            repetitions: FIXED_REPETITIONS,
            min_samples: FIXED_MIN_SAMPLES,
            max_ci_relative_width: FIXED_MAX_CI_RELATIVE_WIDTH,
        }
    }

    /// Adaptive schedule starting at 20 repetitions, growing by 20% per attempt up to 100,
    /// stopping once either the coefficient of variation or the relative interval width
    /// drops to 1%.
    #[must_use]
    pub const fn adaptive() -> Self {
        Self::AdaptiveRepetitions {
            initial_repetitions: ADAPTIVE_INITIAL_REPETITIONS,
            growth_factor: ADAPTIVE_GROWTH_FACTOR,
            max_repetitions: ADAPTIVE_MAX_REPETITIONS,
            max_cv: ADAPTIVE_MAX_CV,
            max_ci_relative_width: ADAPTIVE_MAX_CI_RELATIVE_WIDTH,
        }
    }

    fn initial_repetitions(&self) -> NonZero<u32> {
        match *self {
            Self::FixedRepetitions { repetitions, .. } => repetitions,
            Self::AdaptiveRepetitions {
                initial_repetitions,
                max_repetitions,
                ..
            } => initial_repetitions.min(max_repetitions),
        }
    }

    fn next_repetitions(&self, previous: NonZero<u32>) -> NonZero<u32> {
        match *self {
            Self::FixedRepetitions { repetitions, .. } => repetitions,
            Self::AdaptiveRepetitions {
                growth_factor,
                max_repetitions,
                ..
            } => grow(previous, growth_factor, max_repetitions),
        }
    }

    fn is_satisfied(&self, statistics: &Statistics) -> bool {
        match *self {
            Self::FixedRepetitions {
                min_samples,
                max_ci_relative_width,
                ..
            } => {
                statistics.sample_count() >= min_samples
                    && statistics.ci_relative_width() <= max_ci_relative_width
            }
            Self::AdaptiveRepetitions {
                max_cv,
                max_ci_relative_width,
                ..
            } => statistics.cv() <= max_cv || statistics.ci_relative_width() <= max_ci_relative_width,
        }
    }
}

impl Display for StoppingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedRepetitions { .. } => write!(f, "fixed"),
            Self::AdaptiveRepetitions { .. } => write!(f, "adaptive"),
        }
    }
}

fn grow(previous: NonZero<u32>, growth_factor: f64, max: NonZero<u32>) -> NonZero<u32> {
    let grown = (f64::from(previous.get()) * growth_factor).round();

    // Also catches NaN from a nonsensical growth factor.
    if !(grown < f64::from(max.get())) {
        return max;
    }

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is clamped to [1, max) which fits in u32"
    )]
    let grown = grown.max(1.0) as u32;

    NonZero::new(grown).unwrap_or(max)
}

/// Outcome of consulting the policy after an attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Decision {
    /// More samples are needed.
    Continue,

    /// The samples are stable; sampling is complete.
    Converged,

    /// Sampling has not converged but the configured attempt limit has been used up.
    AttemptLimitReached,
}

/// Result of one policy evaluation: the statistics it was based on, the decision and the
/// repetition count to request on the next attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergenceVerdict {
    statistics: Option<Statistics>,
    decision: Decision,
    next_repetitions: NonZero<u32>,
}

impl ConvergenceVerdict {
    /// Statistics the decision was based on, or `None` if they were undefined.
    #[must_use]
    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }

    /// What the driver should do next.
    #[must_use]
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Repetition count to request if sampling continues.
    #[must_use]
    pub fn next_repetitions(&self) -> NonZero<u32> {
        self.next_repetitions
    }
}

/// Decides after each attempt whether a benchmark has converged.
///
/// There is no attempt limit by default: a benchmark whose interval never narrows enough is
/// sampled forever. [`with_max_attempts()`][Self::with_max_attempts] adds an upper bound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergencePolicy {
    rule: StoppingRule,
    max_attempts: Option<NonZero<u32>>,
}

impl ConvergencePolicy {
    /// Creates an unbounded policy using the given stopping rule.
    #[must_use]
    pub const fn new(rule: StoppingRule) -> Self {
        Self {
            rule,
            max_attempts: None,
        }
    }

    /// Ends sampling without convergence after this many attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: NonZero<u32>) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// The stopping rule in effect.
    #[must_use]
    pub fn rule(&self) -> &StoppingRule {
        &self.rule
    }

    /// The attempt limit, if any.
    #[must_use]
    pub fn max_attempts(&self) -> Option<NonZero<u32>> {
        self.max_attempts
    }

    /// Repetition count to request on the first attempt.
    #[must_use]
    pub fn initial_repetitions(&self) -> NonZero<u32> {
        self.rule.initial_repetitions()
    }

    /// Evaluates the state of a benchmark after attempt `attempt_index` (zero-based), which
    /// requested `repetitions` repetitions and brought the total to `sample_count` samples.
    ///
    /// `statistics` is `None` when statistics are undefined for the samples so far (too few
    /// samples or a zero mean). That is never treated as convergence: sampling continues.
    #[must_use]
    pub fn decide(
        &self,
        statistics: Option<&Statistics>,
        sample_count: usize,
        attempt_index: u32,
        repetitions: NonZero<u32>,
    ) -> ConvergenceVerdict {
        let converged = sample_count >= 2
            && statistics.is_some_and(|statistics| self.rule.is_satisfied(statistics));

        let attempts_made = attempt_index.saturating_add(1);

        let decision = if converged {
            Decision::Converged
        } else if self
            .max_attempts
            .is_some_and(|max_attempts| attempts_made >= max_attempts.get())
        {
            Decision::AttemptLimitReached
        } else {
            Decision::Continue
        };

        ConvergenceVerdict {
            statistics: statistics.copied(),
            decision,
            next_repetitions: self.rule.next_repetitions(repetitions),
        }
    }
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self::new(StoppingRule::fixed())
    }
}

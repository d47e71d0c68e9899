use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

/// Confidence level of the interval reported by [`Statistics::ci_relative_width()`].
pub const CONFIDENCE_LEVEL: f64 = 0.95;

/// Summary statistics over every iteration sample collected so far for one benchmark.
///
/// Always computed over the full sample history, never incrementally, so two identical
/// sequences yield the same statistics up to floating point tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Statistics {
    sample_count: usize,
    mean: f64,
    median: f64,
    stdev: f64,
    ci_lower: f64,
    ci_upper: f64,
}

impl Statistics {
    /// Number of samples the statistics were computed from.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Arithmetic mean of the samples.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Median of the samples (mean of the two middle values for even counts).
    #[must_use]
    pub fn median(&self) -> f64 {
        self.median
    }

    /// Sample standard deviation, using `n - 1` as the denominator.
    #[must_use]
    pub fn stdev(&self) -> f64 {
        self.stdev
    }

    /// Coefficient of variation: standard deviation relative to the mean.
    #[must_use]
    pub fn cv(&self) -> f64 {
        self.stdev / self.mean.abs()
    }

    /// Bounds of the [`CONFIDENCE_LEVEL`] confidence interval for the mean.
    #[must_use]
    pub fn confidence_interval(&self) -> (f64, f64) {
        (self.ci_lower, self.ci_upper)
    }

    /// Width of the confidence interval for the mean, relative to the mean.
    #[must_use]
    pub fn ci_relative_width(&self) -> f64 {
        (self.ci_upper - self.ci_lower) / self.mean.abs()
    }
}

/// Statistics are undefined for the given samples.
///
/// The convergence policy treats these as "keep sampling"; they never abort a benchmark.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatisticsError {
    /// At least two samples are required for a sample standard deviation.
    #[error("at least 2 samples are required for statistics, got {count}")]
    InsufficientSamples {
        /// How many samples were provided.
        count: usize,
    },

    /// The mean is zero, so relative measures (cv, interval width) are undefined.
    #[error("mean of the samples is zero, relative statistics are undefined")]
    DegenerateMean,

    /// A sample was NaN or infinite.
    #[error("sample {index} is not a finite number")]
    NonFiniteSample {
        /// Position of the offending sample in the input.
        index: usize,
    },

    /// The t-distribution could not be constructed for the given sample count.
    #[error("t-distribution with {degrees_of_freedom} degrees of freedom is undefined")]
    UndefinedDistribution {
        /// Degrees of freedom that were requested.
        degrees_of_freedom: f64,
    },
}

/// Computes summary statistics and the confidence interval of the mean over `samples`.
///
/// The interval comes from the Student t-distribution with `n - 1` degrees of freedom,
/// centered on the mean and scaled by the standard error of the mean.
pub fn compute(samples: &[f64]) -> Result<Statistics, StatisticsError> {
    let sample_count = samples.len();

    if sample_count < 2 {
        return Err(StatisticsError::InsufficientSamples {
            count: sample_count,
        });
    }

    if let Some(index) = samples.iter().position(|x| !x.is_finite()) {
        return Err(StatisticsError::NonFiniteSample { index });
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "sample counts stay many orders of magnitude below 2^52"
    )]
    let n = sample_count as f64;

    let mean = samples.iter().sum::<f64>() / n;

    if mean == 0.0 {
        return Err(StatisticsError::DegenerateMean);
    }

    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stdev = variance.sqrt();
    let standard_error = stdev / n.sqrt();

    let degrees_of_freedom = n - 1.0;
    let distribution = StudentsT::new(0.0, 1.0, degrees_of_freedom)
        .map_err(|_| StatisticsError::UndefinedDistribution { degrees_of_freedom })?;
    let critical_value = distribution.inverse_cdf(1.0 - (1.0 - CONFIDENCE_LEVEL) / 2.0);
    let half_width = critical_value * standard_error;

    Ok(Statistics {
        sample_count,
        mean,
        median: median(samples),
        stdev,
        ci_lower: mean - half_width,
        ci_upper: mean + half_width,
    })
}

fn median(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let upper_middle = sorted.len() / 2;

    match (
        sorted.get(upper_middle.wrapping_sub(1)),
        sorted.get(upper_middle),
    ) {
        (Some(lower), Some(upper)) if sorted.len() % 2 == 0 => f64::midpoint(*lower, *upper),
        (_, Some(middle)) => *middle,
        _ => f64::NAN,
    }
}

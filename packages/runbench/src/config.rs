// Convergence policy configuration, loaded from an optional TOML file and overridden from the
// command line.

use std::fmt::{self, Display};
use std::fs;
use std::num::NonZero;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::policy;
use crate::{ConvergencePolicy, StoppingRule};

/// Which stopping rule to use.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyVariant {
    /// [`StoppingRule::FixedRepetitions`].
    #[default]
    Fixed,

    /// [`StoppingRule::AdaptiveRepetitions`].
    Adaptive,
}

impl FromStr for PolicyVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(ConfigError::InvalidValue {
                key: "variant",
                reason: format!("'{other}' is neither 'fixed' nor 'adaptive'"),
            }),
        }
    }
}

impl Display for PolicyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// The configuration could not be loaded or describes an unusable policy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file '{}': {source}", .path.display())]
    Read {
        /// Path of the configuration file.
        path: PathBuf,

        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has unknown or ill-typed keys.
    #[error("invalid configuration: {source}")]
    Parse {
        /// What the parser complained about.
        #[from]
        source: toml::de::Error,
    },

    /// A key has a value no policy can work with.
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// The offending key.
        key: &'static str,

        /// What is wrong with it.
        reason: String,
    },
}

/// Settings of the `[policy]` table. Every key is optional; missing keys take the defaults of
/// [`StoppingRule::fixed()`] or [`StoppingRule::adaptive()`].
///
/// ```toml
/// [policy]
/// variant = "adaptive"
/// initial_repetitions = 20
/// growth_factor = 1.2
/// max_repetitions = 100
/// max_cv = 0.01
/// max_ci_relative_width = 0.01
/// max_attempts = 50
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    variant: Option<PolicyVariant>,

    // Fixed.
    repetitions: Option<u32>,
    min_samples: Option<usize>,

    // Adaptive.
    initial_repetitions: Option<u32>,
    growth_factor: Option<f64>,
    max_repetitions: Option<u32>,
    max_cv: Option<f64>,

    // Both.
    max_ci_relative_width: Option<f64>,
    max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    policy: PolicyConfig,
}

impl PolicyConfig {
    /// Parses the `[policy]` table out of a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(file.policy)
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&text)
    }

    /// Overrides the variant.
    #[must_use]
    pub fn with_variant(mut self, variant: PolicyVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Overrides the attempt limit.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// The variant in effect.
    #[must_use]
    pub fn variant(&self) -> PolicyVariant {
        self.variant.unwrap_or_default()
    }

    /// Validates the settings and builds the policy they describe.
    ///
    /// Keys that belong to the other variant are rejected rather than silently ignored.
    pub fn into_policy(self) -> Result<ConvergencePolicy, ConfigError> {
        let rule = match self.variant() {
            PolicyVariant::Fixed => self.fixed_rule()?,
            PolicyVariant::Adaptive => self.adaptive_rule()?,
        };

        let policy = ConvergencePolicy::new(rule);

        Ok(match self.max_attempts {
            Some(max_attempts) => policy.with_max_attempts(non_zero("max_attempts", max_attempts)?),
            None => policy,
        })
    }

    fn fixed_rule(&self) -> Result<StoppingRule, ConfigError> {
        reject_unless_absent("initial_repetitions", self.initial_repetitions.is_some(), "fixed")?;
        reject_unless_absent("growth_factor", self.growth_factor.is_some(), "fixed")?;
        reject_unless_absent("max_repetitions", self.max_repetitions.is_some(), "fixed")?;
        reject_unless_absent("max_cv", self.max_cv.is_some(), "fixed")?;

        Ok(StoppingRule::FixedRepetitions {
            repetitions: self
                .repetitions
                .map_or(Ok(policy::FIXED_REPETITIONS), |value| {
                    non_zero("repetitions", value)
                })?,
            min_samples: self.min_samples.unwrap_or(policy::FIXED_MIN_SAMPLES),
            max_ci_relative_width: threshold(
                "max_ci_relative_width",
                self.max_ci_relative_width
                    .unwrap_or(policy::FIXED_MAX_CI_RELATIVE_WIDTH),
            )?,
        })
    }

    fn adaptive_rule(&self) -> Result<StoppingRule, ConfigError> {
        reject_unless_absent("repetitions", self.repetitions.is_some(), "adaptive")?;
        reject_unless_absent("min_samples", self.min_samples.is_some(), "adaptive")?;

        let growth_factor = self
            .growth_factor
            .unwrap_or(policy::ADAPTIVE_GROWTH_FACTOR);
        if !growth_factor.is_finite() || growth_factor < 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "growth_factor",
                reason: format!("{growth_factor} is not a finite number of at least 1"),
            });
        }

        Ok(StoppingRule::AdaptiveRepetitions {
            initial_repetitions: self
                .initial_repetitions
                .map_or(Ok(policy::ADAPTIVE_INITIAL_REPETITIONS), |value| {
                    non_zero("initial_repetitions", value)
                })?,
            growth_factor,
            max_repetitions: self
                .max_repetitions
                .map_or(Ok(policy::ADAPTIVE_MAX_REPETITIONS), |value| {
                    non_zero("max_repetitions", value)
                })?,
            max_cv: threshold("max_cv", self.max_cv.unwrap_or(policy::ADAPTIVE_MAX_CV))?,
            max_ci_relative_width: threshold(
                "max_ci_relative_width",
                self.max_ci_relative_width
                    .unwrap_or(policy::ADAPTIVE_MAX_CI_RELATIVE_WIDTH),
            )?,
        })
    }
}

fn reject_unless_absent(key: &'static str, present: bool, variant: &str) -> Result<(), ConfigError> {
    if present {
        return Err(ConfigError::InvalidValue {
            key,
            reason: format!("not used by the '{variant}' policy"),
        });
    }

    Ok(())
}

fn non_zero(key: &'static str, value: u32) -> Result<NonZero<u32>, ConfigError> {
    NonZero::new(value).ok_or_else(|| ConfigError::InvalidValue {
        key,
        reason: "must be at least 1".to_string(),
    })
}

fn threshold(key: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key,
            reason: format!("{value} is not a finite non-negative number"),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ConfigError: Send, Sync, std::fmt::Debug);

    #[test]
    fn empty_configuration_is_fixed_and_unbounded() {
        let policy = PolicyConfig::from_toml("").unwrap().into_policy().unwrap();

        assert_eq!(policy, ConvergencePolicy::default());
        assert_eq!(policy.max_attempts(), None);
    }

    #[test]
    fn adaptive_tunables_override_defaults() {
        let config = PolicyConfig::from_toml(
            r#"
            [policy]
            variant = "adaptive"
            initial_repetitions = 5
            max_cv = 0.02
            max_attempts = 30
            "#,
        )
        .unwrap();

        let policy = config.into_policy().unwrap();

        assert_eq!(
            *policy.rule(),
            StoppingRule::AdaptiveRepetitions {
                initial_repetitions: nz!(5),
                growth_factor: 1.2,
                max_repetitions: nz!(100),
                max_cv: 0.02,
                max_ci_relative_width: 0.01,
            }
        );
        assert_eq!(policy.max_attempts(), Some(nz!(30)));
    }

    #[test]
    fn fixed_tunables_override_defaults() {
        let config = PolicyConfig::from_toml(
            r"
            [policy]
            repetitions = 25
            min_samples = 500
            ",
        )
        .unwrap();

        assert_eq!(
            *config.into_policy().unwrap().rule(),
            StoppingRule::FixedRepetitions {
                repetitions: nz!(25),
                min_samples: 500,
                max_ci_relative_width: 0.005,
            }
        );
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = PolicyConfig::from_toml(
            r#"
            [policy]
            variant = "fixed"
            max_attempts = 3
            "#,
        )
        .unwrap()
        .with_variant(PolicyVariant::Adaptive)
        .with_max_attempts(7);

        assert_eq!(config.variant(), PolicyVariant::Adaptive);

        let policy = config.into_policy().unwrap();
        assert_eq!(*policy.rule(), StoppingRule::adaptive());
        assert_eq!(policy.max_attempts(), Some(nz!(7)));
    }

    #[test]
    fn keys_of_other_variant_are_rejected() {
        let config = PolicyConfig::from_toml("[policy]\nmax_cv = 0.1\n").unwrap();

        assert!(matches!(
            config.into_policy(),
            Err(ConfigError::InvalidValue { key: "max_cv", .. })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            PolicyConfig::from_toml("[policy]\nrepetitons = 3\n"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            PolicyConfig::from_toml("[policies]\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn unknown_variant_is_rejected() {
        assert!(matches!(
            PolicyConfig::from_toml("[policy]\nvariant = \"random\"\n"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            "random".parse::<PolicyVariant>(),
            Err(ConfigError::InvalidValue { key: "variant", .. })
        ));
        assert_eq!("adaptive".parse::<PolicyVariant>().unwrap(), PolicyVariant::Adaptive);
    }

    #[test]
    fn unusable_values_are_rejected() {
        for (text, key) in [
            ("repetitions = 0", "repetitions"),
            ("max_attempts = 0", "max_attempts"),
            ("max_ci_relative_width = -0.1", "max_ci_relative_width"),
            ("variant = \"adaptive\"\ngrowth_factor = 0.5", "growth_factor"),
            ("variant = \"adaptive\"\nmax_cv = nan", "max_cv"),
        ] {
            let config = PolicyConfig::from_toml(&format!("[policy]\n{text}\n")).unwrap();

            match config.into_policy() {
                Err(ConfigError::InvalidValue { key: actual, .. }) => assert_eq!(actual, key),
                other => panic!("expected invalid '{key}', got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            PolicyConfig::load(&dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        fs::write(&path, "[policy]\nvariant = \"adaptive\"\n").unwrap();

        assert_eq!(
            PolicyConfig::load(&path).unwrap().variant(),
            PolicyVariant::Adaptive
        );
    }
}

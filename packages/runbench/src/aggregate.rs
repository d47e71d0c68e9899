use crate::{Sample, SampleKind};

/// Every iteration sample collected for one benchmark so far, across all attempts.
///
/// Append-only: samples are never removed or reordered.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RunningAggregate {
    samples: Vec<Sample>,
}

impl RunningAggregate {
    /// Appends the iteration samples among `samples`, in order, ignoring all other kinds.
    pub(crate) fn extend_iterations(&mut self, samples: impl IntoIterator<Item = Sample>) {
        self.samples.extend(
            samples
                .into_iter()
                .filter(|sample| sample.kind() == SampleKind::Iteration),
        );
    }

    pub(crate) fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub(crate) fn elapsed(&self) -> Vec<f64> {
        self.samples.iter().map(Sample::elapsed).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::output;

    fn samples_from(entries: serde_json::Value) -> Vec<Sample> {
        let json = json!({ "context": {}, "benchmarks": entries }).to_string();

        output::parse(&json, "Foo").unwrap().into_parts().1
    }

    #[test]
    fn keeps_only_iterations_in_order() {
        let mut aggregate = RunningAggregate::default();

        aggregate.extend_iterations(samples_from(json!([
            { "run_type": "iteration", "real_time": 3.0 },
            { "run_type": "aggregate", "real_time": 2.0 },
            { "run_type": "iteration", "real_time": 1.0 }
        ])));

        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate.elapsed(), vec![3.0, 1.0]);
    }

    #[test]
    fn grows_monotonically_across_attempts() {
        let mut aggregate = RunningAggregate::default();
        let mut previous: Vec<Sample> = Vec::new();

        for attempt in 1..=5_u32 {
            let entries: Vec<serde_json::Value> = (0..attempt)
                .map(|i| json!({ "run_type": "iteration", "real_time": f64::from(attempt * 10 + i) }))
                .collect();

            aggregate.extend_iterations(samples_from(json!(entries)));

            assert!(aggregate.len() > previous.len());
            assert_eq!(&aggregate.samples()[..previous.len()], previous.as_slice());

            previous = aggregate.samples().to_vec();
        }

        assert_eq!(aggregate.len(), 15);
    }
}

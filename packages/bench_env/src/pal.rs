// Platform abstraction layer for bench_env.
//
// Sysfs is read through an abstraction (trait) → facade (enum) → real implementation stack so
// the checks can run against a mock machine in tests.

mod abstractions;
mod facade;
mod real;

pub(crate) use abstractions::*;
pub(crate) use facade::*;
pub(crate) use real::*;

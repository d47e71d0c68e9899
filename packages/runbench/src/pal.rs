// Platform abstraction layer for runbench.
//
// Launching the benchmark executable goes through an abstraction (trait) → facade (enum) → real
// implementation stack so the sampling logic can be tested against a mock process.

mod abstractions;
mod facade;
mod real;

pub(crate) use abstractions::*;
pub(crate) use facade::*;
pub(crate) use real::*;

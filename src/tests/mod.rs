//! Scenario and property tests that drive whole kernels.

mod helpers;

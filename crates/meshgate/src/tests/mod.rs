//! Test suites for the startup supervisor.

pub(crate) mod support;

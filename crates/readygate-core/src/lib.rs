// SPDX-License-Identifier: GPL-3.0-or-later

//! Readiness gate for end-to-end test environments.
//!
//! Polls a list of named HTTP health endpoints concurrently, retrying each
//! with a fixed delay until it answers or its attempt budget runs out, and
//! folds the per-service outcomes into a single pass/fail exit code.

pub mod error;
pub mod gate;
pub mod models;
pub mod probe;

pub use error::{GateError, Result};
pub use gate::{ReadinessGate, ReadinessGateBuilder};
pub use models::{GateReport, ProbeOutcome, ServiceState, ServiceTarget, WaitResult};
pub use probe::{HttpProbe, Probe};
pub use readygate_config::ReadinessPolicy;

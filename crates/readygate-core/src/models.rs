// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::process::ExitCode;

use readygate_config::ServiceConfig;
use url::Url;

use crate::error::{GateError, Result};

/// A named health endpoint to wait on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    pub name: String,
    pub url: Url,
}

impl ServiceTarget {
    pub fn new(name: impl Into<String>, url: &str) -> Result<Self> {
        let name = name.into();
        let url = Url::parse(url).map_err(|e| GateError::InvalidTarget {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GateError::InvalidTarget {
                reason: format!("url must be http or https, got '{}'", url.scheme()),
                name,
            });
        }
        Ok(Self { name, url })
    }
}

impl TryFrom<&ServiceConfig> for ServiceTarget {
    type Error = GateError;

    fn try_from(config: &ServiceConfig) -> Result<Self> {
        Self::new(config.name.clone(), &config.url)
    }
}

impl fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

/// Result of a single probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready,
    NotReady(String),
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Pending,
    Ready,
    Exhausted,
}

/// Terminal result of one service's wait loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    pub service: String,
    pub state: ServiceState,
    pub attempts: u32,
}

impl WaitResult {
    pub fn ready(service: impl Into<String>, attempts: u32) -> Self {
        Self {
            service: service.into(),
            state: ServiceState::Ready,
            attempts,
        }
    }

    pub fn exhausted(service: impl Into<String>, attempts: u32) -> Self {
        Self {
            service: service.into(),
            state: ServiceState::Exhausted,
            attempts,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == ServiceState::Ready
    }
}

/// Per-service results in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateReport {
    pub results: Vec<WaitResult>,
}

impl GateReport {
    pub fn new(results: Vec<WaitResult>) -> Self {
        Self { results }
    }

    /// True when every service became ready. Vacuously true with no services.
    pub fn all_ready(&self) -> bool {
        self.results.iter().all(WaitResult::is_ready)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.is_ready())
            .map(|r| r.service.as_str())
            .collect()
    }

    pub fn exit_status(&self) -> u8 {
        if self.all_ready() {
            0
        } else {
            1
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

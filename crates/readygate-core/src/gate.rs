// SPDX-License-Identifier: GPL-3.0-or-later

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use readygate_config::{AppConfig, GateConfig, ReadinessPolicy};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::{GateError, Result};
use crate::models::{GateReport, ProbeOutcome, ServiceTarget, WaitResult};
use crate::probe::{HttpProbe, Probe};

/// Waits for a fixed set of services to answer their health endpoints.
#[derive(Clone)]
pub struct ReadinessGate {
    targets: Vec<ServiceTarget>,
    max_attempts: u32,
    retry_delay: Duration,
    probe: Arc<dyn Probe>,
}

impl ReadinessGate {
    pub fn builder() -> ReadinessGateBuilder {
        ReadinessGateBuilder::default()
    }

    /// Build a gate that probes every configured service over HTTP.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut builder = Self::builder().settings(&config.gate);
        for service in &config.services {
            builder = builder.service(service.name.clone(), service.url.clone());
        }
        builder.build()
    }

    pub fn targets(&self) -> &[ServiceTarget] {
        &self.targets
    }

    /// Poll one service until it is ready or its attempts run out.
    pub async fn wait_for_service(&self, target: &ServiceTarget) -> WaitResult {
        wait_until_ready(
            self.probe.as_ref(),
            target,
            self.max_attempts,
            self.retry_delay,
        )
        .await
    }

    /// Wait on every service concurrently and collect their results.
    ///
    /// Only fails when a wait task itself dies; unready services are
    /// reported through [`GateReport`].
    pub async fn check_all(&self) -> Result<GateReport> {
        info!(target: "gate", services = self.targets.len(), "starting service health checks");
        if self.targets.is_empty() {
            warn!(target: "gate", "no services to wait for");
        }

        let mut handles = self
            .targets
            .iter()
            .cloned()
            .map(|target| {
                let probe = Arc::clone(&self.probe);
                let (max_attempts, retry_delay) = (self.max_attempts, self.retry_delay);
                let service = target.name.clone();
                let handle = tokio::spawn(async move {
                    wait_until_ready(probe.as_ref(), &target, max_attempts, retry_delay).await
                });
                (service, handle)
            })
            .collect::<Vec<_>>()
            .into_iter();

        let mut results = Vec::with_capacity(self.targets.len());
        while let Some((service, handle)) = handles.next() {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    for (_, rest) in handles {
                        rest.abort();
                    }
                    return Err(GateError::Task {
                        service,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(GateReport::new(results))
    }

    /// Run the gate and translate the outcome into a process exit code.
    pub async fn run(&self) -> ExitCode {
        match self.check_all().await {
            Ok(report) => {
                if report.all_ready() {
                    info!(target: "gate", "all services are ready, starting E2E tests");
                } else {
                    error!(
                        target: "gate",
                        failed = ?report.failed(),
                        "some services failed to start, E2E tests cannot proceed"
                    );
                }
                report.exit_code()
            }
            Err(e) => {
                error!(target: "gate", error = %e, "unexpected error during service health checks");
                ExitCode::FAILURE
            }
        }
    }
}

async fn wait_until_ready(
    probe: &dyn Probe,
    target: &ServiceTarget,
    max_attempts: u32,
    retry_delay: Duration,
) -> WaitResult {
    info!(target: "gate", service = %target.name, url = %target.url, "waiting for service");

    for attempt in 1..=max_attempts {
        match probe.probe(target).await {
            ProbeOutcome::Ready => {
                info!(target: "gate", service = %target.name, attempt, "service is ready");
                return WaitResult::ready(target.name.clone(), attempt);
            }
            ProbeOutcome::NotReady(reason) => {
                warn!(
                    target: "gate",
                    service = %target.name,
                    attempt,
                    max_attempts,
                    error = %reason,
                    "service not ready"
                );

                if attempt == max_attempts {
                    error!(
                        target: "gate",
                        service = %target.name,
                        "service failed to start after {} attempts",
                        max_attempts
                    );
                    break;
                }

                info!(target: "gate", service = %target.name, "retrying in {:?}", retry_delay);
                sleep(retry_delay).await;
            }
        }
    }

    WaitResult::exhausted(target.name.clone(), max_attempts)
}

/// Builder for configuring a readiness gate.
pub struct ReadinessGateBuilder {
    services: Vec<(String, String)>,
    max_attempts: u32,
    retry_delay: Duration,
    request_timeout: Duration,
    policy: ReadinessPolicy,
    probe: Option<Arc<dyn Probe>>,
}

impl Default for ReadinessGateBuilder {
    fn default() -> Self {
        let gate = GateConfig::default();
        Self {
            services: Vec::new(),
            max_attempts: gate.max_attempts,
            retry_delay: gate.retry_delay(),
            request_timeout: gate.request_timeout(),
            policy: gate.policy,
            probe: None,
        }
    }
}

impl ReadinessGateBuilder {
    /// Take attempts, delay, timeout and policy from a config section.
    pub fn settings(mut self, gate: &GateConfig) -> Self {
        self.max_attempts = gate.max_attempts;
        self.retry_delay = gate.retry_delay();
        self.request_timeout = gate.request_timeout();
        self.policy = gate.policy;
        self
    }

    pub fn service(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.services.push((name.into(), url.into()));
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Per-request timeout for the default HTTP probe.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn policy(mut self, policy: ReadinessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the HTTP probe (useful for testing without a network).
    pub fn probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self) -> Result<ReadinessGate> {
        if self.max_attempts == 0 {
            return Err(GateError::InvalidSettings(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(GateError::InvalidSettings(
                "request_timeout must be greater than zero".to_string(),
            ));
        }

        let targets = self
            .services
            .iter()
            .map(|(name, url)| ServiceTarget::new(name.clone(), url))
            .collect::<Result<Vec<_>>>()?;

        let probe = match self.probe {
            Some(probe) => probe,
            None => Arc::new(HttpProbe::new(self.request_timeout, self.policy)?),
        };

        Ok(ReadinessGate {
            targets,
            max_attempts: self.max_attempts,
            retry_delay: self.retry_delay,
            probe,
        })
    }
}

// SPDX-License-Identifier: GPL-3.0-or-later

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use readygate_config::ReadinessPolicy;
use reqwest::{redirect, Client, StatusCode};
use tracing::{debug, trace};

use crate::error::Result;
use crate::models::{ProbeOutcome, ServiceTarget};

const USER_AGENT: &str = concat!("readygate/", env!("CARGO_PKG_VERSION"));

/// A single readiness check against a service.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &ServiceTarget) -> ProbeOutcome;
}

/// Issues a bounded-timeout GET and judges the status code.
///
/// Redirects are not followed: a 3xx is itself proof that something is
/// listening.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
    policy: ReadinessPolicy,
}

impl HttpProbe {
    pub fn new(timeout: Duration, policy: ReadinessPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            timeout,
            policy,
        })
    }

    pub fn policy(&self) -> ReadinessPolicy {
        self.policy
    }

    fn describe(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            return format!("timeout of {}ms exceeded", self.timeout.as_millis());
        }

        // reqwest's top-level message hides the cause (refused, dns, reset).
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &ServiceTarget) -> ProbeOutcome {
        trace!(target: "probe", "GET {}", target.url);

        match self.client.get(target.url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                debug!(target: "probe", service = %target.name, "response status: {}", status);
                classify(status, self.policy)
            }
            Err(err) => ProbeOutcome::NotReady(self.describe(&err)),
        }
    }
}

/// Map a response status to a probe outcome under the given policy.
pub fn classify(status: StatusCode, policy: ReadinessPolicy) -> ProbeOutcome {
    let ready = match policy {
        ReadinessPolicy::Lenient => status.as_u16() < 500,
        ReadinessPolicy::Strict => status.is_success(),
    };

    if ready {
        ProbeOutcome::Ready
    } else {
        ProbeOutcome::NotReady(format!("request failed with status code {}", status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_accepts_anything_below_500() {
        for code in [200, 204, 301, 302, 401, 404, 499] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(
                classify(status, ReadinessPolicy::Lenient).is_ready(),
                "{code} should be ready"
            );
        }
    }

    #[test]
    fn lenient_rejects_server_errors() {
        for code in [500, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(
                classify(status, ReadinessPolicy::Lenient),
                ProbeOutcome::NotReady(format!("request failed with status code {code}"))
            );
        }
    }

    #[test]
    fn strict_only_accepts_success() {
        assert!(classify(StatusCode::OK, ReadinessPolicy::Strict).is_ready());
        assert!(!classify(StatusCode::NOT_FOUND, ReadinessPolicy::Strict).is_ready());
        assert!(!classify(StatusCode::MOVED_PERMANENTLY, ReadinessPolicy::Strict).is_ready());
        assert!(!classify(StatusCode::SERVICE_UNAVAILABLE, ReadinessPolicy::Strict).is_ready());
    }

    #[test]
    fn http_probe_builds() {
        let probe = HttpProbe::new(Duration::from_secs(3), ReadinessPolicy::default()).unwrap();
        assert_eq!(probe.policy(), ReadinessPolicy::Lenient);
    }
}

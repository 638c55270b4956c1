// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

/// How a probe response status is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessPolicy {
    /// Anything below 500 means the process is up and accepting connections.
    #[default]
    Lenient,
    /// Only 2xx counts.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub policy: ReadinessPolicy,
}

impl GateConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            retry_delay_ms: 5_000,
            request_timeout_ms: 3_000,
            policy: ReadinessPolicy::Lenient,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    pub url: String,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// The stack brought up for the end-to-end suite.
pub fn default_services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig::new("API Gateway", "http://localhost:8080/actuator/health"),
        ServiceConfig::new("Service Discovery", "http://localhost:8761/actuator/health"),
        ServiceConfig::new("Config Server", "http://localhost:8888/actuator/health"),
        ServiceConfig::new("Proxy Client", "http://localhost:9191/actuator/health"),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub gate: GateConfig,
    pub telemetry: TelemetryConfig,
    pub services: Vec<ServiceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            telemetry: TelemetryConfig::default(),
            services: default_services(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.gate.max_attempts == 0 {
            bail!("gate.max_attempts must be at least 1");
        }
        if self.gate.request_timeout_ms == 0 {
            bail!("gate.request_timeout_ms must be greater than zero");
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                bail!("service with url '{}' has an empty name", service.url);
            }
            if !seen.insert(service.name.as_str()) {
                bail!("duplicate service name '{}'", service.name);
            }
            let url = match Url::parse(&service.url) {
                Ok(url) => url,
                Err(e) => bail!("service '{}' has an invalid url: {}", service.name, e),
            };
            if !matches!(url.scheme(), "http" | "https") {
                bail!(
                    "service '{}' url must be http or https, got '{}'",
                    service.name,
                    url.scheme()
                );
            }
        }

        if self.services.is_empty() {
            warn!(target: "config", "no services configured; the gate will pass immediately");
        }

        Ok(())
    }
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: READYGATE_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        if !path.exists() {
            bail!("config file {} does not exist", path.display());
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("READYGATE_").split("__"));

    let config: AppConfig = figment.extract()?;
    config.validate()?;
    info!(
        target: "config",
        services = config.services.len(),
        max_attempts = config.gate.max_attempts,
        "configuration loaded"
    );
    Ok(config)
}

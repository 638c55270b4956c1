// SPDX-License-Identifier: GPL-3.0-or-later
use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use readygate_config::{load as load_config, AppConfig};
use readygate_core::ReadinessGate;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = resolve_config_path(
        std::env::args_os().nth(1),
        std::env::var_os("READYGATE_CONFIG"),
    );
    let config = load_config(config_path.as_deref());

    let log_level = config
        .as_ref()
        .map(|c| c.telemetry.log_level.as_str())
        .unwrap_or("info");
    init_tracing(log_level);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(target: "cli", error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut signals = match ShutdownSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            error!(target: "cli", error = %e, "failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    match run(config, signals.recv()).await {
        Ok(code) => code,
        Err(e) => {
            let chain = format!("{e:#}");
            error!(target: "cli", error = %chain, "unexpected error during service health checks");
            ExitCode::FAILURE
        }
    }
}

/// Race the gate against `shutdown`; a signal abandons the in-flight waits.
async fn run(config: AppConfig, shutdown: impl Future<Output = Shutdown>) -> Result<ExitCode> {
    let gate = ReadinessGate::from_config(&config).context("failed to build readiness gate")?;

    tokio::select! {
        code = gate.run() => Ok(code),
        shutdown = shutdown => {
            warn!(target: "cli", "service health check {}", shutdown);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// First positional argument wins over `READYGATE_CONFIG`.
fn resolve_config_path(arg: Option<OsString>, env: Option<OsString>) -> Option<PathBuf> {
    arg.or(env).filter(|p| !p.is_empty()).map(PathBuf::from)
}

fn init_tracing(log_level: &str) {
    let fmt_layer = tracing_fmt::layer().with_target(true).with_level(true);

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(fmt_layer)
        .init();

    info!(target: "cli", version = env!("CARGO_PKG_VERSION"), "readygate starting");
}

fn env_filter(log_level: &str) -> EnvFilter {
    build_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(), log_level)
}

/// `RUST_LOG` directives take precedence over the configured level.
fn build_filter(directives: Option<&str>, log_level: &str) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(log_level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    Interrupt,
    Terminate,
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shutdown::Interrupt => f.write_str("interrupted"),
            Shutdown::Terminate => f.write_str("terminated"),
        }
    }
}

struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("install SIGINT handler")?,
            terminate: signal(SignalKind::terminate()).context("install SIGTERM handler")?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> Shutdown {
        tokio::select! {
            _ = self.interrupt.recv() => Shutdown::Interrupt,
            _ = self.terminate.recv() => Shutdown::Terminate,
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Shutdown {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(target: "cli", error = %e, "ctrl_c handler unavailable");
            std::future::pending::<()>().await;
        }
        Shutdown::Interrupt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readygate_config::ServiceConfig;

    #[test]
    fn test_config_path_prefers_argument() {
        let path = resolve_config_path(
            Some(OsString::from("gate.toml")),
            Some(OsString::from("env.toml")),
        );
        assert_eq!(path, Some(PathBuf::from("gate.toml")));
    }

    #[test]
    fn test_config_path_falls_back_to_env() {
        let path = resolve_config_path(None, Some(OsString::from("env.toml")));
        assert_eq!(path, Some(PathBuf::from("env.toml")));
    }

    #[test]
    fn test_config_path_ignores_empty() {
        assert_eq!(resolve_config_path(Some(OsString::new()), None), None);
        assert_eq!(resolve_config_path(None, None), None);
    }

    #[test]
    fn test_shutdown_messages() {
        assert_eq!(Shutdown::Interrupt.to_string(), "interrupted");
        assert_eq!(Shutdown::Terminate.to_string(), "terminated");
    }

    fn directives(filter: EnvFilter) -> String {
        filter.to_string()
    }

    #[test]
    fn test_filter_uses_configured_level() {
        assert_eq!(
            directives(build_filter(None, "debug")),
            directives(EnvFilter::new("debug"))
        );
    }

    #[test]
    fn test_filter_prefers_rust_log() {
        assert_eq!(
            directives(build_filter(Some("warn"), "debug")),
            directives(EnvFilter::new("warn"))
        );
    }

    #[test]
    fn test_filter_falls_back_on_bad_directives() {
        assert_eq!(
            directives(build_filter(Some("readygate=loud"), "debug")),
            directives(EnvFilter::new("debug"))
        );
        assert_eq!(
            directives(build_filter(None, "readygate=loud")),
            directives(EnvFilter::new("info"))
        );
    }

    fn unreachable_config() -> AppConfig {
        // Nothing serves HTTP on the discard port.
        AppConfig {
            services: vec![ServiceConfig::new(
                "API Gateway",
                "http://127.0.0.1:9/actuator/health",
            )],
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_run_with_no_services_succeeds() {
        let config = AppConfig {
            services: Vec::new(),
            ..AppConfig::default()
        };
        let code = run(config, std::future::pending()).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_abandons_waits_with_failure() {
        let code = run(unreachable_config(), async { Shutdown::Interrupt })
            .await
            .unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminate_abandons_waits_with_failure() {
        let code = run(unreachable_config(), async { Shutdown::Terminate })
            .await
            .unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_signal_handlers_install() {
        assert!(ShutdownSignals::install().is_ok());
    }
}

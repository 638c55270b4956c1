// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GateError>;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid service '{name}': {reason}")]
    InvalidTarget { name: String, reason: String },

    #[error("invalid gate settings: {0}")]
    InvalidSettings(String),

    #[error("wait task for '{service}' did not complete: {reason}")]
    Task { service: String, reason: String },
}

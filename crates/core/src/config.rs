//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into services as
//! `Arc<CoreConfig>`. Request handling never reads environment variables; binaries call the
//! `*_from_env_value` helpers with whatever they read and build a `CoreConfig` from the results.

use crate::constants::{DEFAULT_API_TIMEOUT_MS, EXPERTISE_DOMAINS};
use crate::error::{CaseError, CaseResult};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    expert_api_url: String,
    api_timeout: Duration,
    domains: Vec<String>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// The base URL is stored without a trailing slash so endpoint paths can be appended as-is.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::InvalidValue`] if the URL is empty or not an `http(s)` URL.
    pub fn new(
        expert_api_url: impl Into<String>,
        api_timeout: Duration,
        domains: Vec<String>,
    ) -> CaseResult<Self> {
        let url = expert_api_url.into();
        let url = url.trim().trim_end_matches('/').to_string();

        if url.is_empty() {
            return Err(CaseError::InvalidValue {
                path: "expert_api_url".into(),
                reason: "cannot be empty".into(),
            });
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CaseError::InvalidValue {
                path: "expert_api_url".into(),
                reason: format!("'{url}' is not an http(s) URL"),
            });
        }

        Ok(Self {
            expert_api_url: url,
            api_timeout,
            domains,
        })
    }

    pub fn expert_api_url(&self) -> &str {
        &self.expert_api_url
    }

    /// Timeout handed to the transport. The core itself never times out an operation.
    pub fn api_timeout(&self) -> Duration {
        self.api_timeout
    }

    /// Domain tags offered to authors, in display order.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Domain tag given to cases created from scratch.
    pub fn default_domain(&self) -> Option<&str> {
        self.domains.first().map(String::as_str)
    }
}

/// Parse the transport timeout from an optional millisecond value.
///
/// `None`, empty or whitespace values fall back to [`DEFAULT_API_TIMEOUT_MS`]. Zero is rejected
/// because it would make every call fail immediately.
pub fn api_timeout_from_env_value(value: Option<String>) -> CaseResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let millis = match value {
        None => DEFAULT_API_TIMEOUT_MS,
        Some(v) => v.parse::<u64>().map_err(|e| CaseError::InvalidValue {
            path: "api_timeout_ms".into(),
            reason: format!("'{v}': {e}"),
        })?,
    };

    if millis == 0 {
        return Err(CaseError::InvalidValue {
            path: "api_timeout_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(Duration::from_millis(millis))
}

/// Parse the domain list from an optional comma-separated value.
///
/// Blank entries are dropped. An absent or blank value yields the built-in expertise domains.
pub fn domains_from_env_value(value: Option<String>) -> Vec<String> {
    let parsed: Vec<String> = value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect();

    if parsed.is_empty() {
        EXPERTISE_DOMAINS.iter().map(|d| d.to_string()).collect()
    } else {
        parsed
    }
}

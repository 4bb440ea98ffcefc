//! # Casebook Client
//!
//! HTTP implementation of the core repository contracts against the expert agent API.
//!
//! [`ExpertApiClient`] implements [`CaseRepository`](casebook_core::CaseRepository),
//! [`SchoolCaseRepository`](casebook_core::SchoolCaseRepository) and
//! [`ReviewRepository`](casebook_core::ReviewRepository). Every failure, whether the transport,
//! a non-2xx status, an `"error"` envelope or an unexpected body, is reported as a
//! [`RepositoryError`].

mod cases;
mod envelope;
mod review;
mod school_cases;

use casebook_core::constants::endpoints;
use casebook_core::{CoreConfig, RepositoryError, RepositoryResult};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use std::sync::Arc;

pub use envelope::Envelope;

/// Client for the expert agent API.
#[derive(Clone)]
pub struct ExpertApiClient {
    cfg: Arc<CoreConfig>,
    base: Url,
    http: reqwest::Client,
}

impl ExpertApiClient {
    /// Build a client for the base URL and timeout in `cfg`.
    ///
    /// # Errors
    ///
    /// Returns a [`RepositoryError`] if the base URL does not parse as a hierarchical URL or the
    /// HTTP client cannot be constructed (TLS backend initialisation).
    pub fn new(cfg: Arc<CoreConfig>) -> RepositoryResult<Self> {
        let base = Url::parse(cfg.expert_api_url())
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                RepositoryError::transport(format!("invalid expert API URL: {}", cfg.expert_api_url()))
            })?;
        let http = reqwest::Client::builder()
            .timeout(cfg.api_timeout())
            .build()
            .map_err(|e| RepositoryError::transport(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { cfg, base, http })
    }

    pub fn base_url(&self) -> &str {
        self.cfg.expert_api_url()
    }

    /// Whether the expert agent answers its health endpoint with a 2xx status.
    pub async fn health(&self) -> RepositoryResult<bool> {
        let url = self.url(endpoints::HEALTH);
        let response = self.send(self.http.get(url.clone()), "GET", url.path()).await?;
        Ok(response.status().is_success())
    }

    /// Append `segments` to the base URL, escaping each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send `request`, mapping transport failures to [`RepositoryError`].
    async fn send(
        &self,
        request: RequestBuilder,
        method: &str,
        path: &str,
    ) -> RepositoryResult<Response> {
        request.send().await.map_err(|e| {
            let err = if e.is_timeout() {
                RepositoryError::transport(format!(
                    "request timed out after {} ms",
                    self.cfg.api_timeout().as_millis()
                ))
            } else if e.is_connect() {
                RepositoryError::transport(format!(
                    "cannot reach expert API at {}",
                    self.base_url()
                ))
            } else {
                RepositoryError::transport(e.to_string())
            };
            tracing::error!("{} {} failed: {}", method, path, err);
            err
        })
    }

    /// Read a 2xx response body as an envelope and reject `"error"` envelopes.
    async fn read_envelope(
        &self,
        response: Response,
        method: &str,
        path: &str,
    ) -> RepositoryResult<Envelope> {
        let status = response.status();
        if !status.is_success() {
            let err = http_error(status);
            tracing::error!("{} {} failed: {}", method, path, err);
            return Err(err);
        }

        let body = response
            .text()
            .await
            .map_err(|e| RepositoryError::transport(format!("cannot read response body: {e}")))?;

        Envelope::parse(&body)
            .and_then(Envelope::check)
            .map_err(|err| {
                tracing::error!("{} {} failed: {}", method, path, err);
                err
            })
    }
}

/// Uniform error for a non-2xx status.
pub(crate) fn http_error(status: StatusCode) -> RepositoryError {
    RepositoryError::http(status.as_u16(), status.canonical_reason().unwrap_or("Unknown"))
}

//! Clinical case endpoints.

use crate::ExpertApiClient;
use casebook_core::constants::endpoints;
use casebook_core::repository::{CaseChanges, CaseFilter, CaseRepository};
use casebook_core::{ClinicalCase, RepositoryError, RepositoryResult};
use reqwest::StatusCode;

impl CaseRepository for ExpertApiClient {
    async fn list(&self, filter: &CaseFilter) -> RepositoryResult<Vec<ClinicalCase>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(pathologie) = filter.pathologie.as_deref().filter(|p| !p.is_empty()) {
            query.push(("pathologie", pathologie));
        }
        if let Some(niveau) = filter.niveau {
            query.push(("niveau", niveau.as_str()));
        }

        let url = self.url(endpoints::CASES);
        let request = self.http.get(url.clone()).query(&query);
        let response = self.send(request, "GET", url.path()).await?;
        let mut envelope = self.read_envelope(response, "GET", url.path()).await?;
        let cases: Vec<ClinicalCase> = envelope.take("cases")?.unwrap_or_default();

        tracing::debug!(count = cases.len(), "listed cases");
        Ok(cases)
    }

    async fn get(&self, id: &str) -> RepositoryResult<Option<ClinicalCase>> {
        let url = self.url(&endpoints::case_by_id(id));
        let response = self.send(self.http.get(url.clone()), "GET", url.path()).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(case_id = %id, "case not found");
            return Ok(None);
        }
        let mut envelope = self.read_envelope(response, "GET", url.path()).await?;
        envelope.take("case")
    }

    async fn create(&self, case: &ClinicalCase) -> RepositoryResult<ClinicalCase> {
        let url = self.url(endpoints::CASES);
        let request = self.http.post(url.clone()).json(case);
        let response = self.send(request, "POST", url.path()).await?;
        let mut envelope = self.read_envelope(response, "POST", url.path()).await?;
        let stored: ClinicalCase = envelope.take("case")?.ok_or_else(case_not_returned)?;

        tracing::info!(case_id = %stored.id, "case created");
        Ok(stored)
    }

    async fn update(&self, id: &str, changes: &CaseChanges) -> RepositoryResult<ClinicalCase> {
        let url = self.url(&endpoints::case_by_id(id));
        let request = self.http.put(url.clone()).json(changes);
        let response = self.send(request, "PUT", url.path()).await?;
        let mut envelope = self.read_envelope(response, "PUT", url.path()).await?;
        let stored: ClinicalCase = envelope.take("case")?.ok_or_else(case_not_returned)?;

        tracing::info!(case_id = %id, branches = changes.len(), "case updated");
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let url = self.url(&endpoints::case_by_id(id));
        let response = self.send(self.http.delete(url.clone()), "DELETE", url.path()).await?;
        self.read_envelope(response, "DELETE", url.path()).await?;

        tracing::info!(case_id = %id, "case deleted");
        Ok(())
    }
}

fn case_not_returned() -> RepositoryError {
    RepositoryError::new("Réponse API invalide: cas non retourné", None)
}

//! School case ("cas d'école") endpoints.

use crate::ExpertApiClient;
use casebook_core::constants::endpoints;
use casebook_core::model::{
    CasEcole, CreateCasEcoleFromCasePayload, CreateCasEcolePayload, UpdateCasEcolePayload,
};
use casebook_core::repository::SchoolCaseRepository;
use casebook_core::{ClinicalCase, RepositoryResult};
use reqwest::StatusCode;

impl SchoolCaseRepository for ExpertApiClient {
    async fn list(&self, owner_id: Option<i64>) -> RepositoryResult<Vec<CasEcole>> {
        let url = self.url(endpoints::CAS_ECOLE);
        let mut request = self.http.get(url.clone());
        if let Some(owner_id) = owner_id {
            request = request.query(&[("professeur_id", owner_id)]);
        }
        let response = self.send(request, "GET", url.path()).await?;
        let mut envelope = self.read_envelope(response, "GET", url.path()).await?;
        Ok(envelope.take("cas_ecole")?.unwrap_or_default())
    }

    async fn get(&self, id: &str) -> RepositoryResult<Option<CasEcole>> {
        let url = self.url(&endpoints::cas_ecole_by_id(id));
        let response = self.send(self.http.get(url.clone()), "GET", url.path()).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let mut envelope = self.read_envelope(response, "GET", url.path()).await?;
        envelope.take("cas_ecole")
    }

    async fn create(&self, payload: &CreateCasEcolePayload) -> RepositoryResult<CasEcole> {
        let url = self.url(endpoints::CAS_ECOLE);
        let request = self.http.post(url.clone()).json(payload);
        let response = self.send(request, "POST", url.path()).await?;
        let mut envelope = self.read_envelope(response, "POST", url.path()).await?;
        let created: CasEcole = envelope.require("cas_ecole")?;

        tracing::info!(
            school_case_id = %created.id,
            professeur_id = created.professeur_id,
            "school case created"
        );
        Ok(created)
    }

    async fn create_from_case(
        &self,
        payload: &CreateCasEcoleFromCasePayload,
    ) -> RepositoryResult<CasEcole> {
        let url = self.url(endpoints::CAS_ECOLE_FROM_CASE);
        let request = self.http.post(url.clone()).json(payload);
        let response = self.send(request, "POST", url.path()).await?;
        let mut envelope = self.read_envelope(response, "POST", url.path()).await?;
        let created: CasEcole = envelope.require("cas_ecole")?;

        tracing::info!(
            school_case_id = %created.id,
            source_case_id = %payload.cas_clinique_id,
            "school case created from stored case"
        );
        Ok(created)
    }

    async fn update(&self, id: &str, payload: &UpdateCasEcolePayload) -> RepositoryResult<CasEcole> {
        let url = self.url(&endpoints::cas_ecole_by_id(id));
        let request = self.http.put(url.clone()).json(payload);
        let response = self.send(request, "PUT", url.path()).await?;
        let mut envelope = self.read_envelope(response, "PUT", url.path()).await?;
        envelope.require("cas_ecole")
    }

    async fn toggle_active(&self, id: &str) -> RepositoryResult<CasEcole> {
        let url = self.url(&endpoints::cas_ecole_toggle_actif(id));
        let response = self.send(self.http.put(url.clone()), "PUT", url.path()).await?;
        let mut envelope = self.read_envelope(response, "PUT", url.path()).await?;
        let toggled: CasEcole = envelope.require("cas_ecole")?;

        tracing::info!(school_case_id = %id, actif = toggled.actif, "school case toggled");
        Ok(toggled)
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let url = self.url(&endpoints::cas_ecole_by_id(id));
        let response = self.send(self.http.delete(url.clone()), "DELETE", url.path()).await?;
        self.read_envelope(response, "DELETE", url.path()).await?;

        tracing::info!(school_case_id = %id, "school case deleted");
        Ok(())
    }

    async fn available_cases(&self) -> RepositoryResult<Vec<ClinicalCase>> {
        let url = self.url(endpoints::CAS_CLINIQUES_DISPONIBLES);
        let response = self.send(self.http.get(url.clone()), "GET", url.path()).await?;
        let mut envelope = self.read_envelope(response, "GET", url.path()).await?;
        Ok(envelope.take("cas_cliniques")?.unwrap_or_default())
    }
}

//! Expert decision endpoints.
//!
//! Unlike the other endpoints, decision answers are read before the status is checked: the server
//! explains refusals (for instance a case outside the expert's domain) in the envelope message,
//! also on 4xx answers.

use crate::{http_error, Envelope, ExpertApiClient};
use casebook_core::constants::endpoints;
use casebook_core::repository::{ExpertIdentity, ReviewRepository};
use casebook_core::review::RejectableRegion;
use casebook_core::{RepositoryError, RepositoryResult};
use reqwest::Response;
use serde::Serialize;

#[derive(Serialize)]
struct ApproveBody<'a> {
    expert_id: &'a str,
    expert_domaine: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

#[derive(Serialize)]
struct RejectBody<'a> {
    expert_id: &'a str,
    expert_domaine: &'a str,
    rejection_reason: &'a str,
    rejection_parts: &'a [RejectableRegion],
}

#[derive(Serialize)]
struct InProgressBody<'a> {
    expert_id: &'a str,
    expert_domaine: &'a str,
    status: &'static str,
}

impl ExpertApiClient {
    async fn post_decision<B: Serialize>(&self, segments: &[&str], body: &B) -> RepositoryResult<()> {
        let url = self.url(segments);
        let request = self.http.post(url.clone()).json(body);
        let response = self.send(request, "POST", url.path()).await?;
        read_decision(response).await.map_err(|err| {
            tracing::error!("POST {} failed: {}", url.path(), err);
            err
        })
    }
}

async fn read_decision(response: Response) -> RepositoryResult<()> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| RepositoryError::transport(format!("cannot read response body: {e}")))?;

    let envelope = match Envelope::parse(&body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => return Err(http_error(status)),
        Err(_) => return Err(RepositoryError::new("Erreur de réponse du serveur", None)),
    };

    if !status.is_success() || envelope.is_error() {
        let code = (!status.is_success()).then_some(status.as_u16());
        return Err(match envelope.message.filter(|m| !m.is_empty()) {
            Some(message) => RepositoryError::new(message, code),
            None if status.is_success() => RepositoryError::new("Erreur API inconnue", None),
            None => http_error(status),
        });
    }
    Ok(())
}

impl ReviewRepository for ExpertApiClient {
    async fn approve(
        &self,
        case_id: &str,
        expert: &ExpertIdentity,
        comment: Option<&str>,
    ) -> RepositoryResult<()> {
        let body = ApproveBody {
            expert_id: &expert.expert_id,
            expert_domaine: &expert.expert_domaine,
            notes: comment,
        };
        self.post_decision(&endpoints::approve_case(case_id), &body).await?;
        tracing::info!(case_id = %case_id, expert_id = %expert.expert_id, "case approved");
        Ok(())
    }

    async fn reject(
        &self,
        case_id: &str,
        expert: &ExpertIdentity,
        reason: &str,
        regions: &[RejectableRegion],
    ) -> RepositoryResult<()> {
        let body = RejectBody {
            expert_id: &expert.expert_id,
            expert_domaine: &expert.expert_domaine,
            rejection_reason: reason,
            rejection_parts: regions,
        };
        self.post_decision(&endpoints::reject_case(case_id), &body).await?;
        tracing::info!(
            case_id = %case_id,
            expert_id = %expert.expert_id,
            regions = regions.len(),
            "case rejected"
        );
        Ok(())
    }

    async fn set_in_progress(&self, case_id: &str, expert: &ExpertIdentity) -> RepositoryResult<()> {
        let body = InProgressBody {
            expert_id: &expert.expert_id,
            expert_domaine: &expert.expert_domaine,
            status: "in_progress",
        };
        self.post_decision(&endpoints::in_progress_case(case_id), &body).await?;
        tracing::info!(case_id = %case_id, expert_id = %expert.expert_id, "case in review");
        Ok(())
    }
}

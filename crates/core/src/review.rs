//! Expert review decisions.
//!
//! Approving or marking a case in progress needs nothing but the expert's identity. Rejecting
//! needs a structured justification, captured by [`RejectionForm`]: a free-text reason and at
//! least one [`RejectableRegion`] of the case.

use crate::error::{CaseError, CaseResult, ValidationError};
use crate::repository::{ExpertIdentity, ReviewRepository};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Part of a case a reviewer can flag as the reason for rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectableRegion {
    Patient,
    Diagnostic,
    ExamRequests,
    Prescriptions,
    ConsultationReason,
    MedicalFolder,
}

impl RejectableRegion {
    /// Regions in the order they are offered to the reviewer.
    pub const ALL: [RejectableRegion; 6] = [
        RejectableRegion::Patient,
        RejectableRegion::Diagnostic,
        RejectableRegion::ExamRequests,
        RejectableRegion::Prescriptions,
        RejectableRegion::ConsultationReason,
        RejectableRegion::MedicalFolder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RejectableRegion::Patient => "patient",
            RejectableRegion::Diagnostic => "diagnostic",
            RejectableRegion::ExamRequests => "exam_requests",
            RejectableRegion::Prescriptions => "prescriptions",
            RejectableRegion::ConsultationReason => "consultation_reason",
            RejectableRegion::MedicalFolder => "medical_folder",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RejectableRegion::Patient => "Informations Patient",
            RejectableRegion::Diagnostic => "Diagnostic",
            RejectableRegion::ExamRequests => "Examens",
            RejectableRegion::Prescriptions => "Prescriptions",
            RejectableRegion::ConsultationReason => "Motif de consultation",
            RejectableRegion::MedicalFolder => "Dossier Médical",
        }
    }
}

impl fmt::Display for RejectableRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectableRegion {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RejectableRegion::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| CaseError::InvalidValue {
                path: "rejection_parts".into(),
                reason: format!("unknown region '{s}'"),
            })
    }
}

/// State of a rejection being written by a reviewer.
///
/// Submission is blocked until the reason is non-blank and at least one region is selected. The
/// blocking condition is kept in [`RejectionForm::error`] until the reason is edited or the form
/// is submitted again.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RejectionForm {
    reason: String,
    selected: Vec<RejectableRegion>,
    error: Option<ValidationError>,
}

impl RejectionForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Selected regions, in selection order.
    pub fn selected(&self) -> &[RejectableRegion] {
        &self.selected
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    pub fn is_selected(&self, region: RejectableRegion) -> bool {
        self.selected.contains(&region)
    }

    /// Replace the reason. Clears a displayed error.
    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
        self.error = None;
    }

    /// Select `region` if it is not selected, deselect it otherwise.
    pub fn toggle(&mut self, region: RejectableRegion) {
        if let Some(pos) = self.selected.iter().position(|r| *r == region) {
            self.selected.remove(pos);
        } else {
            self.selected.push(region);
        }
    }

    /// Check both conditions without changing the form.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.reason.trim().is_empty() {
            return Err(ValidationError::MissingRejectionReason);
        }
        if self.selected.is_empty() {
            return Err(ValidationError::MissingRejectedRegions);
        }
        Ok(())
    }

    /// Submit the rejection to `on_confirm`.
    ///
    /// When blocked, the unmet condition is stored in [`RejectionForm::error`] and returned,
    /// and `on_confirm` is not called. Otherwise `on_confirm` is called once with the reason and
    /// the selected regions and the form is reset.
    pub fn submit(
        &mut self,
        on_confirm: impl FnOnce(&str, &[RejectableRegion]),
    ) -> Result<(), ValidationError> {
        self.block_if_invalid()?;
        on_confirm(&self.reason, &self.selected);
        self.reset();
        Ok(())
    }

    /// Submit the rejection of `case_id` to the review repository.
    ///
    /// # Errors
    ///
    /// - [`CaseError::Validation`] if the form is incomplete (the repository is not called).
    /// - [`CaseError::Repository`] if the store refused the decision. The form keeps its content
    ///   so the reviewer can retry.
    pub async fn submit_to<R: ReviewRepository>(
        &mut self,
        repo: &R,
        case_id: &str,
        expert: &ExpertIdentity,
    ) -> CaseResult<()> {
        self.block_if_invalid()?;

        if let Err(err) = repo
            .reject(case_id, expert, &self.reason, &self.selected)
            .await
        {
            tracing::warn!(case_id, "rejection not recorded: {}", err);
            return Err(err.into());
        }

        tracing::info!(case_id, regions = self.selected.len(), "case rejected");
        self.reset();
        Ok(())
    }

    fn block_if_invalid(&mut self) -> Result<(), ValidationError> {
        if let Err(err) = self.validate() {
            tracing::info!("rejection blocked: {}", err);
            self.error = Some(err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.reason.clear();
        self.selected.clear();
        self.error = None;
    }
}

/// Approve `case_id`. A blank comment is sent as no comment.
pub async fn approve<R: ReviewRepository>(
    repo: &R,
    case_id: &str,
    expert: &ExpertIdentity,
    comment: Option<&str>,
) -> CaseResult<()> {
    let comment = comment.map(str::trim).filter(|c| !c.is_empty());
    repo.approve(case_id, expert, comment).await.map_err(|err| {
        tracing::warn!(case_id, "approval not recorded: {}", err);
        CaseError::from(err)
    })?;
    tracing::info!(case_id, expert_id = %expert.expert_id, "case approved");
    Ok(())
}

/// Mark `case_id` as being reviewed by `expert`.
pub async fn set_in_progress<R: ReviewRepository>(
    repo: &R,
    case_id: &str,
    expert: &ExpertIdentity,
) -> CaseResult<()> {
    repo.set_in_progress(case_id, expert).await.map_err(|err| {
        tracing::warn!(case_id, "review start not recorded: {}", err);
        CaseError::from(err)
    })?;
    tracing::debug!(case_id, expert_id = %expert.expert_id, "case in progress");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepositoryError;
    use crate::repository::{InMemoryCaseRepository, ReviewDecision};

    fn expert() -> ExpertIdentity {
        ExpertIdentity {
            expert_id: "e1".into(),
            expert_domaine: "cardiologie".into(),
        }
    }

    #[test]
    fn toggle_is_idempotent_per_pair() {
        let mut form = RejectionForm::new();
        form.toggle(RejectableRegion::Patient);
        form.toggle(RejectableRegion::Diagnostic);
        form.toggle(RejectableRegion::Patient);

        assert_eq!(form.selected(), &[RejectableRegion::Diagnostic]);
        assert!(!form.is_selected(RejectableRegion::Patient));
    }

    #[test]
    fn blank_reason_blocks_submission() {
        let mut form = RejectionForm::new();
        form.set_reason("");
        form.toggle(RejectableRegion::Patient);

        let mut calls = 0;
        let err = form.submit(|_, _| calls += 1).expect_err("blocked");

        assert_eq!(err, ValidationError::MissingRejectionReason);
        assert_eq!(err.to_string(), "Veuillez saisir une raison pour le rejet.");
        assert_eq!(form.error(), Some(&ValidationError::MissingRejectionReason));
        assert_eq!(calls, 0);
    }

    #[test]
    fn missing_regions_block_submission() {
        let mut form = RejectionForm::new();
        form.set_reason("incomplet");

        let mut calls = 0;
        let err = form.submit(|_, _| calls += 1).expect_err("blocked");

        assert_eq!(err.to_string(), "Veuillez cocher au moins un élément rejeté.");
        assert_eq!(calls, 0);
        assert_eq!(form.reason(), "incomplet");
    }

    #[test]
    fn complete_form_confirms_once_and_resets() {
        let mut form = RejectionForm::new();
        form.set_reason("incomplet");
        form.toggle(RejectableRegion::Patient);

        let mut confirmed = Vec::new();
        form.submit(|reason, regions| confirmed.push((reason.to_string(), regions.to_vec())))
            .expect("submission accepted");

        assert_eq!(
            confirmed,
            vec![("incomplet".to_string(), vec![RejectableRegion::Patient])]
        );
        assert_eq!(form, RejectionForm::new());
    }

    #[test]
    fn editing_the_reason_clears_the_error() {
        let mut form = RejectionForm::new();
        let _ = form.submit(|_, _| {});
        assert!(form.error().is_some());

        form.set_reason("i");
        assert!(form.error().is_none());
    }

    #[test]
    fn regions_parse_from_their_ids() {
        assert_eq!(
            "exam_requests".parse::<RejectableRegion>().unwrap(),
            RejectableRegion::ExamRequests
        );
        assert!("bill_items".parse::<RejectableRegion>().is_err());
        assert_eq!(
            serde_json::to_value(RejectableRegion::ConsultationReason).unwrap(),
            "consultation_reason"
        );
    }

    #[tokio::test]
    async fn submit_to_repository_records_the_decision() {
        let repo = InMemoryCaseRepository::new();
        let mut form = RejectionForm::new();
        form.set_reason("Diagnostic erroné");
        form.toggle(RejectableRegion::Diagnostic);

        form.submit_to(&repo, "c1", &expert()).await.expect("rejected");

        assert_eq!(
            repo.decisions(),
            vec![ReviewDecision::Rejected {
                case_id: "c1".into(),
                expert: expert(),
                reason: "Diagnostic erroné".into(),
                regions: vec![RejectableRegion::Diagnostic],
            }]
        );
        assert!(form.selected().is_empty());
    }

    #[tokio::test]
    async fn repository_failure_keeps_the_form() {
        let repo = InMemoryCaseRepository::new();
        repo.fail_next(RepositoryError::transport("connection refused"));
        let mut form = RejectionForm::new();
        form.set_reason("incomplet");
        form.toggle(RejectableRegion::Prescriptions);

        let err = form
            .submit_to(&repo, "c1", &expert())
            .await
            .expect_err("store failed");

        assert!(matches!(err, CaseError::Repository(_)));
        assert_eq!(form.reason(), "incomplet");
        assert_eq!(form.selected(), &[RejectableRegion::Prescriptions]);
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_the_repository() {
        let repo = InMemoryCaseRepository::new();
        let mut form = RejectionForm::new();

        let err = form
            .submit_to(&repo, "c1", &expert())
            .await
            .expect_err("blocked");

        assert!(matches!(
            err,
            CaseError::Validation(ValidationError::MissingRejectionReason)
        ));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn blank_approval_comment_is_dropped() {
        let repo = InMemoryCaseRepository::new();
        approve(&repo, "c1", &expert(), Some("  ")).await.expect("approved");
        set_in_progress(&repo, "c2", &expert()).await.expect("in progress");

        let decisions = repo.decisions();
        assert!(matches!(&decisions[0], ReviewDecision::Approved { comment: None, .. }));
        assert!(matches!(&decisions[1], ReviewDecision::InProgress { case_id, .. } if case_id == "c2"));
    }
}

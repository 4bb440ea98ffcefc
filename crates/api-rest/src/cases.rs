//! Case browsing, expert decisions and school-case management.

use crate::{ApiError, AppState, CaseStore};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use casebook_core::catalog::{self, CaseQuery};
use casebook_core::model::{CasEcole, ComplexityLevel};
use casebook_core::repository::{CaseFilter, CaseRepository, ExpertIdentity, SchoolCaseRepository};
use casebook_core::review::{self, RejectableRegion, RejectionForm};
use casebook_core::{CaseError, ClinicalCase};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct CaseListQuery {
    pub pathologie: Option<String>,
    pub niveau: Option<ComplexityLevel>,
    pub search: Option<String>,
    pub domaine: Option<String>,
    /// Restrict to the cases an expert of this domain may review.
    pub expert_domaine: Option<String>,
}

#[derive(Serialize)]
pub struct CaseListRes {
    pub cases: Vec<ClinicalCase>,
    pub total: usize,
}

/// List cases. `pathologie` and `niveau` are passed to the store, the other criteria are applied
/// here.
pub async fn list_cases<R: CaseStore>(
    State(state): State<AppState<R>>,
    Query(q): Query<CaseListQuery>,
) -> Result<Json<CaseListRes>, ApiError> {
    let filter = CaseFilter {
        pathologie: q.pathologie.filter(|p| !p.is_empty()),
        niveau: q.niveau,
    };
    let stored = CaseRepository::list(state.repo.as_ref(), &filter).await?;

    let query = CaseQuery {
        search: q.search.unwrap_or_default(),
        domaine: q.domaine,
        niveau: None,
    };
    let expert_domain = q.expert_domaine.as_deref();
    let cases: Vec<ClinicalCase> = query
        .apply(&stored)
        .into_iter()
        .filter(|c| catalog::visible_to_expert(c, expert_domain))
        .cloned()
        .collect();

    Ok(Json(CaseListRes {
        total: cases.len(),
        cases,
    }))
}

pub async fn get_case<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<ClinicalCase>, ApiError> {
    CaseRepository::get(state.repo.as_ref(), &id)
        .await?
        .map(Json)
        .ok_or_else(|| CaseError::NotFound(id).into())
}

#[derive(Debug, Deserialize)]
pub struct ApproveReq {
    #[serde(flatten)]
    pub expert: ExpertIdentity,
    #[serde(default)]
    pub comment: Option<String>,
}

pub async fn approve_case<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(req): Json<ApproveReq>,
) -> Result<Json<Value>, ApiError> {
    if let Err(err) =
        review::approve(state.repo.as_ref(), &id, &req.expert, req.comment.as_deref()).await
    {
        state.notifications.error("Erreur lors de la validation du cas");
        return Err(err.into());
    }
    state.notifications.success("Cas validé");
    Ok(Json(json!({ "status": "success" })))
}

#[derive(Debug, Deserialize)]
pub struct RejectReq {
    #[serde(flatten)]
    pub expert: ExpertIdentity,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub regions: Vec<RejectableRegion>,
}

/// Reject a case. The request goes through the same guard as the review screen: a non-blank
/// reason and at least one region.
pub async fn reject_case<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(req): Json<RejectReq>,
) -> Result<Json<Value>, ApiError> {
    let mut form = RejectionForm::new();
    form.set_reason(req.reason);
    for region in req.regions {
        if !form.is_selected(region) {
            form.toggle(region);
        }
    }

    match form.submit_to(state.repo.as_ref(), &id, &req.expert).await {
        Ok(()) => {
            state.notifications.success("Cas rejeté");
            Ok(Json(json!({ "status": "success" })))
        }
        Err(err @ CaseError::Repository(_)) => {
            state.notifications.error("Erreur lors du rejet du cas");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn start_review<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(expert): Json<ExpertIdentity>,
) -> Result<Json<Value>, ApiError> {
    review::set_in_progress(state.repo.as_ref(), &id, &expert).await?;
    Ok(Json(json!({ "status": "success" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct SchoolCaseListQuery {
    pub professeur_id: Option<i64>,
}

pub async fn list_school_cases<R: CaseStore>(
    State(state): State<AppState<R>>,
    Query(q): Query<SchoolCaseListQuery>,
) -> Result<Json<Vec<CasEcole>>, ApiError> {
    let school_cases = SchoolCaseRepository::list(state.repo.as_ref(), q.professeur_id).await?;
    Ok(Json(school_cases))
}

pub async fn toggle_school_case<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<CasEcole>, ApiError> {
    match state.repo.toggle_active(&id).await {
        Ok(toggled) => {
            state.notifications.success(if toggled.actif {
                "Cas activé"
            } else {
                "Cas désactivé"
            });
            Ok(Json(toggled))
        }
        Err(err) => {
            state.notifications.error("Erreur lors du changement d'état");
            Err(err.into())
        }
    }
}

pub async fn delete_school_case<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match SchoolCaseRepository::delete(state.repo.as_ref(), &id).await {
        Ok(()) => {
            state.notifications.success("Cas d'école supprimé");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => {
            state.notifications.error("Erreur lors de la suppression");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::router;
    use crate::test_support::{call, shared_state, state_with};
    use axum::http::{Method, StatusCode};
    use casebook_core::model::CaseMetadata;
    use casebook_core::repository::ReviewDecision;
    use casebook_core::{ClinicalCase, InMemoryCaseRepository, RejectableRegion};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Instant;

    fn case(id: &str, reason: &str, pathologie: &str, domaine: Option<&str>) -> ClinicalCase {
        ClinicalCase {
            id: id.into(),
            consultation_reason: reason.into(),
            metadata: Some(Arc::new(CaseMetadata {
                pathologie: pathologie.into(),
                domaine: domaine.map(str::to_string),
                ..CaseMetadata::default()
            })),
            ..ClinicalCase::default()
        }
    }

    fn repo() -> InMemoryCaseRepository {
        InMemoryCaseRepository::with_cases([
            case("c1", "Fièvre", "Paludisme", Some("infectiologie")),
            case("c2", "Douleur thoracique", "Infarctus", Some("cardiologie")),
            case("c3", "Toux", "Tuberculose", None),
        ])
    }

    #[tokio::test]
    async fn list_filters_by_store_query_and_expert_domain() {
        let app = router(state_with(repo()));

        let (status, body) = call(&app, Method::GET, "/cases", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);

        let (_, body) = call(&app, Method::GET, "/cases?pathologie=Paludisme", None).await;
        assert_eq!(body["cases"][0]["id"], "c1");
        assert_eq!(body["total"], 1);

        let (_, body) = call(&app, Method::GET, "/cases?search=toux", None).await;
        assert_eq!(body["cases"][0]["id"], "c3");

        let (_, body) = call(&app, Method::GET, "/cases?expert_domaine=cardiologie", None).await;
        let ids: Vec<&str> = body["cases"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["c2", "c3"]);
    }

    #[tokio::test]
    async fn unknown_case_is_404() {
        let app = router(state_with(repo()));
        let (status, body) = call(&app, Method::GET, "/cases/zz", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");

        let (status, body) = call(&app, Method::GET, "/cases/c2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["consultation_reason"], "Douleur thoracique");
    }

    #[tokio::test]
    async fn reject_requires_reason_and_regions() {
        let repo = Arc::new(repo());
        let app = router(shared_state(repo.clone()));

        let (status, body) = call(
            &app,
            Method::POST,
            "/cases/c1/reject",
            Some(json!({
                "expert_id": "e1",
                "expert_domaine": "infectiologie",
                "reason": "   ",
                "regions": ["patient"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Veuillez saisir une raison pour le rejet.");

        let (status, body) = call(
            &app,
            Method::POST,
            "/cases/c1/reject",
            Some(json!({
                "expert_id": "e1",
                "expert_domaine": "infectiologie",
                "reason": "Incomplet",
                "regions": []
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Veuillez cocher au moins un élément rejeté.");
        assert!(repo.decisions().is_empty());

        let (status, _) = call(
            &app,
            Method::POST,
            "/cases/c1/reject",
            Some(json!({
                "expert_id": "e1",
                "expert_domaine": "infectiologie",
                "reason": "Examens incohérents",
                "regions": ["exam_requests", "exam_requests", "diagnostic"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            repo.decisions(),
            vec![ReviewDecision::Rejected {
                case_id: "c1".into(),
                expert: casebook_core::ExpertIdentity {
                    expert_id: "e1".into(),
                    expert_domaine: "infectiologie".into(),
                },
                reason: "Examens incohérents".into(),
                regions: vec![RejectableRegion::ExamRequests, RejectableRegion::Diagnostic],
            }]
        );
    }

    #[tokio::test]
    async fn store_failure_is_a_bad_gateway_with_notification() {
        let repo = repo();
        repo.fail_next(casebook_core::RepositoryError::http(503, "Service Unavailable"));
        let state = state_with(repo);
        let app = router(state.clone());

        let (status, _) = call(
            &app,
            Method::POST,
            "/cases/c1/approve",
            Some(json!({"expert_id": "e1", "expert_domaine": "infectiologie"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let active = state.notifications().active(Instant::now());
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "Erreur lors de la validation du cas");
    }
}

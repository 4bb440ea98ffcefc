//! Authoring sessions.
//!
//! Each session owns one [`AuthoringWorkflow`]. Every state-changing endpoint answers with the
//! workflow snapshot so the caller can render the wizard without a second request.

use crate::{ApiError, AppState, CaseStore};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use casebook_core::authoring::{AuthoringSnapshot, AuthoringSummary};
use casebook_core::collections::{DrugField, ExamRequestField, HospitalisationField, PrescriptionField};
use casebook_core::model::CasEcole;
use casebook_core::{
    AuthoringWorkflow, CaseResult, CustomizeView, PatchValue, ScheduleForm, Teacher,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub snapshot: AuthoringSnapshot,
}

#[derive(Deserialize)]
pub struct SelectReq {
    pub case_id: String,
}

#[derive(Deserialize)]
pub struct ViewReq {
    pub view: CustomizeView,
}

#[derive(Deserialize)]
pub struct PatchReq {
    /// Dotted field path, e.g. `patient.first_name`.
    pub path: String,
    pub value: PatchValue,
}

#[derive(Deserialize)]
pub struct ExamReq {
    pub exam_name: String,
}

#[derive(Deserialize)]
pub struct FieldUpdate<F> {
    pub field: F,
    pub value: PatchValue,
}

/// Run `f` on session `sid` and answer with the resulting snapshot.
async fn with_session<R: CaseStore>(
    state: &AppState<R>,
    sid: Uuid,
    f: impl FnOnce(&mut AuthoringWorkflow) -> CaseResult<()> + Send,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    let session = state.session(sid).await?;
    let mut workflow = session.lock().await;
    f(&mut workflow)?;
    Ok(Json(workflow.snapshot()))
}

/// Start a session for the teacher in the request body.
pub async fn start<R: CaseStore>(
    State(state): State<AppState<R>>,
    Json(teacher): Json<Teacher>,
) -> (StatusCode, Json<SessionCreated>) {
    let session_id = Uuid::new_v4();
    let workflow = AuthoringWorkflow::new(Arc::clone(&state.cfg), teacher);
    let snapshot = workflow.snapshot();

    state.insert_session(session_id, workflow).await;
    tracing::info!(session_id = %session_id, "authoring session started");

    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id,
            snapshot,
        }),
    )
}

pub async fn snapshot<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |_| Ok(())).await
}

pub async fn discard<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.remove_session(sid).await {
        return Err(ApiError::SessionNotFound(sid));
    }
    tracing::info!(session_id = %sid, "authoring session discarded");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Select and navigation
// ============================================================================

/// Fetch a stored case and use it as template.
pub async fn select<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
    Json(req): Json<SelectReq>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    let session = state.session(sid).await?;
    let mut workflow = session.lock().await;
    workflow.select_by_id(state.repo.as_ref(), &req.case_id).await?;
    Ok(Json(workflow.snapshot()))
}

pub async fn scratch<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.create_from_scratch()).await
}

pub async fn advance<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.advance().map(|_| ())).await
}

pub async fn back<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.back().map(|_| ())).await
}

// ============================================================================
// Customize
// ============================================================================

pub async fn set_view<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
    Json(req): Json<ViewReq>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.set_view(req.view)).await
}

pub async fn patch_case<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
    Json(req): Json<PatchReq>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.patch_str(&req.path, req.value)).await
}

pub async fn append_exam<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
    Json(req): Json<ExamReq>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.append_exam(&req.exam_name)).await
}

pub async fn update_exam<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path((sid, index)): Path<(Uuid, usize)>,
    Json(req): Json<FieldUpdate<ExamRequestField>>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.update_exam(index, req.field, req.value)).await
}

pub async fn remove_exam<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path((sid, index)): Path<(Uuid, usize)>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.remove_exam(index)).await
}

pub async fn add_prescription<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.add_prescription()).await
}

pub async fn update_prescription<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path((sid, index)): Path<(Uuid, usize)>,
    Json(req): Json<FieldUpdate<PrescriptionField>>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| {
        w.update_prescription(index, req.field, req.value)
    })
    .await
}

pub async fn remove_prescription<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path((sid, index)): Path<(Uuid, usize)>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.remove_prescription(index)).await
}

pub async fn add_drug_line<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path((sid, index)): Path<(Uuid, usize)>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.add_drug_line(index)).await
}

pub async fn update_drug_line<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path((sid, index, drug)): Path<(Uuid, usize, usize)>,
    Json(req): Json<FieldUpdate<DrugField>>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| {
        w.update_drug_line(index, drug, req.field, req.value)
    })
    .await
}

pub async fn remove_drug_line<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path((sid, index, drug)): Path<(Uuid, usize, usize)>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.remove_drug_line(index, drug)).await
}

pub async fn add_hospitalisation<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.add_hospitalisation()).await
}

pub async fn update_hospitalisation<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path((sid, index)): Path<(Uuid, usize)>,
    Json(req): Json<FieldUpdate<HospitalisationField>>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| {
        w.update_hospitalisation(index, req.field, req.value)
    })
    .await
}

pub async fn remove_hospitalisation<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path((sid, index)): Path<(Uuid, usize)>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.remove_hospitalisation(index)).await
}

// ============================================================================
// Schedule and confirm
// ============================================================================

pub async fn set_schedule<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
    Json(schedule): Json<ScheduleForm>,
) -> Result<Json<AuthoringSnapshot>, ApiError> {
    with_session(&state, sid, |w| w.set_schedule(schedule)).await
}

pub async fn summary<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
) -> Result<Json<AuthoringSummary>, ApiError> {
    let session = state.session(sid).await?;
    let workflow = session.lock().await;
    Ok(Json(workflow.summary()?))
}

/// Submit the school case. The session ends on success and stays open for a retry on failure.
pub async fn submit<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(sid): Path<Uuid>,
) -> Result<(StatusCode, Json<CasEcole>), ApiError> {
    let session = state.session(sid).await?;
    let mut workflow = session.lock().await;

    match workflow.submit(state.repo.as_ref()).await {
        Ok(created) => {
            drop(workflow);
            state.remove_session(sid).await;
            state.notifications.success("Cas d'école créé avec succès");
            tracing::info!(session_id = %sid, school_case_id = %created.id, "authoring session closed");
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(err) => {
            if matches!(err, casebook_core::CaseError::Repository(_)) {
                state
                    .notifications
                    .error("Erreur lors de la création du cas d'école");
            }
            Err(err.into())
        }
    }
}

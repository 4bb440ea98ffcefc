//! Repository contracts and an in-memory implementation.
//!
//! The core never talks to the network itself. Services are generic over these traits; the
//! `casebook-client` crate implements them over HTTP and [`InMemoryCaseRepository`] implements them
//! in process for tests and offline use.
//!
//! Every failure is a uniform [`RepositoryError`]. A missing case on `get` is not an error: it is
//! reported as `Ok(None)`.

use crate::error::{RepositoryError, RepositoryResult};
use crate::model::{
    now_timestamp, CasEcole, ClinicalCase, ComplexityLevel, CreateCasEcoleFromCasePayload,
    CreateCasEcolePayload, UpdateCasEcolePayload,
};
use crate::review::RejectableRegion;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Top-level branches of a case, keyed by field name. Used for partial updates.
pub type CaseChanges = Map<String, Value>;

/// Server-side filter for [`CaseRepository::list`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pathologie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niveau: Option<ComplexityLevel>,
}

impl CaseFilter {
    pub fn matches(&self, case: &ClinicalCase) -> bool {
        let pathology_ok = self
            .pathologie
            .as_deref()
            .map_or(true, |p| case.pathology() == Some(p));
        let level_ok = self.niveau.map_or(true, |n| case.level() == Some(n));
        pathology_ok && level_ok
    }
}

/// The reviewing expert, as identified to the case store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertIdentity {
    pub expert_id: String,
    pub expert_domaine: String,
}

pub trait CaseRepository: Send + Sync {
    fn list(
        &self,
        filter: &CaseFilter,
    ) -> impl Future<Output = RepositoryResult<Vec<ClinicalCase>>> + Send;

    fn get(&self, id: &str)
        -> impl Future<Output = RepositoryResult<Option<ClinicalCase>>> + Send;

    /// Store a new case. The store assigns the id of the returned case.
    fn create(
        &self,
        case: &ClinicalCase,
    ) -> impl Future<Output = RepositoryResult<ClinicalCase>> + Send;

    /// Merge `changes` (top-level branches only) into the stored case.
    fn update(
        &self,
        id: &str,
        changes: &CaseChanges,
    ) -> impl Future<Output = RepositoryResult<ClinicalCase>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = RepositoryResult<()>> + Send;
}

pub trait SchoolCaseRepository: Send + Sync {
    /// School cases, restricted to one teacher when `owner_id` is given.
    fn list(
        &self,
        owner_id: Option<i64>,
    ) -> impl Future<Output = RepositoryResult<Vec<CasEcole>>> + Send;

    fn get(&self, id: &str) -> impl Future<Output = RepositoryResult<Option<CasEcole>>> + Send;

    fn create(
        &self,
        payload: &CreateCasEcolePayload,
    ) -> impl Future<Output = RepositoryResult<CasEcole>> + Send;

    fn create_from_case(
        &self,
        payload: &CreateCasEcoleFromCasePayload,
    ) -> impl Future<Output = RepositoryResult<CasEcole>> + Send;

    fn update(
        &self,
        id: &str,
        payload: &UpdateCasEcolePayload,
    ) -> impl Future<Output = RepositoryResult<CasEcole>> + Send;

    fn toggle_active(&self, id: &str) -> impl Future<Output = RepositoryResult<CasEcole>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Clinical cases that may serve as a school-case template.
    fn available_cases(&self) -> impl Future<Output = RepositoryResult<Vec<ClinicalCase>>> + Send;
}

/// Expert decisions on a submitted case.
pub trait ReviewRepository: Send + Sync {
    fn approve(
        &self,
        case_id: &str,
        expert: &ExpertIdentity,
        comment: Option<&str>,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    fn reject(
        &self,
        case_id: &str,
        expert: &ExpertIdentity,
        reason: &str,
        regions: &[RejectableRegion],
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    fn set_in_progress(
        &self,
        case_id: &str,
        expert: &ExpertIdentity,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;
}

// ============================================================================
// In-memory repository
// ============================================================================

/// A decision recorded by [`InMemoryCaseRepository`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReviewDecision {
    Approved {
        case_id: String,
        expert: ExpertIdentity,
        comment: Option<String>,
    },
    Rejected {
        case_id: String,
        expert: ExpertIdentity,
        reason: String,
        regions: Vec<RejectableRegion>,
    },
    InProgress {
        case_id: String,
        expert: ExpertIdentity,
    },
}

#[derive(Default)]
struct MemoryState {
    cases: Vec<ClinicalCase>,
    school_cases: Vec<CasEcole>,
    decisions: Vec<ReviewDecision>,
    calls: Vec<String>,
    fail_next: Option<RepositoryError>,
}

/// Process-local repository with insertion-ordered storage.
///
/// Every call is logged (see [`InMemoryCaseRepository::calls`]) and a single failure can be
/// injected with [`InMemoryCaseRepository::fail_next`].
#[derive(Default)]
pub struct InMemoryCaseRepository {
    state: Mutex<MemoryState>,
    next_id: AtomicU64,
}

impl InMemoryCaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cases(cases: impl IntoIterator<Item = ClinicalCase>) -> Self {
        let repo = Self::new();
        repo.lock().cases.extend(cases);
        repo
    }

    /// Make the next repository call fail with `error`.
    pub fn fail_next(&self, error: RepositoryError) {
        self.lock().fail_next = Some(error);
    }

    /// Calls received so far, as `"<method> <target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn decisions(&self) -> Vec<ReviewDecision> {
        self.lock().decisions.clone()
    }

    pub fn school_cases(&self) -> Vec<CasEcole> {
        self.lock().school_cases.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and consume an injected failure, if any.
    fn begin(&self, call: String) -> RepositoryResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{n}")
    }
}

fn not_found() -> RepositoryError {
    RepositoryError::http(404, "Not Found")
}

fn merge_changes(case: &ClinicalCase, changes: &CaseChanges) -> RepositoryResult<ClinicalCase> {
    let mut doc = serde_json::to_value(case)
        .map_err(|e| RepositoryError::new(format!("cannot encode case: {e}"), Some(500)))?;
    if let Value::Object(fields) = &mut doc {
        for (key, value) in changes {
            if key != "id" {
                fields.insert(key.clone(), value.clone());
            }
        }
    }
    serde_json::from_value(doc)
        .map_err(|e| RepositoryError::new(format!("invalid case update: {e}"), Some(400)))
}

impl CaseRepository for InMemoryCaseRepository {
    async fn list(&self, filter: &CaseFilter) -> RepositoryResult<Vec<ClinicalCase>> {
        let state = self.begin("list cases".into())?;
        Ok(state
            .cases
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> RepositoryResult<Option<ClinicalCase>> {
        let state = self.begin(format!("get {id}"))?;
        Ok(state.cases.iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, case: &ClinicalCase) -> RepositoryResult<ClinicalCase> {
        let id = self.fresh_id("case");
        let mut state = self.begin("create case".into())?;
        let stored = ClinicalCase {
            id,
            ..case.clone()
        };
        state.cases.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &str, changes: &CaseChanges) -> RepositoryResult<ClinicalCase> {
        let mut state = self.begin(format!("update {id}"))?;
        let slot = state
            .cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(not_found)?;
        let merged = merge_changes(slot, changes)?;
        *slot = merged.clone();
        Ok(merged)
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let mut state = self.begin(format!("delete {id}"))?;
        let before = state.cases.len();
        state.cases.retain(|c| c.id != id);
        if state.cases.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}

impl SchoolCaseRepository for InMemoryCaseRepository {
    async fn list(&self, owner_id: Option<i64>) -> RepositoryResult<Vec<CasEcole>> {
        let state = self.begin("list school cases".into())?;
        Ok(state
            .school_cases
            .iter()
            .filter(|s| owner_id.map_or(true, |o| s.professeur_id == o))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> RepositoryResult<Option<CasEcole>> {
        let state = self.begin(format!("get school case {id}"))?;
        Ok(state.school_cases.iter().find(|s| s.id == id).cloned())
    }

    async fn create(&self, payload: &CreateCasEcolePayload) -> RepositoryResult<CasEcole> {
        let id = self.fresh_id("ecole");
        let mut state = self.begin("create school case".into())?;
        let school_case = CasEcole {
            id,
            titre: payload.titre.clone(),
            ecole_id: payload.ecole_id,
            ecole_nom: payload.ecole_nom.clone(),
            classe_id: payload.classe_id,
            classe_nom: payload.classe_nom.clone(),
            professeur_id: payload.professeur_id,
            professeur_nom: payload.professeur_nom.clone(),
            professeur_email: payload.professeur_email.clone(),
            cas_clinique: payload.cas_clinique.clone(),
            temps_limite_minutes: payload.temps_limite_minutes,
            penalite_par_minute: payload.penalite_par_minute,
            actif: true,
            date_creation: now_timestamp(),
        };
        state.school_cases.push(school_case.clone());
        Ok(school_case)
    }

    async fn create_from_case(
        &self,
        payload: &CreateCasEcoleFromCasePayload,
    ) -> RepositoryResult<CasEcole> {
        let id = self.fresh_id("ecole");
        let mut state = self.begin(format!("create school case from {}", payload.cas_clinique_id))?;
        let source = state
            .cases
            .iter()
            .find(|c| c.id == payload.cas_clinique_id)
            .cloned()
            .ok_or_else(not_found)?;
        let titre = payload
            .titre
            .clone()
            .unwrap_or_else(|| source.consultation_reason.clone());
        let school_case = CasEcole {
            id,
            titre,
            ecole_id: payload.ecole_id,
            ecole_nom: payload.ecole_nom.clone(),
            classe_id: payload.classe_id,
            classe_nom: payload.classe_nom.clone(),
            professeur_id: payload.professeur_id,
            professeur_nom: payload.professeur_nom.clone(),
            professeur_email: payload.professeur_email.clone(),
            cas_clinique: source,
            temps_limite_minutes: payload.temps_limite_minutes,
            penalite_par_minute: payload.penalite_par_minute,
            actif: true,
            date_creation: now_timestamp(),
        };
        state.school_cases.push(school_case.clone());
        Ok(school_case)
    }

    async fn update(&self, id: &str, payload: &UpdateCasEcolePayload) -> RepositoryResult<CasEcole> {
        let mut state = self.begin(format!("update school case {id}"))?;
        let slot = state
            .school_cases
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(not_found)?;
        payload.apply_to(slot);
        Ok(slot.clone())
    }

    async fn toggle_active(&self, id: &str) -> RepositoryResult<CasEcole> {
        let mut state = self.begin(format!("toggle school case {id}"))?;
        let slot = state
            .school_cases
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(not_found)?;
        slot.actif = !slot.actif;
        Ok(slot.clone())
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let mut state = self.begin(format!("delete school case {id}"))?;
        let before = state.school_cases.len();
        state.school_cases.retain(|s| s.id != id);
        if state.school_cases.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn available_cases(&self) -> RepositoryResult<Vec<ClinicalCase>> {
        let state = self.begin("list available cases".into())?;
        Ok(state.cases.clone())
    }
}

impl ReviewRepository for InMemoryCaseRepository {
    async fn approve(
        &self,
        case_id: &str,
        expert: &ExpertIdentity,
        comment: Option<&str>,
    ) -> RepositoryResult<()> {
        let mut state = self.begin(format!("approve {case_id}"))?;
        state.decisions.push(ReviewDecision::Approved {
            case_id: case_id.to_string(),
            expert: expert.clone(),
            comment: comment.map(str::to_string),
        });
        Ok(())
    }

    async fn reject(
        &self,
        case_id: &str,
        expert: &ExpertIdentity,
        reason: &str,
        regions: &[RejectableRegion],
    ) -> RepositoryResult<()> {
        let mut state = self.begin(format!("reject {case_id}"))?;
        state.decisions.push(ReviewDecision::Rejected {
            case_id: case_id.to_string(),
            expert: expert.clone(),
            reason: reason.to_string(),
            regions: regions.to_vec(),
        });
        Ok(())
    }

    async fn set_in_progress(&self, case_id: &str, expert: &ExpertIdentity) -> RepositoryResult<()> {
        let mut state = self.begin(format!("in_progress {case_id}"))?;
        state.decisions.push(ReviewDecision::InProgress {
            case_id: case_id.to_string(),
            expert: expert.clone(),
        });
        Ok(())
    }
}

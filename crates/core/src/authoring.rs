//! School-case authoring workflow.
//!
//! A four-step wizard, strictly linear:
//!
//! 1. **Select**: pick an existing case as template, or synthesize one from scratch.
//! 2. **Customize**: edit the working copy through the patch engine and the collection editor.
//! 3. **Schedule**: enter title, school, class, time limit and overtime penalty.
//! 4. **Confirm**: review the summary and submit the school case.
//!
//! Each forward move is guarded; backward moves go to the immediate predecessor and keep all
//! entered data. Choosing another template in Select replaces the working copy and discards the
//! edits made to the previous one.
//!
//! The working copy is never the template itself. Selecting clones the template (sharing its
//! branches) and every edit copies the branches it touches, so the template a caller holds, and
//! the case in the repository, are never modified.
//!
//! A workflow is one-shot: after a successful submission every operation fails with
//! [`CaseError::InvalidTransition`].

use crate::collections::{self, DrugField, ExamRequestField, HospitalisationField, PrescriptionField};
use crate::config::CoreConfig;
use crate::constants::{
    DEFAULT_CLASS_NAME, DEFAULT_OWNER_ID, DEFAULT_PENALTY_PER_MINUTE, DEFAULT_SCHOOL_NAME,
    DEFAULT_TIME_LIMIT_MINUTES,
};
use crate::error::{CaseError, CaseResult, RepositoryError, ValidationError, WorkflowAction};
use crate::model::{CasEcole, ClinicalCase, ComplexityLevel, CreateCasEcolePayload, Teacher};
use crate::patch::{self, CasePath, PatchValue};
use crate::repository::{CaseRepository, SchoolCaseRepository};
use crate::store::{Store, Subscription};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Steps and views
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthoringStep {
    Select,
    Customize,
    Schedule,
    Confirm,
}

impl AuthoringStep {
    /// 1-based position, as shown in the progress indicator.
    pub fn number(self) -> u8 {
        match self {
            AuthoringStep::Select => 1,
            AuthoringStep::Customize => 2,
            AuthoringStep::Schedule => 3,
            AuthoringStep::Confirm => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AuthoringStep::Select => "select",
            AuthoringStep::Customize => "customize",
            AuthoringStep::Schedule => "schedule",
            AuthoringStep::Confirm => "confirm",
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            AuthoringStep::Select => Some(AuthoringStep::Customize),
            AuthoringStep::Customize => Some(AuthoringStep::Schedule),
            AuthoringStep::Schedule => Some(AuthoringStep::Confirm),
            AuthoringStep::Confirm => None,
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            AuthoringStep::Select => None,
            AuthoringStep::Customize => Some(AuthoringStep::Select),
            AuthoringStep::Schedule => Some(AuthoringStep::Customize),
            AuthoringStep::Confirm => Some(AuthoringStep::Schedule),
        }
    }
}

impl fmt::Display for AuthoringStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Editor tabs of the Customize step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomizeView {
    #[default]
    Identity,
    Clinical,
    Medical,
    History,
    Exams,
    Prescriptions,
    Hospitalisations,
    Metadata,
}

impl CustomizeView {
    pub const ALL: [CustomizeView; 8] = [
        CustomizeView::Identity,
        CustomizeView::Clinical,
        CustomizeView::Medical,
        CustomizeView::History,
        CustomizeView::Exams,
        CustomizeView::Prescriptions,
        CustomizeView::Hospitalisations,
        CustomizeView::Metadata,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CustomizeView::Identity => "Identité",
            CustomizeView::Clinical => "Clinique",
            CustomizeView::Medical => "Dossier",
            CustomizeView::History => "Antécédents",
            CustomizeView::Exams => "Examens",
            CustomizeView::Prescriptions => "Ordonnances",
            CustomizeView::Hospitalisations => "Hospitalisation",
            CustomizeView::Metadata => "Métadonnées",
        }
    }
}

// ============================================================================
// Schedule
// ============================================================================

/// Assignment details entered in the Schedule step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleForm {
    #[serde(default)]
    pub titre: String,
    #[serde(default)]
    pub ecole_id: i64,
    #[serde(default)]
    pub ecole_nom: String,
    #[serde(default)]
    pub classe_id: i64,
    #[serde(default)]
    pub classe_nom: String,
    #[serde(default = "default_time_limit")]
    pub temps_limite_minutes: u32,
    #[serde(default = "default_penalty")]
    pub penalite_par_minute: u32,
}

fn default_time_limit() -> u32 {
    DEFAULT_TIME_LIMIT_MINUTES
}

fn default_penalty() -> u32 {
    DEFAULT_PENALTY_PER_MINUTE
}

impl Default for ScheduleForm {
    fn default() -> Self {
        Self {
            titre: String::new(),
            ecole_id: 0,
            ecole_nom: String::new(),
            classe_id: 0,
            classe_nom: String::new(),
            temps_limite_minutes: DEFAULT_TIME_LIMIT_MINUTES,
            penalite_par_minute: DEFAULT_PENALTY_PER_MINUTE,
        }
    }
}

impl ScheduleForm {
    /// Title, school name and class name must all be non-blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.titre.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.ecole_nom.trim().is_empty() {
            return Err(ValidationError::MissingSchoolName);
        }
        if self.classe_nom.trim().is_empty() {
            return Err(ValidationError::MissingClassName);
        }
        Ok(())
    }
}

/// Build the creation request for `case` scheduled by `schedule` and owned by `teacher`.
///
/// Zero school or class ids become [`DEFAULT_OWNER_ID`] and blank names take the default school
/// and class names.
pub fn build_payload(
    schedule: &ScheduleForm,
    teacher: &Teacher,
    case: &ClinicalCase,
) -> CreateCasEcolePayload {
    let or_default_id = |id: i64| if id == 0 { DEFAULT_OWNER_ID } else { id };
    let or_default_name = |name: &str, default: &str| {
        if name.trim().is_empty() {
            default.to_string()
        } else {
            name.to_string()
        }
    };

    CreateCasEcolePayload {
        titre: schedule.titre.clone(),
        ecole_id: or_default_id(schedule.ecole_id),
        ecole_nom: or_default_name(&schedule.ecole_nom, DEFAULT_SCHOOL_NAME),
        classe_id: or_default_id(schedule.classe_id),
        classe_nom: or_default_name(&schedule.classe_nom, DEFAULT_CLASS_NAME),
        professeur_id: teacher.id,
        professeur_nom: teacher.full_name(),
        professeur_email: teacher.email.clone(),
        cas_clinique: case.clone(),
        temps_limite_minutes: schedule.temps_limite_minutes,
        penalite_par_minute: schedule.penalite_par_minute,
    }
}

// ============================================================================
// Events and read models
// ============================================================================

/// Terminal outcome of a submission attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthoringEvent {
    Submitted(Box<CreateCasEcolePayload>),
    SubmissionFailed(RepositoryError),
}

/// Read-only summary shown in the Confirm step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuthoringSummary {
    pub titre: String,
    pub ecole_nom: String,
    pub classe_nom: String,
    pub temps_limite_minutes: u32,
    pub penalite_par_minute: u32,
    pub patient_name: String,
    pub consultation_reason: String,
    pub pathologie: Option<String>,
    pub niveau_complexite: Option<ComplexityLevel>,
    pub exam_count: usize,
    pub prescription_count: usize,
    pub hospitalisation_count: usize,
}

/// Everything a presentation layer needs to render the wizard.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuthoringSnapshot {
    pub step: AuthoringStep,
    pub step_number: u8,
    pub view: CustomizeView,
    pub source_case_id: Option<String>,
    pub working_copy: Option<ClinicalCase>,
    pub schedule: ScheduleForm,
    pub finished: bool,
}

// ============================================================================
// Workflow
// ============================================================================

pub struct AuthoringWorkflow {
    config: Arc<CoreConfig>,
    teacher: Teacher,
    step: AuthoringStep,
    view: CustomizeView,
    working_copy: Option<ClinicalCase>,
    source_case_id: Option<String>,
    schedule: ScheduleForm,
    finished: bool,
    events: Store<Option<AuthoringEvent>>,
}

impl AuthoringWorkflow {
    /// Start a workflow for `teacher`. The school name is pre-filled from the teacher's
    /// establishment when known.
    pub fn new(config: Arc<CoreConfig>, teacher: Teacher) -> Self {
        let schedule = ScheduleForm {
            ecole_nom: teacher.etablissement.clone().unwrap_or_default(),
            ..ScheduleForm::default()
        };

        Self {
            config,
            teacher,
            step: AuthoringStep::Select,
            view: CustomizeView::default(),
            working_copy: None,
            source_case_id: None,
            schedule,
            finished: false,
            events: Store::new(None),
        }
    }

    pub fn step(&self) -> AuthoringStep {
        self.step
    }

    pub fn view(&self) -> CustomizeView {
        self.view
    }

    pub fn working_copy(&self) -> Option<&ClinicalCase> {
        self.working_copy.as_ref()
    }

    /// Id of the template the working copy was made from, `None` when created from scratch.
    pub fn source_case_id(&self) -> Option<&str> {
        self.source_case_id.as_deref()
    }

    pub fn schedule(&self) -> &ScheduleForm {
        &self.schedule
    }

    pub fn teacher(&self) -> &Teacher {
        &self.teacher
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn snapshot(&self) -> AuthoringSnapshot {
        AuthoringSnapshot {
            step: self.step,
            step_number: self.step.number(),
            view: self.view,
            source_case_id: self.source_case_id.clone(),
            working_copy: self.working_copy.clone(),
            schedule: self.schedule.clone(),
            finished: self.finished,
        }
    }

    /// Listen for terminal submission events.
    pub fn subscribe(
        &self,
        listener: impl Fn(&AuthoringEvent) + Send + Sync + 'static,
    ) -> Subscription<Option<AuthoringEvent>> {
        self.events.subscribe(move |event| {
            if let Some(event) = event {
                listener(event);
            }
        })
    }

    // ------------------------------------------------------------------------
    // Select
    // ------------------------------------------------------------------------

    /// Use a copy of `template` as the working copy, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::InvalidTransition`] outside the Select step.
    pub fn select_template(&mut self, template: &ClinicalCase) -> CaseResult<()> {
        self.require(AuthoringStep::Select, WorkflowAction::Select)?;

        if self.working_copy.is_some() {
            tracing::debug!(case_id = %template.id, "replacing working copy; previous edits discarded");
        }
        self.working_copy = Some(template.clone());
        self.source_case_id = Some(template.id.clone());
        self.view = CustomizeView::default();
        tracing::debug!(case_id = %template.id, "template selected");
        Ok(())
    }

    /// Fetch case `id` from `repo` and select it as template.
    ///
    /// # Errors
    ///
    /// - [`CaseError::InvalidTransition`] outside the Select step (the repository is not called).
    /// - [`CaseError::NotFound`] if the repository has no such case.
    /// - [`CaseError::Repository`] if the fetch failed. The workflow is unchanged.
    pub async fn select_by_id<R: CaseRepository>(&mut self, repo: &R, id: &str) -> CaseResult<()> {
        self.require(AuthoringStep::Select, WorkflowAction::Select)?;

        let template = match repo.get(id).await {
            Ok(Some(case)) => case,
            Ok(None) => return Err(CaseError::NotFound(id.to_string())),
            Err(err) => {
                tracing::warn!(case_id = id, "template fetch failed: {}", err);
                return Err(err.into());
            }
        };
        self.select_template(&template)
    }

    /// Synthesize a blank case tagged with the first configured domain and move to Customize.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::InvalidTransition`] outside the Select step.
    pub fn create_from_scratch(&mut self) -> CaseResult<()> {
        self.require(AuthoringStep::Select, WorkflowAction::Select)?;

        let case = ClinicalCase::from_scratch(self.config.default_domain());
        tracing::debug!(case_id = %case.id, "case created from scratch");
        self.working_copy = Some(case);
        self.source_case_id = None;
        self.view = CustomizeView::default();
        self.move_to(AuthoringStep::Customize);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Move to the next step if the current step's guard holds.
    ///
    /// # Errors
    ///
    /// - [`CaseError::Validation`] when the guard fails. The step does not change.
    /// - [`CaseError::InvalidTransition`] from Confirm, or once finished.
    pub fn advance(&mut self) -> CaseResult<AuthoringStep> {
        self.ensure_active(WorkflowAction::Advance)?;

        let guard = match self.step {
            AuthoringStep::Select if self.working_copy.is_none() => {
                Err(ValidationError::MissingWorkingCopy)
            }
            AuthoringStep::Schedule => self.schedule.validate(),
            _ => Ok(()),
        };
        if let Err(err) = guard {
            tracing::info!(step = %self.step, "advance blocked: {}", err);
            return Err(err.into());
        }

        let next = self.step.next().ok_or_else(|| self.transition_error(WorkflowAction::Advance))?;
        self.move_to(next);
        Ok(next)
    }

    /// Move to the previous step. Nothing entered so far is lost.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::InvalidTransition`] from Select, or once finished.
    pub fn back(&mut self) -> CaseResult<AuthoringStep> {
        self.ensure_active(WorkflowAction::Back)?;
        let previous = self
            .step
            .previous()
            .ok_or_else(|| self.transition_error(WorkflowAction::Back))?;
        self.move_to(previous);
        Ok(previous)
    }

    // ------------------------------------------------------------------------
    // Customize
    // ------------------------------------------------------------------------

    pub fn set_view(&mut self, view: CustomizeView) -> CaseResult<()> {
        self.require(AuthoringStep::Customize, WorkflowAction::Edit)?;
        self.view = view;
        Ok(())
    }

    pub fn patch(&mut self, path: CasePath, value: impl Into<PatchValue>) -> CaseResult<()> {
        let value = value.into();
        self.edit(|case| patch::patch(case, path, value))
    }

    pub fn patch_str(&mut self, path: &str, value: impl Into<PatchValue>) -> CaseResult<()> {
        let path: CasePath = path.parse()?;
        self.patch(path, value)
    }

    pub fn append_exam(&mut self, exam_name: &str) -> CaseResult<()> {
        self.edit(|case| Ok(collections::append_exam(case, exam_name)))
    }

    pub fn remove_exam(&mut self, index: usize) -> CaseResult<()> {
        self.edit(|case| Ok(collections::remove_exam(case, index)))
    }

    pub fn update_exam(
        &mut self,
        index: usize,
        field: ExamRequestField,
        value: impl Into<PatchValue>,
    ) -> CaseResult<()> {
        let value = value.into();
        self.edit(|case| Ok(collections::update_exam(case, index, field, value)))
    }

    pub fn add_prescription(&mut self) -> CaseResult<()> {
        self.edit(|case| Ok(collections::add_prescription(case)))
    }

    pub fn remove_prescription(&mut self, index: usize) -> CaseResult<()> {
        self.edit(|case| Ok(collections::remove_prescription(case, index)))
    }

    pub fn update_prescription(
        &mut self,
        index: usize,
        field: PrescriptionField,
        value: impl Into<PatchValue>,
    ) -> CaseResult<()> {
        let value = value.into();
        self.edit(|case| Ok(collections::update_prescription(case, index, field, value)))
    }

    pub fn add_drug_line(&mut self, prescription_index: usize) -> CaseResult<()> {
        self.edit(|case| Ok(collections::add_drug_line(case, prescription_index)))
    }

    pub fn remove_drug_line(&mut self, prescription_index: usize, drug_index: usize) -> CaseResult<()> {
        self.edit(|case| {
            Ok(collections::remove_drug_line(
                case,
                prescription_index,
                drug_index,
            ))
        })
    }

    pub fn update_drug_line(
        &mut self,
        prescription_index: usize,
        drug_index: usize,
        field: DrugField,
        value: impl Into<PatchValue>,
    ) -> CaseResult<()> {
        let value = value.into();
        self.edit(|case| {
            Ok(collections::update_drug_line(
                case,
                prescription_index,
                drug_index,
                field,
                value,
            ))
        })
    }

    pub fn add_hospitalisation(&mut self) -> CaseResult<()> {
        self.edit(|case| Ok(collections::add_hospitalisation(case)))
    }

    pub fn remove_hospitalisation(&mut self, index: usize) -> CaseResult<()> {
        self.edit(|case| Ok(collections::remove_hospitalisation(case, index)))
    }

    pub fn update_hospitalisation(
        &mut self,
        index: usize,
        field: HospitalisationField,
        value: impl Into<PatchValue>,
    ) -> CaseResult<()> {
        let value = value.into();
        self.edit(|case| Ok(collections::update_hospitalisation(case, index, field, value)))
    }

    // ------------------------------------------------------------------------
    // Schedule
    // ------------------------------------------------------------------------

    /// Mutable access to the schedule form, in the Schedule step only.
    pub fn schedule_mut(&mut self) -> CaseResult<&mut ScheduleForm> {
        self.require(AuthoringStep::Schedule, WorkflowAction::Schedule)?;
        Ok(&mut self.schedule)
    }

    pub fn set_schedule(&mut self, schedule: ScheduleForm) -> CaseResult<()> {
        *self.schedule_mut()? = schedule;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Confirm
    // ------------------------------------------------------------------------

    pub fn summary(&self) -> CaseResult<AuthoringSummary> {
        self.require(AuthoringStep::Confirm, WorkflowAction::Submit)?;
        let case = self.confirmed_case()?;

        Ok(AuthoringSummary {
            titre: self.schedule.titre.clone(),
            ecole_nom: self.schedule.ecole_nom.clone(),
            classe_nom: self.schedule.classe_nom.clone(),
            temps_limite_minutes: self.schedule.temps_limite_minutes,
            penalite_par_minute: self.schedule.penalite_par_minute,
            patient_name: format!("{} {}", case.patient.first_name, case.patient.last_name)
                .trim()
                .to_string(),
            consultation_reason: case.consultation_reason.clone(),
            pathologie: case.pathology().map(str::to_string),
            niveau_complexite: case.level(),
            exam_count: case.exam_requests.len(),
            prescription_count: case.prescriptions.len(),
            hospitalisation_count: case.hospitalisations.len(),
        })
    }

    /// The creation request that [`AuthoringWorkflow::submit`] would send.
    pub fn payload(&self) -> CaseResult<CreateCasEcolePayload> {
        self.require(AuthoringStep::Confirm, WorkflowAction::Submit)?;
        Ok(build_payload(&self.schedule, &self.teacher, self.confirmed_case()?))
    }

    /// Submit the school case.
    ///
    /// On success the workflow is finished and [`AuthoringEvent::Submitted`] is emitted. On
    /// failure [`AuthoringEvent::SubmissionFailed`] is emitted and the workflow stays in Confirm
    /// with all its data, ready for a retry.
    ///
    /// # Errors
    ///
    /// - [`CaseError::InvalidTransition`] outside Confirm or once finished.
    /// - [`CaseError::Repository`] if the store refused the request.
    pub async fn submit<R: SchoolCaseRepository>(&mut self, repo: &R) -> CaseResult<CasEcole> {
        let payload = self.payload()?;

        match repo.create(&payload).await {
            Ok(created) => {
                tracing::info!(
                    school_case_id = %created.id,
                    titre = %payload.titre,
                    "school case submitted"
                );
                self.finished = true;
                self.events
                    .set(Some(AuthoringEvent::Submitted(Box::new(payload))));
                Ok(created)
            }
            Err(err) => {
                tracing::warn!(titre = %payload.titre, "school case submission failed: {}", err);
                self.events
                    .set(Some(AuthoringEvent::SubmissionFailed(err.clone())));
                Err(err.into())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn edit(
        &mut self,
        f: impl FnOnce(&ClinicalCase) -> CaseResult<ClinicalCase>,
    ) -> CaseResult<()> {
        self.require(AuthoringStep::Customize, WorkflowAction::Edit)?;
        let current = self
            .working_copy
            .as_ref()
            .ok_or(ValidationError::MissingWorkingCopy)?;
        let next = f(current)?;
        self.working_copy = Some(next);
        Ok(())
    }

    fn confirmed_case(&self) -> CaseResult<&ClinicalCase> {
        self.working_copy
            .as_ref()
            .ok_or_else(|| ValidationError::MissingWorkingCopy.into())
    }

    fn move_to(&mut self, step: AuthoringStep) {
        tracing::debug!(from = %self.step, to = %step, "authoring step changed");
        self.step = step;
    }

    fn ensure_active(&self, action: WorkflowAction) -> CaseResult<()> {
        if self.finished {
            return Err(CaseError::InvalidTransition {
                step: "submitted".into(),
                action,
            });
        }
        Ok(())
    }

    fn require(&self, step: AuthoringStep, action: WorkflowAction) -> CaseResult<()> {
        self.ensure_active(action)?;
        if self.step != step {
            return Err(self.transition_error(action));
        }
        Ok(())
    }

    fn transition_error(&self, action: WorkflowAction) -> CaseError {
        CaseError::InvalidTransition {
            step: self.step.name().to_string(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EXPERTISE_DOMAINS;
    use crate::model::{CaseMetadata, ExamRequest};
    use crate::patch::{MetadataField, ParameterField, PatientField};
    use crate::repository::InMemoryCaseRepository;
    use std::sync::Mutex;
    use std::time::Duration;

    fn config() -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(
                "http://localhost:5001",
                Duration::from_secs(5),
                EXPERTISE_DOMAINS.iter().map(|d| d.to_string()).collect(),
            )
            .expect("valid config"),
        )
    }

    fn teacher() -> Teacher {
        Teacher {
            id: 42,
            prenom: "Awa".into(),
            nom: "Diallo".into(),
            email: "awa.diallo@example.org".into(),
            etablissement: Some("Faculté de Médecine".into()),
            domaine_expertise: None,
        }
    }

    fn template() -> ClinicalCase {
        ClinicalCase {
            id: "c1".into(),
            consultation_reason: "Fièvre persistante".into(),
            exam_requests: Arc::new(vec![ExamRequest {
                exam_name: "NFS".into(),
                ..ExamRequest::default()
            }]),
            metadata: Some(Arc::new(CaseMetadata {
                pathologie: "Paludisme".into(),
                niveau_complexite: Some(ComplexityLevel::Intermediaire),
                ..CaseMetadata::default()
            })),
            ..ClinicalCase::default()
        }
    }

    fn workflow() -> AuthoringWorkflow {
        AuthoringWorkflow::new(config(), teacher())
    }

    fn fill_schedule(wf: &mut AuthoringWorkflow) {
        let form = wf.schedule_mut().expect("schedule step");
        form.titre = "TD Paludisme".into();
        form.classe_nom = "L3 Médecine".into();
    }

    fn at_confirm() -> AuthoringWorkflow {
        let mut wf = workflow();
        wf.select_template(&template()).expect("select");
        wf.advance().expect("to customize");
        wf.advance().expect("to schedule");
        fill_schedule(&mut wf);
        wf.advance().expect("to confirm");
        wf
    }

    #[test]
    fn new_workflow_starts_in_select_with_defaults() {
        let wf = workflow();
        assert_eq!(wf.step(), AuthoringStep::Select);
        assert!(wf.working_copy().is_none());
        assert_eq!(wf.schedule().temps_limite_minutes, 30);
        assert_eq!(wf.schedule().penalite_par_minute, 1);
        assert_eq!(wf.schedule().ecole_nom, "Faculté de Médecine");
    }

    #[test]
    fn cannot_leave_select_without_a_working_copy() {
        let mut wf = workflow();
        let err = wf.advance().expect_err("no working copy");
        assert!(matches!(
            err,
            CaseError::Validation(ValidationError::MissingWorkingCopy)
        ));
        assert_eq!(wf.step(), AuthoringStep::Select);
    }

    #[test]
    fn create_from_scratch_moves_to_customize() {
        let mut wf = workflow();
        wf.create_from_scratch().expect("scratch");

        assert_eq!(wf.step(), AuthoringStep::Customize);
        let case = wf.working_copy().expect("working copy");
        assert_eq!(case.domain(), Some("cardiologie"));
        assert_eq!(case.level(), Some(ComplexityLevel::Debutant));
        assert!(wf.source_case_id().is_none());
    }

    #[test]
    fn edits_never_reach_the_template() {
        let source = template();
        let mut wf = workflow();
        wf.select_template(&source).expect("select");
        wf.advance().expect("to customize");

        wf.patch(CasePath::Patient(PatientField::FirstName), "Moussa")
            .expect("patch");
        wf.append_exam("Goutte épaisse").expect("append");
        wf.patch(CasePath::Metadata(MetadataField::Pathologie), "Typhoïde")
            .expect("patch");

        assert_eq!(source, template());
        let copy = wf.working_copy().unwrap();
        assert_eq!(copy.patient.first_name, "Moussa");
        assert_eq!(copy.exam_requests.len(), 2);
        assert_eq!(copy.pathology(), Some("Typhoïde"));
    }

    #[tokio::test]
    async fn copy_on_select_leaves_the_stored_case_unchanged() {
        let repo = InMemoryCaseRepository::with_cases([template()]);
        let mut wf = workflow();
        wf.select_by_id(&repo, "c1").await.expect("select by id");
        wf.advance().expect("to customize");
        wf.patch(CasePath::Parameters(ParameterField::Temperature), "40")
            .expect("patch");
        wf.remove_exam(0).expect("remove");

        let stored = CaseRepository::get(&repo, "c1")
            .await
            .expect("get")
            .expect("case exists");
        assert_eq!(stored, template());
        assert_eq!(wf.working_copy().unwrap().exam_requests.len(), 0);
    }

    #[tokio::test]
    async fn select_by_unknown_id_is_not_found() {
        let repo = InMemoryCaseRepository::new();
        let mut wf = workflow();
        let err = wf.select_by_id(&repo, "zz").await.expect_err("missing");
        assert!(matches!(err, CaseError::NotFound(ref id) if id == "zz"));
        assert!(wf.working_copy().is_none());
    }

    #[test]
    fn edits_are_only_allowed_in_customize() {
        let mut wf = workflow();
        let err = wf.append_exam("NFS").expect_err("select step");
        assert!(matches!(
            err,
            CaseError::InvalidTransition {
                action: WorkflowAction::Edit,
                ..
            }
        ));

        wf.select_template(&template()).expect("select");
        wf.advance().expect("to customize");
        wf.advance().expect("to schedule");
        assert!(wf.add_prescription().is_err());
        assert!(wf.set_view(CustomizeView::Exams).is_err());
    }

    #[test]
    fn schedule_guard_blocks_missing_title() {
        let mut wf = workflow();
        wf.select_template(&template()).expect("select");
        wf.advance().expect("to customize");
        wf.advance().expect("to schedule");
        wf.schedule_mut().unwrap().classe_nom = "L3".into();

        let err = wf.advance().expect_err("missing title");
        assert!(matches!(
            err,
            CaseError::Validation(ValidationError::MissingTitle)
        ));
        assert_eq!(wf.step(), AuthoringStep::Schedule);
    }

    #[test]
    fn schedule_guard_names_each_missing_field() {
        let mut form = ScheduleForm {
            titre: "TD".into(),
            ..ScheduleForm::default()
        };
        assert_eq!(form.validate(), Err(ValidationError::MissingSchoolName));
        form.ecole_nom = "Faculté".into();
        assert_eq!(form.validate(), Err(ValidationError::MissingClassName));
        form.classe_nom = "L1".into();
        assert_eq!(form.validate(), Ok(()));
    }

    #[test]
    fn back_keeps_entered_data() {
        let mut wf = at_confirm();
        assert_eq!(wf.back().expect("back"), AuthoringStep::Schedule);
        assert_eq!(wf.back().expect("back"), AuthoringStep::Customize);
        assert_eq!(wf.back().expect("back"), AuthoringStep::Select);

        assert_eq!(wf.schedule().titre, "TD Paludisme");
        assert_eq!(wf.working_copy().unwrap().id, "c1");

        let err = wf.back().expect_err("no step before select");
        assert!(matches!(
            err,
            CaseError::InvalidTransition {
                action: WorkflowAction::Back,
                ..
            }
        ));
    }

    #[test]
    fn reselecting_a_template_discards_customisation() {
        let mut wf = workflow();
        wf.select_template(&template()).expect("select");
        wf.advance().expect("to customize");
        wf.append_exam("CRP").expect("append");
        wf.back().expect("back to select");

        let other = ClinicalCase {
            id: "c2".into(),
            ..ClinicalCase::default()
        };
        wf.select_template(&other).expect("select other");

        let copy = wf.working_copy().unwrap();
        assert_eq!(copy.id, "c2");
        assert!(copy.exam_requests.is_empty());
        assert_eq!(wf.source_case_id(), Some("c2"));
    }

    #[test]
    fn cannot_advance_past_confirm() {
        let mut wf = at_confirm();
        let err = wf.advance().expect_err("confirm is last");
        assert!(matches!(
            err,
            CaseError::InvalidTransition {
                action: WorkflowAction::Advance,
                ..
            }
        ));
    }

    #[test]
    fn summary_reflects_working_copy_and_schedule() {
        let wf = at_confirm();
        let summary = wf.summary().expect("summary");
        assert_eq!(summary.titre, "TD Paludisme");
        assert_eq!(summary.classe_nom, "L3 Médecine");
        assert_eq!(summary.pathologie.as_deref(), Some("Paludisme"));
        assert_eq!(summary.exam_count, 1);
    }

    #[test]
    fn payload_fills_owner_defaults() {
        let schedule = ScheduleForm {
            titre: "TD".into(),
            ..ScheduleForm::default()
        };
        let payload = build_payload(&schedule, &teacher(), &template());

        assert_eq!(payload.ecole_id, 1);
        assert_eq!(payload.classe_id, 1);
        assert_eq!(payload.ecole_nom, "École par défaut");
        assert_eq!(payload.classe_nom, "Classe par défaut");
        assert_eq!(payload.professeur_id, 42);
        assert_eq!(payload.professeur_nom, "Awa Diallo");
        assert_eq!(payload.temps_limite_minutes, 30);
        assert_eq!(payload.cas_clinique.id, "c1");
    }

    #[tokio::test]
    async fn failed_submission_stays_in_confirm_and_can_retry() {
        let repo = InMemoryCaseRepository::new();
        let mut wf = at_confirm();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _subscription = wf.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        repo.fail_next(RepositoryError::http(500, "Internal Server Error"));
        let err = wf.submit(&repo).await.expect_err("store failed");
        assert!(matches!(err, CaseError::Repository(_)));
        assert_eq!(wf.step(), AuthoringStep::Confirm);
        assert!(!wf.is_finished());
        assert_eq!(wf.schedule().titre, "TD Paludisme");

        let created = wf.submit(&repo).await.expect("retry succeeds");
        assert_eq!(created.titre, "TD Paludisme");
        assert_eq!(created.professeur_nom, "Awa Diallo");
        assert!(wf.is_finished());

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AuthoringEvent::SubmissionFailed(_)));
        assert!(matches!(&events[1], AuthoringEvent::Submitted(p) if p.titre == "TD Paludisme"));
        assert_eq!(repo.school_cases().len(), 1);
    }

    #[tokio::test]
    async fn finished_workflow_refuses_everything() {
        let repo = InMemoryCaseRepository::new();
        let mut wf = at_confirm();
        wf.submit(&repo).await.expect("submitted");

        assert!(matches!(
            wf.submit(&repo).await,
            Err(CaseError::InvalidTransition {
                action: WorkflowAction::Submit,
                ..
            })
        ));
        assert!(wf.back().is_err());
        assert!(wf.advance().is_err());
        assert_eq!(repo.school_cases().len(), 1);
    }

    #[test]
    fn submit_outside_confirm_is_rejected_before_any_call() {
        let wf = workflow();
        assert!(matches!(
            wf.payload(),
            Err(CaseError::InvalidTransition { .. })
        ));
    }
}

//! Nested patch engine.
//!
//! Editors change a case one nested field at a time. Instead of walking arbitrary string paths,
//! every editable field is named by a [`CasePath`], a closed set of typed lenses grouped by the
//! branch they live in. Dotted paths such as `medical_folder_page.parameters.temperature` are
//! still accepted at the edges (REST, CLI) and parsed into a `CasePath`; an unknown path is an
//! [`CaseError::InvalidPath`].
//!
//! [`patch`] never mutates its input. It clones the root (which only bumps the reference counts of
//! the nested branches) and copies-on-write the branches along the path, so every branch outside
//! the path stays shared with the input.

use crate::error::{CaseError, CaseResult};
use crate::model::{
    CaseMetadata, ClinicalCase, ComplexityLevel, MedicalFolderPage, MedicalParameters, Patient,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// Field lenses
// ============================================================================

/// Top-level scalar fields of a case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CaseField {
    ConsultationReason,
    ConsultationNotes,
    ConsultationDate,
    StatePatient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatientField {
    FirstName,
    LastName,
    BirthDate,
    Gender,
    PhoneNumber,
    Address,
    Email,
    Condition,
    Status,
}

/// Free-text fields of the medical folder page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FolderField {
    NurseNote,
    DoctorNote,
    Diagnostic,
}

/// Vitals and history held under `medical_folder_page.parameters`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterField {
    Weight,
    Height,
    Temperature,
    HeartRate,
    BloodPressure,
    ChronicalDiseases,
    Allergies,
    Surgeries,
    CurrentMedication,
    FamilyMedicalHistory,
    SkinAppearance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetadataField {
    Pathologie,
    Domaine,
    NiveauComplexite,
}

impl CaseField {
    pub const ALL: [CaseField; 4] = [
        CaseField::ConsultationReason,
        CaseField::ConsultationNotes,
        CaseField::ConsultationDate,
        CaseField::StatePatient,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CaseField::ConsultationReason => "consultation_reason",
            CaseField::ConsultationNotes => "consultation_notes",
            CaseField::ConsultationDate => "consultation_date",
            CaseField::StatePatient => "state_patient",
        }
    }
}

impl PatientField {
    pub const ALL: [PatientField; 9] = [
        PatientField::FirstName,
        PatientField::LastName,
        PatientField::BirthDate,
        PatientField::Gender,
        PatientField::PhoneNumber,
        PatientField::Address,
        PatientField::Email,
        PatientField::Condition,
        PatientField::Status,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PatientField::FirstName => "first_name",
            PatientField::LastName => "last_name",
            PatientField::BirthDate => "birth_date",
            PatientField::Gender => "gender",
            PatientField::PhoneNumber => "phone_number",
            PatientField::Address => "address",
            PatientField::Email => "email",
            PatientField::Condition => "condition",
            PatientField::Status => "status",
        }
    }
}

impl FolderField {
    pub const ALL: [FolderField; 3] = [
        FolderField::NurseNote,
        FolderField::DoctorNote,
        FolderField::Diagnostic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FolderField::NurseNote => "nurse_note",
            FolderField::DoctorNote => "doctor_note",
            FolderField::Diagnostic => "diagnostic",
        }
    }
}

impl ParameterField {
    pub const ALL: [ParameterField; 11] = [
        ParameterField::Weight,
        ParameterField::Height,
        ParameterField::Temperature,
        ParameterField::HeartRate,
        ParameterField::BloodPressure,
        ParameterField::ChronicalDiseases,
        ParameterField::Allergies,
        ParameterField::Surgeries,
        ParameterField::CurrentMedication,
        ParameterField::FamilyMedicalHistory,
        ParameterField::SkinAppearance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParameterField::Weight => "weight",
            ParameterField::Height => "height",
            ParameterField::Temperature => "temperature",
            ParameterField::HeartRate => "heart_rate",
            ParameterField::BloodPressure => "blood_pressure",
            ParameterField::ChronicalDiseases => "chronical_diseases",
            ParameterField::Allergies => "allergies",
            ParameterField::Surgeries => "surgeries",
            ParameterField::CurrentMedication => "current_medication",
            ParameterField::FamilyMedicalHistory => "family_medical_history",
            ParameterField::SkinAppearance => "skin_appearance",
        }
    }
}

impl MetadataField {
    pub const ALL: [MetadataField; 3] = [
        MetadataField::Pathologie,
        MetadataField::Domaine,
        MetadataField::NiveauComplexite,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetadataField::Pathologie => "pathologie",
            MetadataField::Domaine => "domaine",
            MetadataField::NiveauComplexite => "niveau_complexite",
        }
    }
}

/// A patchable location in a [`ClinicalCase`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CasePath {
    Case(CaseField),
    Patient(PatientField),
    Folder(FolderField),
    Parameters(ParameterField),
    Metadata(MetadataField),
}

const PATIENT_PREFIX: &str = "patient";
const FOLDER_PREFIX: &str = "medical_folder_page";
const PARAMETERS_PREFIX: &str = "medical_folder_page.parameters";
const METADATA_PREFIX: &str = "metadata";

impl CasePath {
    /// Dotted form of the path, as accepted by [`CasePath::from_str`].
    pub fn dotted(self) -> String {
        match self {
            CasePath::Case(f) => f.name().to_string(),
            CasePath::Patient(f) => format!("{PATIENT_PREFIX}.{}", f.name()),
            CasePath::Folder(f) => format!("{FOLDER_PREFIX}.{}", f.name()),
            CasePath::Parameters(f) => format!("{PARAMETERS_PREFIX}.{}", f.name()),
            CasePath::Metadata(f) => format!("{METADATA_PREFIX}.{}", f.name()),
        }
    }
}

impl fmt::Display for CasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

impl FromStr for CasePath {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.trim();
        let invalid = || CaseError::InvalidPath(path.to_string());

        let (prefix, leaf) = match path.rsplit_once('.') {
            Some((prefix, leaf)) => (prefix, leaf),
            None => ("", path),
        };

        let found = match prefix {
            "" => CaseField::ALL
                .into_iter()
                .find(|f| f.name() == leaf)
                .map(CasePath::Case),
            PATIENT_PREFIX => PatientField::ALL
                .into_iter()
                .find(|f| f.name() == leaf)
                .map(CasePath::Patient),
            FOLDER_PREFIX => FolderField::ALL
                .into_iter()
                .find(|f| f.name() == leaf)
                .map(CasePath::Folder),
            PARAMETERS_PREFIX => ParameterField::ALL
                .into_iter()
                .find(|f| f.name() == leaf)
                .map(CasePath::Parameters),
            METADATA_PREFIX => MetadataField::ALL
                .into_iter()
                .find(|f| f.name() == leaf)
                .map(CasePath::Metadata),
            _ => None,
        };

        found.ok_or_else(invalid)
    }
}

// ============================================================================
// Values
// ============================================================================

/// A value written at a [`CasePath`].
///
/// Values usually arrive as the raw text of an input field; numeric leaves parse that text
/// themselves. In JSON a value may be any scalar or `null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl From<&str> for PatchValue {
    fn from(value: &str) -> Self {
        PatchValue::Text(value.to_string())
    }
}

impl From<String> for PatchValue {
    fn from(value: String) -> Self {
        PatchValue::Text(value)
    }
}

impl From<bool> for PatchValue {
    fn from(value: bool) -> Self {
        PatchValue::Bool(value)
    }
}

impl From<f64> for PatchValue {
    fn from(value: f64) -> Self {
        PatchValue::Number(value)
    }
}

impl From<Option<f64>> for PatchValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(PatchValue::Null, PatchValue::Number)
    }
}

impl PatchValue {
    pub(crate) fn into_text(self) -> String {
        match self {
            PatchValue::Text(s) => s,
            PatchValue::Bool(b) => b.to_string(),
            PatchValue::Number(n) => n.to_string(),
            PatchValue::Null => String::new(),
        }
    }

    pub(crate) fn into_optional_text(self) -> Option<String> {
        match self {
            PatchValue::Null => None,
            other => Some(other.into_text()),
        }
    }

    /// Numeric leaves never reject input: unparsable or non-finite values become `None`.
    pub(crate) fn into_number(self) -> Option<f64> {
        let n = match self {
            PatchValue::Number(n) => n,
            PatchValue::Text(s) => s.trim().parse::<f64>().ok()?,
            PatchValue::Bool(_) | PatchValue::Null => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Checkbox semantics: `true`, a non-zero number, or the text `true` / `1` / `on`.
    pub(crate) fn into_bool(self) -> bool {
        match self {
            PatchValue::Bool(b) => b,
            PatchValue::Number(n) => n != 0.0,
            PatchValue::Text(s) => matches!(s.trim(), "true" | "1" | "on"),
            PatchValue::Null => false,
        }
    }
}

// ============================================================================
// Patching
// ============================================================================

/// Return a copy of `record` with the field at `path` set to `value`.
///
/// Missing ancestors along the path (`medical_folder_page`, its `parameters`) are created empty.
/// The first write to any metadata field on a case without metadata starts from
/// [`CaseMetadata::lazy_default`].
///
/// # Errors
///
/// Returns [`CaseError::InvalidValue`] when a complexity level is not one of the known levels.
/// All other fields accept any value.
pub fn patch(
    record: &ClinicalCase,
    path: CasePath,
    value: impl Into<PatchValue>,
) -> CaseResult<ClinicalCase> {
    let value = value.into();
    let mut next = record.clone();

    match path {
        CasePath::Case(field) => set_case_field(&mut next, field, value),
        CasePath::Patient(field) => set_patient_field(Arc::make_mut(&mut next.patient), field, value),
        CasePath::Folder(field) => set_folder_field(folder_page_mut(&mut next), field, value),
        CasePath::Parameters(field) => {
            let page = folder_page_mut(&mut next);
            let params = Arc::make_mut(page.parameters.get_or_insert_with(Arc::default));
            set_parameter_field(params, field, value);
        }
        CasePath::Metadata(field) => {
            let metadata = Arc::make_mut(
                next.metadata
                    .get_or_insert_with(|| Arc::new(CaseMetadata::lazy_default())),
            );
            set_metadata_field(metadata, field, value, path)?;
        }
    }

    Ok(next)
}

/// [`patch`] addressed by a dotted path.
///
/// # Errors
///
/// Returns [`CaseError::InvalidPath`] if `path` names no editable field, or any error of [`patch`].
pub fn patch_str(
    record: &ClinicalCase,
    path: &str,
    value: impl Into<PatchValue>,
) -> CaseResult<ClinicalCase> {
    let path: CasePath = path.parse()?;
    patch(record, path, value)
}

fn folder_page_mut(record: &mut ClinicalCase) -> &mut MedicalFolderPage {
    Arc::make_mut(record.medical_folder_page.get_or_insert_with(Arc::default))
}

fn set_case_field(record: &mut ClinicalCase, field: CaseField, value: PatchValue) {
    match field {
        CaseField::ConsultationReason => record.consultation_reason = value.into_text(),
        CaseField::ConsultationNotes => record.consultation_notes = value.into_optional_text(),
        CaseField::ConsultationDate => record.consultation_date = value.into_text(),
        CaseField::StatePatient => record.state_patient = value.into_text(),
    }
}

fn set_patient_field(patient: &mut Patient, field: PatientField, value: PatchValue) {
    let value = value.into_text();
    match field {
        PatientField::FirstName => patient.first_name = value,
        PatientField::LastName => patient.last_name = value,
        PatientField::BirthDate => patient.birth_date = value,
        PatientField::Gender => patient.gender = value,
        PatientField::PhoneNumber => patient.phone_number = value,
        PatientField::Address => patient.address = value,
        PatientField::Email => patient.email = value,
        PatientField::Condition => patient.condition = value,
        PatientField::Status => patient.status = value,
    }
}

fn set_folder_field(page: &mut MedicalFolderPage, field: FolderField, value: PatchValue) {
    let value = value.into_optional_text();
    match field {
        FolderField::NurseNote => page.nurse_note = value,
        FolderField::DoctorNote => page.doctor_note = value,
        FolderField::Diagnostic => page.diagnostic = value,
    }
}

fn set_parameter_field(params: &mut MedicalParameters, field: ParameterField, value: PatchValue) {
    match field {
        ParameterField::Weight => params.weight = value.into_number(),
        ParameterField::Height => params.height = value.into_number(),
        ParameterField::Temperature => params.temperature = value.into_number(),
        ParameterField::HeartRate => params.heart_rate = value.into_number(),
        ParameterField::BloodPressure => params.blood_pressure = value.into_optional_text(),
        ParameterField::ChronicalDiseases => params.chronical_diseases = value.into_optional_text(),
        ParameterField::Allergies => params.allergies = value.into_optional_text(),
        ParameterField::Surgeries => params.surgeries = value.into_optional_text(),
        ParameterField::CurrentMedication => params.current_medication = value.into_optional_text(),
        ParameterField::FamilyMedicalHistory => {
            params.family_medical_history = value.into_optional_text()
        }
        ParameterField::SkinAppearance => params.skin_appearance = value.into_optional_text(),
    }
}

fn set_metadata_field(
    metadata: &mut CaseMetadata,
    field: MetadataField,
    value: PatchValue,
    path: CasePath,
) -> CaseResult<()> {
    match field {
        MetadataField::Pathologie => metadata.pathologie = value.into_text(),
        MetadataField::Domaine => {
            metadata.domaine = value.into_optional_text().filter(|d| !d.is_empty())
        }
        MetadataField::NiveauComplexite => {
            let text = value.into_text();
            metadata.niveau_complexite = if text.trim().is_empty() {
                None
            } else {
                let level = text
                    .parse::<ComplexityLevel>()
                    .map_err(|reason| CaseError::InvalidValue {
                        path: path.dotted(),
                        reason,
                    })?;
                Some(level)
            };
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExamRequest, Prescription};

    fn sample_case() -> ClinicalCase {
        ClinicalCase {
            id: "c1".into(),
            consultation_reason: "Fièvre".into(),
            patient: Arc::new(Patient {
                first_name: "Awa".into(),
                last_name: "Diallo".into(),
                ..Patient::default()
            }),
            medical_folder_page: Some(Arc::new(MedicalFolderPage {
                diagnostic: Some("Paludisme".into()),
                parameters: Some(Arc::new(MedicalParameters {
                    temperature: Some(39.0),
                    weight: Some(60.0),
                    ..MedicalParameters::default()
                })),
                ..MedicalFolderPage::default()
            })),
            exam_requests: Arc::new(vec![ExamRequest::default()]),
            prescriptions: Arc::new(vec![Prescription::default()]),
            metadata: Some(Arc::new(CaseMetadata {
                pathologie: "Paludisme".into(),
                niveau_complexite: Some(ComplexityLevel::Avance),
                ..CaseMetadata::default()
            })),
            ..ClinicalCase::default()
        }
    }

    #[test]
    fn dotted_paths_parse_into_typed_lenses() {
        assert_eq!(
            "medical_folder_page.parameters.temperature".parse::<CasePath>().unwrap(),
            CasePath::Parameters(ParameterField::Temperature)
        );
        assert_eq!(
            "patient.first_name".parse::<CasePath>().unwrap(),
            CasePath::Patient(PatientField::FirstName)
        );
        assert_eq!(
            "consultation_reason".parse::<CasePath>().unwrap(),
            CasePath::Case(CaseField::ConsultationReason)
        );
    }

    #[test]
    fn every_lens_round_trips_through_its_dotted_form() {
        let all = CaseField::ALL
            .into_iter()
            .map(CasePath::Case)
            .chain(PatientField::ALL.into_iter().map(CasePath::Patient))
            .chain(FolderField::ALL.into_iter().map(CasePath::Folder))
            .chain(ParameterField::ALL.into_iter().map(CasePath::Parameters))
            .chain(MetadataField::ALL.into_iter().map(CasePath::Metadata));

        for path in all {
            assert_eq!(path.dotted().parse::<CasePath>().unwrap(), path);
        }
    }

    #[test]
    fn unknown_paths_are_rejected() {
        for bad in ["", "patient", "patient.age", "metadata.pathologie.x", "id", "medical_folder_page.parameters"] {
            let err = bad.parse::<CasePath>().expect_err(bad);
            assert!(matches!(err, CaseError::InvalidPath(_)), "{bad}");
        }
    }

    #[test]
    fn patch_leaves_input_untouched() {
        let original = sample_case();
        let snapshot = original.clone();

        let patched = patch_str(&original, "medical_folder_page.parameters.temperature", "38.2")
            .expect("patch should succeed");

        assert_eq!(original, snapshot);
        let params = patched
            .medical_folder_page
            .as_ref()
            .and_then(|p| p.parameters.as_ref())
            .unwrap();
        assert_eq!(params.temperature, Some(38.2));
        assert_eq!(params.weight, Some(60.0));
    }

    #[test]
    fn untouched_branches_are_shared_by_reference() {
        let original = sample_case();
        let patched = patch(&original, CasePath::Patient(PatientField::FirstName), "Fatou")
            .expect("patch should succeed");

        assert!(!Arc::ptr_eq(&original.patient, &patched.patient));
        assert!(Arc::ptr_eq(&original.exam_requests, &patched.exam_requests));
        assert!(Arc::ptr_eq(&original.prescriptions, &patched.prescriptions));
        assert!(Arc::ptr_eq(
            original.medical_folder_page.as_ref().unwrap(),
            patched.medical_folder_page.as_ref().unwrap()
        ));
        assert!(Arc::ptr_eq(
            original.metadata.as_ref().unwrap(),
            patched.metadata.as_ref().unwrap()
        ));
        assert_eq!(patched.patient.last_name, "Diallo");
    }

    #[test]
    fn parameter_patch_shares_everything_outside_the_folder_page() {
        let original = sample_case();
        let patched = patch(&original, CasePath::Parameters(ParameterField::HeartRate), 88.0)
            .expect("patch should succeed");

        assert!(Arc::ptr_eq(&original.patient, &patched.patient));
        assert!(Arc::ptr_eq(&original.consultation_type, &patched.consultation_type));
        assert!(!Arc::ptr_eq(
            original.medical_folder_page.as_ref().unwrap(),
            patched.medical_folder_page.as_ref().unwrap()
        ));
        assert_eq!(
            patched.medical_folder_page.as_ref().unwrap().diagnostic.as_deref(),
            Some("Paludisme")
        );
    }

    #[test]
    fn missing_ancestors_are_created() {
        let bare = ClinicalCase {
            id: "c1".into(),
            ..ClinicalCase::default()
        };
        let patched = patch(&bare, CasePath::Parameters(ParameterField::Weight), "72")
            .expect("patch should succeed");

        let page = patched.medical_folder_page.expect("page created");
        assert_eq!(page.diagnostic, None);
        assert_eq!(page.parameters.as_ref().unwrap().weight, Some(72.0));
    }

    #[test]
    fn unparsable_numbers_are_stored_as_absent() {
        let original = sample_case();
        let patched = patch(&original, CasePath::Parameters(ParameterField::Temperature), "abc")
            .expect("numeric leaves never fail");
        let params = patched.medical_folder_page.unwrap().parameters.clone().unwrap();
        assert_eq!(params.temperature, None);

        let patched = patch(&original, CasePath::Parameters(ParameterField::Weight), f64::NAN)
            .expect("numeric leaves never fail");
        let params = patched.medical_folder_page.unwrap().parameters.clone().unwrap();
        assert_eq!(params.weight, None);
    }

    #[test]
    fn first_metadata_write_materialises_defaults() {
        let bare = ClinicalCase {
            id: "c1".into(),
            ..ClinicalCase::default()
        };
        let patched = patch_str(&bare, "metadata.pathologie", "Grippe").expect("patch should succeed");

        let metadata = patched.metadata.expect("metadata created");
        assert_eq!(metadata.pathologie, "Grippe");
        assert_eq!(metadata.niveau_complexite, Some(ComplexityLevel::Debutant));
    }

    #[test]
    fn existing_metadata_is_not_reset() {
        let original = sample_case();
        let patched = patch(&original, CasePath::Metadata(MetadataField::Domaine), "pediatrie")
            .expect("patch should succeed");

        let metadata = patched.metadata.unwrap();
        assert_eq!(metadata.niveau_complexite, Some(ComplexityLevel::Avance));
        assert_eq!(metadata.domaine.as_deref(), Some("pediatrie"));
    }

    #[test]
    fn complexity_level_must_be_known() {
        let original = sample_case();
        let err = patch(&original, CasePath::Metadata(MetadataField::NiveauComplexite), "expert")
            .expect_err("unknown level");
        assert!(matches!(err, CaseError::InvalidValue { ref path, .. } if path == "metadata.niveau_complexite"));

        let patched = patch(&original, CasePath::Metadata(MetadataField::NiveauComplexite), "")
            .expect("empty clears the level");
        assert_eq!(patched.metadata.unwrap().niveau_complexite, None);
    }

    #[test]
    fn patch_values_deserialize_from_any_json_scalar() {
        let values: Vec<PatchValue> = serde_json::from_str(r#"[true, 37.5, "texte", null]"#).unwrap();
        assert_eq!(
            values,
            vec![
                PatchValue::Bool(true),
                PatchValue::Number(37.5),
                PatchValue::Text("texte".into()),
                PatchValue::Null
            ]
        );
    }
}

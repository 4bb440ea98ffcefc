//! Clinical case aggregate.
//!
//! A [`ClinicalCase`] is the JSON document exchanged with the case repository. Field names match
//! that document exactly, which is why some of them are French.
//!
//! Every nested branch is held behind an [`Arc`]. Cloning a case is therefore cheap and the
//! clone shares every branch with its source until one of them is written through
//! [`Arc::make_mut`], which copies just that branch. This is what lets the patch engine and the
//! collection editor return new records that share untouched branches by reference while never
//! mutating their input.

use crate::constants::FALLBACK_DOMAIN;
use crate::error::{CaseError, CaseResult};
use crate::model::{now_timestamp, null_as_default};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// Aggregate root
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalCase {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consultation_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consultation_price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consultation_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultation_notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payment_status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state_patient: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consultation_type: Arc<ConsultationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_staff_giver: Option<Arc<MedicalStaff>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_staff_sender: Option<Arc<MedicalStaff>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub patient: Arc<Patient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_folder_page: Option<Arc<MedicalFolderPage>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam_requests: Arc<Vec<ExamRequest>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prescriptions: Arc<Vec<Prescription>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hospitalisations: Arc<Vec<Hospitalisation>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bill_items: Arc<Vec<BillItem>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub appointments: Arc<Vec<Appointment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Arc<CaseMetadata>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsultationType {
    #[serde(default, deserialize_with = "null_as_default")]
    pub type_doctor: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalStaff {
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
}

// ============================================================================
// Patient
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub add_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gender: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub birth_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub condition: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_folder: Option<MedicalFolder>,
}

impl Patient {
    /// Age in whole calendar years at `today`, as shown on case cards.
    ///
    /// Only the year is compared, so a patient born late in the year is counted one year older
    /// until their birthday. Returns `None` when `birth_date` does not start with `YYYY-MM-DD`.
    pub fn age_in_years(&self, today: NaiveDate) -> Option<i32> {
        let date_part = self.birth_date.split('T').next()?.trim();
        let birth = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
        Some(today.year() - birth.year())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalFolder {
    #[serde(default, deserialize_with = "null_as_default")]
    pub create_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_modification_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub folder_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_closed: bool,
}

// ============================================================================
// Medical folder page
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalFolderPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nurse_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Arc<MedicalParameters>>,
}

/// Vitals and history. Numeric vitals are `None` when unknown or when the entered text did not
/// parse as a number.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chronical_diseases: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surgeries: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_medication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_medical_history: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin_appearance: Option<String>,
}

// ============================================================================
// Exams
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub add_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam: Exam,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<ExamResult>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam_cost: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exam_description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub add_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_file: Option<String>,
}

// ============================================================================
// Prescriptions
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    #[serde(default, deserialize_with = "null_as_default")]
    pub add_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Drug lines owned by this prescription only.
    #[serde(default, deserialize_with = "null_as_default")]
    pub drugs: Vec<Drug>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Drug {
    #[serde(default, deserialize_with = "null_as_default")]
    pub quantity: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dosage: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub instructions: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub frequency: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub medicament: Medicament,
}

impl Default for Drug {
    /// A blank drug line: one unit of an unnamed medicament.
    fn default() -> Self {
        Self {
            quantity: 1,
            dosage: String::new(),
            instructions: String::new(),
            frequency: String::new(),
            duration: String::new(),
            medicament: Medicament::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Medicament {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_stock: i64,
}

// ============================================================================
// Hospitalisations, billing, appointments
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Hospitalisation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub at_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bed_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payment_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub room: Room,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Room {
    #[serde(default, deserialize_with = "null_as_default")]
    pub room_label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub beds: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub busy_beds: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub room_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub quantity: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unity_price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub designation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bill: Bill,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    #[serde(default, deserialize_with = "null_as_default")]
    pub bill_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub amount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_accounted: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub at_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

// ============================================================================
// Pedagogical metadata
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub pathologie: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domaine: Option<String>,
    /// `None` means unclassified. Unknown values read from the store are treated as unclassified.
    #[serde(
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub niveau_complexite: Option<ComplexityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preuve_integrite: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub cas_type: Option<CaseType>,
}

impl CaseMetadata {
    /// Metadata materialised the first time a metadata field is written on a case without any.
    pub fn lazy_default() -> Self {
        Self {
            pathologie: String::new(),
            niveau_complexite: Some(ComplexityLevel::Debutant),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Debutant,
    Intermediaire,
    Avance,
}

impl ComplexityLevel {
    pub const ALL: [ComplexityLevel; 3] = [
        ComplexityLevel::Debutant,
        ComplexityLevel::Intermediaire,
        ComplexityLevel::Avance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComplexityLevel::Debutant => "debutant",
            ComplexityLevel::Intermediaire => "intermediaire",
            ComplexityLevel::Avance => "avance",
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            ComplexityLevel::Debutant => "Débutant",
            ComplexityLevel::Intermediaire => "Intermédiaire",
            ComplexityLevel::Avance => "Avancé",
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplexityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "debutant" => Ok(ComplexityLevel::Debutant),
            "intermediaire" => Ok(ComplexityLevel::Intermediaire),
            "avance" => Ok(ComplexityLevel::Avance),
            other => Err(format!(
                "'{other}' is not one of debutant, intermediaire, avance"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseType {
    Clinique,
    Ecole,
}

impl CaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseType::Clinique => "clinique",
            CaseType::Ecole => "ecole",
        }
    }
}

impl FromStr for CaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "clinique" => Ok(CaseType::Clinique),
            "ecole" => Ok(CaseType::Ecole),
            other => Err(format!("'{other}' is not one of clinique, ecole")),
        }
    }
}

/// Read an optional enum from a string, mapping unknown values to `None`.
fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match s.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(value = %s, "unrecognised metadata value read as unclassified");
            None
        }
    }))
}

// ============================================================================
// Construction and parsing
// ============================================================================

impl ClinicalCase {
    /// Parse a case document.
    ///
    /// Uses `serde_path_to_error` so a mismatch reports where it happened
    /// (e.g. `prescriptions[0].drugs[1].quantity`).
    pub fn from_json(json: &str) -> CaseResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
            let path = err.path().to_string();
            let path = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            CaseError::Deserialization {
                path,
                source: err.into_inner(),
            }
        })
    }

    /// Synthesize a minimal, complete case to author from scratch.
    ///
    /// Vitals start at a physiological baseline (37 °C, 120/80, 70 bpm, 70 kg), every collection
    /// is empty and metadata is tagged with `domain` (or a generic tag when `None`) at the
    /// beginner level. Identifiers are freshly generated.
    pub fn from_scratch(domain: Option<&str>) -> Self {
        let now = now_timestamp();
        let token = uuid::Uuid::new_v4().simple().to_string();
        let birth_date = now.split('T').next().unwrap_or_default().to_string();

        Self {
            id: format!("new-{token}"),
            consultation_date: now.clone(),
            consultation_price: 0.0,
            consultation_reason: String::new(),
            consultation_notes: Some(String::new()),
            payment_status: "paid".into(),
            state: "completed".into(),
            state_patient: "stable".into(),
            consultation_type: Arc::new(ConsultationType {
                type_doctor: "Généraliste".into(),
                price: 0.0,
            }),
            medical_staff_giver: None,
            medical_staff_sender: None,
            patient: Arc::new(Patient {
                id: format!("p-{token}"),
                add_date: now,
                first_name: "Nouveau".into(),
                last_name: "Patient".into(),
                gender: "Masculin".into(),
                birth_date,
                condition: "stable".into(),
                status: "active".into(),
                ..Patient::default()
            }),
            medical_folder_page: Some(Arc::new(MedicalFolderPage {
                diagnostic: Some(String::new()),
                doctor_note: Some(String::new()),
                nurse_note: Some(String::new()),
                parameters: Some(Arc::new(MedicalParameters {
                    temperature: Some(37.0),
                    blood_pressure: Some("120/80".into()),
                    heart_rate: Some(70.0),
                    weight: Some(70.0),
                    chronical_diseases: Some(String::new()),
                    allergies: Some(String::new()),
                    current_medication: Some(String::new()),
                    family_medical_history: Some(String::new()),
                    ..MedicalParameters::default()
                })),
                ..MedicalFolderPage::default()
            })),
            exam_requests: Arc::default(),
            prescriptions: Arc::default(),
            hospitalisations: Arc::default(),
            bill_items: Arc::default(),
            appointments: Arc::default(),
            metadata: Some(Arc::new(CaseMetadata {
                pathologie: String::new(),
                domaine: Some(domain.unwrap_or(FALLBACK_DOMAIN).to_string()),
                niveau_complexite: Some(ComplexityLevel::Debutant),
                ..CaseMetadata::default()
            })),
        }
    }

    pub fn pathology(&self) -> Option<&str> {
        self.metadata
            .as_deref()
            .map(|m| m.pathologie.as_str())
            .filter(|p| !p.is_empty())
    }

    pub fn domain(&self) -> Option<&str> {
        self.metadata.as_deref().and_then(|m| m.domaine.as_deref())
    }

    pub fn level(&self) -> Option<ComplexityLevel> {
        self.metadata.as_deref().and_then(|m| m.niveau_complexite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_accepts_minimal_document() {
        let case = ClinicalCase::from_json(r#"{"id":"c1","exam_requests":[]}"#)
            .expect("minimal case should parse");
        assert_eq!(case.id, "c1");
        assert!(case.exam_requests.is_empty());
        assert!(case.metadata.is_none());
        assert!(case.medical_folder_page.is_none());
    }

    #[test]
    fn from_json_reports_the_failing_path() {
        let json = r#"{"id":"c1","prescriptions":[{"drugs":[{"quantity":"two"}]}]}"#;
        let err = ClinicalCase::from_json(json).expect_err("quantity is not a number");
        match err {
            CaseError::Deserialization { path, .. } => {
                assert_eq!(path, "prescriptions[0].drugs[0].quantity");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn null_fields_read_as_their_defaults() {
        let json = r#"{
            "id": "c1",
            "consultation_reason": null,
            "payment_status": null,
            "consultation_type": null,
            "patient": {"first_name": "Awa", "last_name": null},
            "exam_requests": null,
            "prescriptions": [{"add_date": null, "drugs": [{"quantity": null, "dosage": "500mg"}]}],
            "hospitalisations": [{"is_active": null, "room": {"type": null, "beds": null}}],
            "metadata": {"pathologie": null, "niveau_complexite": "avance"}
        }"#;
        let case = ClinicalCase::from_json(json).expect("null fields are tolerated");

        assert_eq!(case.consultation_reason, "");
        assert_eq!(case.payment_status, "");
        assert_eq!(case.patient.first_name, "Awa");
        assert_eq!(case.patient.last_name, "");
        assert!(case.exam_requests.is_empty());
        let drug = &case.prescriptions[0].drugs[0];
        assert_eq!(drug.quantity, 0);
        assert_eq!(drug.dosage, "500mg");
        assert!(!case.hospitalisations[0].is_active);
        assert_eq!(case.hospitalisations[0].room.room_type, "");
        assert_eq!(case.pathology(), None);
        assert_eq!(case.level(), Some(ComplexityLevel::Avance));
    }

    #[test]
    fn unknown_complexity_level_reads_as_unclassified() {
        let json = r#"{"id":"c1","metadata":{"pathologie":"Grippe","niveau_complexite":"expert"}}"#;
        let case = ClinicalCase::from_json(json).expect("case should parse");
        let metadata = case.metadata.expect("metadata present");
        assert_eq!(metadata.pathologie, "Grippe");
        assert_eq!(metadata.niveau_complexite, None);
    }

    #[test]
    fn room_type_uses_the_wire_name() {
        let json = serde_json::to_value(Room {
            room_type: "Standard".into(),
            ..Room::default()
        })
        .unwrap();
        assert_eq!(json["type"], "Standard");
    }

    #[test]
    fn from_scratch_has_baseline_vitals_and_empty_collections() {
        let case = ClinicalCase::from_scratch(Some("cardiologie"));
        assert!(case.id.starts_with("new-"));
        let params = case
            .medical_folder_page
            .as_ref()
            .and_then(|p| p.parameters.as_ref())
            .expect("parameters present");
        assert_eq!(params.temperature, Some(37.0));
        assert_eq!(params.blood_pressure.as_deref(), Some("120/80"));
        assert_eq!(params.heart_rate, Some(70.0));
        assert_eq!(params.weight, Some(70.0));
        assert!(case.exam_requests.is_empty());
        assert!(case.prescriptions.is_empty());
        assert!(case.hospitalisations.is_empty());
        assert_eq!(case.domain(), Some("cardiologie"));
        assert_eq!(case.level(), Some(ComplexityLevel::Debutant));
    }

    #[test]
    fn from_scratch_generates_distinct_ids() {
        let a = ClinicalCase::from_scratch(None);
        let b = ClinicalCase::from_scratch(None);
        assert_ne!(a.id, b.id);
        assert_eq!(a.domain(), Some(FALLBACK_DOMAIN));
    }

    #[test]
    fn age_compares_calendar_years() {
        let patient = Patient {
            birth_date: "1990-11-30T00:00:00.000Z".into(),
            ..Patient::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(patient.age_in_years(today), Some(34));

        let unknown = Patient {
            birth_date: "inconnue".into(),
            ..Patient::default()
        };
        assert_eq!(unknown.age_in_years(today), None);
    }
}

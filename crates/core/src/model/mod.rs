//! Case documents exchanged with the repositories.

pub mod clinical_case;
pub mod school_case;

pub use clinical_case::{
    Appointment, Bill, BillItem, CaseMetadata, CaseType, ClinicalCase, ComplexityLevel,
    ConsultationType, Drug, Exam, ExamRequest, ExamResult, Hospitalisation, MedicalFolder,
    MedicalFolderPage, MedicalParameters, MedicalStaff, Medicament, Patient, Prescription, Room,
};
pub use school_case::{
    CasEcole, CreateCasEcoleFromCasePayload, CreateCasEcolePayload, Teacher,
    UpdateCasEcolePayload,
};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};

/// Read a field the store may send as `null`, falling back to the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Current instant as an ISO-8601 UTC timestamp with millisecond precision
/// (e.g. `2024-03-01T09:30:00.000Z`).
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_has_millis_and_zulu_suffix() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'), "{ts}");
        let fraction = ts
            .split('.')
            .nth(1)
            .expect("timestamp should have a fractional part");
        assert_eq!(fraction.len(), 4, "{ts}");
    }
}

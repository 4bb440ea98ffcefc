//! Case collection editor.
//!
//! Append, remove and field-level edits over the ordered lists of a case: exam requests,
//! prescriptions (with their drug lines) and hospitalisations. Items are addressed by position.
//!
//! Every operation takes the current record and returns a new one. Only the touched list is
//! copied; all other branches stay shared with the input. An out-of-range index, or a blank exam
//! name, yields a record equal to the input.

use crate::constants::{DEFAULT_ROOM_TYPE, EXAM_STATUS_PENDING, PAYMENT_STATUS_PENDING};
use crate::model::{
    now_timestamp, ClinicalCase, Drug, Exam, ExamRequest, Hospitalisation, Prescription, Room,
};
use crate::patch::PatchValue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Exam requests
// ============================================================================

/// Append a pending exam request named `exam_name` (trimmed).
///
/// A blank name is ignored.
pub fn append_exam(record: &ClinicalCase, exam_name: &str) -> ClinicalCase {
    let name = exam_name.trim();
    if name.is_empty() {
        tracing::debug!("blank exam name; no exam appended");
        return record.clone();
    }

    let mut next = record.clone();
    Arc::make_mut(&mut next.exam_requests).push(ExamRequest {
        add_date: now_timestamp(),
        exam_name: name.to_string(),
        exam_status: EXAM_STATUS_PENDING.to_string(),
        notes: None,
        exam: Exam {
            exam_name: name.to_string(),
            exam_cost: 0.0,
            exam_description: String::new(),
        },
        results: Vec::new(),
    });
    next
}

pub fn remove_exam(record: &ClinicalCase, index: usize) -> ClinicalCase {
    remove_at(record, index, "exam_requests", |c| &mut c.exam_requests)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamRequestField {
    Notes,
    ExamStatus,
    ExamDescription,
    /// Unparsable costs are stored as zero.
    ExamCost,
}

pub fn update_exam(
    record: &ClinicalCase,
    index: usize,
    field: ExamRequestField,
    value: impl Into<PatchValue>,
) -> ClinicalCase {
    let value = value.into();
    update_at(record, index, "exam_requests", |c| &mut c.exam_requests, |exam| match field {
        ExamRequestField::Notes => exam.notes = value.into_optional_text(),
        ExamRequestField::ExamStatus => exam.exam_status = value.into_text(),
        ExamRequestField::ExamDescription => exam.exam.exam_description = value.into_text(),
        ExamRequestField::ExamCost => exam.exam.exam_cost = value.into_number().unwrap_or(0.0),
    })
}

// ============================================================================
// Prescriptions and drug lines
// ============================================================================

/// Append an empty prescription dated now.
pub fn add_prescription(record: &ClinicalCase) -> ClinicalCase {
    let mut next = record.clone();
    Arc::make_mut(&mut next.prescriptions).push(Prescription {
        add_date: now_timestamp(),
        note: None,
        drugs: Vec::new(),
    });
    next
}

pub fn remove_prescription(record: &ClinicalCase, index: usize) -> ClinicalCase {
    remove_at(record, index, "prescriptions", |c| &mut c.prescriptions)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionField {
    Note,
}

pub fn update_prescription(
    record: &ClinicalCase,
    index: usize,
    field: PrescriptionField,
    value: impl Into<PatchValue>,
) -> ClinicalCase {
    let value = value.into();
    update_at(record, index, "prescriptions", |c| &mut c.prescriptions, |p| match field {
        PrescriptionField::Note => p.note = value.into_optional_text(),
    })
}

/// Append a blank drug line ([`Drug::default`]) to the prescription at `prescription_index`.
pub fn add_drug_line(record: &ClinicalCase, prescription_index: usize) -> ClinicalCase {
    update_at(
        record,
        prescription_index,
        "prescriptions",
        |c| &mut c.prescriptions,
        |p| p.drugs.push(Drug::default()),
    )
}

/// Remove one drug line. Either index out of range leaves the record as it is.
pub fn remove_drug_line(
    record: &ClinicalCase,
    prescription_index: usize,
    drug_index: usize,
) -> ClinicalCase {
    let in_range = record
        .prescriptions
        .get(prescription_index)
        .is_some_and(|p| drug_index < p.drugs.len());
    if !in_range {
        tracing::debug!(prescription_index, drug_index, "drug line out of range; nothing removed");
        return record.clone();
    }

    update_at(
        record,
        prescription_index,
        "prescriptions",
        |c| &mut c.prescriptions,
        |p| {
            p.drugs.remove(drug_index);
        },
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrugField {
    MedicamentName,
    Dosage,
    Frequency,
    Duration,
    Instructions,
    /// Whole units. Anything that does not parse as an integer is stored as zero.
    Quantity,
}

pub fn update_drug_line(
    record: &ClinicalCase,
    prescription_index: usize,
    drug_index: usize,
    field: DrugField,
    value: impl Into<PatchValue>,
) -> ClinicalCase {
    let in_range = record
        .prescriptions
        .get(prescription_index)
        .is_some_and(|p| drug_index < p.drugs.len());
    if !in_range {
        tracing::debug!(prescription_index, drug_index, "drug line out of range; nothing updated");
        return record.clone();
    }

    let value = value.into();
    update_at(
        record,
        prescription_index,
        "prescriptions",
        |c| &mut c.prescriptions,
        |p| {
            let drug = &mut p.drugs[drug_index];
            match field {
                DrugField::MedicamentName => drug.medicament.name = value.into_text(),
                DrugField::Dosage => drug.dosage = value.into_text(),
                DrugField::Frequency => drug.frequency = value.into_text(),
                DrugField::Duration => drug.duration = value.into_text(),
                DrugField::Instructions => drug.instructions = value.into_text(),
                DrugField::Quantity => drug.quantity = parse_quantity(value),
            }
        },
    )
}

fn parse_quantity(value: PatchValue) -> i64 {
    match value {
        PatchValue::Number(n) if n.is_finite() => n.trunc() as i64,
        PatchValue::Text(s) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

// ============================================================================
// Hospitalisations
// ============================================================================

/// Append an active, unpaid hospitalisation in a one-bed standard room.
pub fn add_hospitalisation(record: &ClinicalCase) -> ClinicalCase {
    let mut next = record.clone();
    Arc::make_mut(&mut next.hospitalisations).push(Hospitalisation {
        at_date: now_timestamp(),
        bed_label: String::new(),
        note: None,
        is_active: true,
        payment_status: PAYMENT_STATUS_PENDING.to_string(),
        remove_at: None,
        room: Room {
            room_label: String::new(),
            beds: 1,
            busy_beds: 0,
            price: 0.0,
            room_type: DEFAULT_ROOM_TYPE.to_string(),
        },
    });
    next
}

pub fn remove_hospitalisation(record: &ClinicalCase, index: usize) -> ClinicalCase {
    remove_at(record, index, "hospitalisations", |c| &mut c.hospitalisations)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HospitalisationField {
    BedLabel,
    Note,
    IsActive,
    PaymentStatus,
    RoomLabel,
    RoomType,
    /// Unparsable prices are stored as zero.
    RoomPrice,
}

pub fn update_hospitalisation(
    record: &ClinicalCase,
    index: usize,
    field: HospitalisationField,
    value: impl Into<PatchValue>,
) -> ClinicalCase {
    let value = value.into();
    update_at(record, index, "hospitalisations", |c| &mut c.hospitalisations, |h| match field {
        HospitalisationField::BedLabel => h.bed_label = value.into_text(),
        HospitalisationField::Note => h.note = value.into_optional_text(),
        HospitalisationField::IsActive => h.is_active = value.into_bool(),
        HospitalisationField::PaymentStatus => h.payment_status = value.into_text(),
        HospitalisationField::RoomLabel => h.room.room_label = value.into_text(),
        HospitalisationField::RoomType => h.room.room_type = value.into_text(),
        HospitalisationField::RoomPrice => h.room.price = value.into_number().unwrap_or(0.0),
    })
}

// ============================================================================
// Positional helpers
// ============================================================================

fn remove_at<T: Clone>(
    record: &ClinicalCase,
    index: usize,
    list_name: &'static str,
    list: impl FnOnce(&mut ClinicalCase) -> &mut Arc<Vec<T>>,
) -> ClinicalCase {
    let mut next = record.clone();
    let items = list(&mut next);
    if index >= items.len() {
        tracing::debug!(list = list_name, index, len = items.len(), "index out of range; nothing removed");
        return next;
    }
    Arc::make_mut(items).remove(index);
    next
}

fn update_at<T: Clone>(
    record: &ClinicalCase,
    index: usize,
    list_name: &'static str,
    list: impl FnOnce(&mut ClinicalCase) -> &mut Arc<Vec<T>>,
    edit: impl FnOnce(&mut T),
) -> ClinicalCase {
    let mut next = record.clone();
    let items = list(&mut next);
    if index >= items.len() {
        tracing::debug!(list = list_name, index, len = items.len(), "index out of range; nothing updated");
        return next;
    }
    edit(&mut Arc::make_mut(items)[index]);
    next
}

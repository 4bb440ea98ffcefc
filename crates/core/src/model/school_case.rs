//! School cases ("cas d'école").
//!
//! A school case embeds a value copy of a [`ClinicalCase`] together with the scheduling rules of a
//! classroom assignment. The embedded case is not a reference: deleting or editing the source case
//! never affects a school case created from it.

use crate::model::clinical_case::ClinicalCase;
use crate::model::null_as_default;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CasEcole {
    pub id: String,
    pub titre: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ecole_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ecole_nom: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub classe_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub classe_nom: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub professeur_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub professeur_nom: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub professeur_email: String,
    pub cas_clinique: ClinicalCase,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temps_limite_minutes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub penalite_par_minute: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actif: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date_creation: String,
}

/// Creation request carrying a full, customised case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateCasEcolePayload {
    pub titre: String,
    pub ecole_id: i64,
    pub ecole_nom: String,
    pub classe_id: i64,
    pub classe_nom: String,
    pub professeur_id: i64,
    pub professeur_nom: String,
    pub professeur_email: String,
    pub cas_clinique: ClinicalCase,
    pub temps_limite_minutes: u32,
    pub penalite_par_minute: u32,
}

/// Creation request referencing a stored case by id. The store copies the case server-side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCasEcoleFromCasePayload {
    pub cas_clinique_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titre: Option<String>,
    pub ecole_id: i64,
    pub ecole_nom: String,
    pub classe_id: i64,
    pub classe_nom: String,
    pub professeur_id: i64,
    pub professeur_nom: String,
    pub professeur_email: String,
    pub temps_limite_minutes: u32,
    pub penalite_par_minute: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCasEcolePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temps_limite_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalite_par_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actif: Option<bool>,
}

impl UpdateCasEcolePayload {
    pub fn is_empty(&self) -> bool {
        self.titre.is_none()
            && self.temps_limite_minutes.is_none()
            && self.penalite_par_minute.is_none()
            && self.actif.is_none()
    }

    /// Apply the present fields to `target`, leaving the others untouched.
    pub fn apply_to(&self, target: &mut CasEcole) {
        if let Some(titre) = &self.titre {
            target.titre = titre.clone();
        }
        if let Some(minutes) = self.temps_limite_minutes {
            target.temps_limite_minutes = minutes;
        }
        if let Some(penalty) = self.penalite_par_minute {
            target.penalite_par_minute = penalty;
        }
        if let Some(actif) = self.actif {
            target.actif = actif;
        }
    }
}

/// The authenticated teacher authoring a school case.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub prenom: String,
    pub nom: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etablissement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domaine_expertise: Option<String>,
}

impl Teacher {
    /// Display name as stored on school cases: first name then last name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.prenom, self.nom).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_payload_applies_only_present_fields() {
        let mut school_case = CasEcole {
            id: "s1".into(),
            titre: "Ancien".into(),
            ecole_id: 1,
            ecole_nom: "École".into(),
            classe_id: 1,
            classe_nom: "L3".into(),
            professeur_id: 7,
            professeur_nom: "Awa Diallo".into(),
            professeur_email: "awa@example.org".into(),
            cas_clinique: ClinicalCase::default(),
            temps_limite_minutes: 30,
            penalite_par_minute: 1,
            actif: true,
            date_creation: String::new(),
        };

        let update = UpdateCasEcolePayload {
            titre: Some("Nouveau".into()),
            actif: Some(false),
            ..UpdateCasEcolePayload::default()
        };
        assert!(!update.is_empty());
        update.apply_to(&mut school_case);

        assert_eq!(school_case.titre, "Nouveau");
        assert!(!school_case.actif);
        assert_eq!(school_case.temps_limite_minutes, 30);
    }

    #[test]
    fn update_payload_serializes_without_absent_fields() {
        let update = UpdateCasEcolePayload {
            penalite_par_minute: Some(2),
            ..UpdateCasEcolePayload::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "penalite_par_minute": 2 }));
    }

    #[test]
    fn school_case_tolerates_null_fields() {
        let json = r#"{
            "id": "se1",
            "titre": "Paludisme grave",
            "ecole_nom": null,
            "classe_id": null,
            "cas_clinique": {"id": "c1", "consultation_reason": null},
            "actif": null
        }"#;
        let school_case: CasEcole = serde_json::from_str(json).expect("null fields are tolerated");
        assert_eq!(school_case.ecole_nom, "");
        assert_eq!(school_case.classe_id, 0);
        assert!(!school_case.actif);
        assert_eq!(school_case.cas_clinique.id, "c1");
    }

    #[test]
    fn teacher_full_name_is_first_then_last() {
        let teacher = Teacher {
            id: 3,
            prenom: "Awa".into(),
            nom: "Diallo".into(),
            ..Teacher::default()
        };
        assert_eq!(teacher.full_name(), "Awa Diallo");
    }
}

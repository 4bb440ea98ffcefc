//! Browsing helpers over a list of cases: search, facets, visibility and export.

use crate::constants::{COMMON_PATHOLOGIES, GENERAL_MEDICINE_DOMAIN};
use crate::error::{CaseError, CaseResult};
use crate::model::{ClinicalCase, ComplexityLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;

/// Client-side narrowing of a case list.
///
/// `search` matches case-insensitively against the pathology and the consultation reason; domain
/// and level must match exactly when set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub domaine: Option<String>,
    #[serde(default)]
    pub niveau: Option<ComplexityLevel>,
}

impl CaseQuery {
    pub fn matches(&self, case: &ClinicalCase) -> bool {
        let needle = self.search.trim().to_lowercase();
        let search_ok = needle.is_empty()
            || case
                .pathology()
                .unwrap_or_default()
                .to_lowercase()
                .contains(&needle)
            || case.consultation_reason.to_lowercase().contains(&needle);
        let domain_ok = self
            .domaine
            .as_deref()
            .filter(|d| !d.is_empty())
            .map_or(true, |d| case.domain() == Some(d));
        let level_ok = self.niveau.map_or(true, |n| case.level() == Some(n));

        search_ok && domain_ok && level_ok
    }

    pub fn apply<'a>(&self, cases: &'a [ClinicalCase]) -> Vec<&'a ClinicalCase> {
        cases.iter().filter(|c| self.matches(c)).collect()
    }
}

/// Distinct non-empty pathologies, sorted.
pub fn available_pathologies(cases: &[ClinicalCase]) -> Vec<String> {
    cases
        .iter()
        .filter_map(ClinicalCase::pathology)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct complexity levels in use, from beginner to advanced.
pub fn available_levels(cases: &[ClinicalCase]) -> Vec<ComplexityLevel> {
    cases
        .iter()
        .filter_map(ClinicalCase::level)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Pathologies found in `cases` merged with the common ones, sorted and deduplicated.
pub fn pathology_suggestions(cases: &[ClinicalCase]) -> Vec<String> {
    let mut all: BTreeSet<String> = available_pathologies(cases).into_iter().collect();
    all.extend(COMMON_PATHOLOGIES.iter().map(|p| p.to_string()));
    all.into_iter().collect()
}

/// Whether an expert of `expert_domain` may see `case`.
///
/// A case without domain counts as general medicine, which everyone may see. An expert without a
/// domain sees everything.
pub fn visible_to_expert(case: &ClinicalCase, expert_domain: Option<&str>) -> bool {
    let Some(expert_domain) = expert_domain.filter(|d| !d.is_empty()) else {
        return true;
    };
    let case_domain = case.domain().unwrap_or(GENERAL_MEDICINE_DOMAIN);
    case_domain == GENERAL_MEDICINE_DOMAIN || case_domain == expert_domain
}

/// Write `cases` as a pretty-printed JSON array.
pub fn export_json<W: Write>(cases: &[ClinicalCase], writer: W) -> CaseResult<()> {
    serde_json::to_writer_pretty(writer, cases).map_err(CaseError::Serialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CaseMetadata;
    use std::sync::Arc;

    fn case(id: &str, reason: &str, pathologie: &str, domaine: Option<&str>, level: Option<ComplexityLevel>) -> ClinicalCase {
        ClinicalCase {
            id: id.into(),
            consultation_reason: reason.into(),
            metadata: Some(Arc::new(CaseMetadata {
                pathologie: pathologie.into(),
                domaine: domaine.map(str::to_string),
                niveau_complexite: level,
                ..CaseMetadata::default()
            })),
            ..ClinicalCase::default()
        }
    }

    fn catalog() -> Vec<ClinicalCase> {
        vec![
            case("c1", "Fièvre et frissons", "Paludisme", Some("infectiologie"), Some(ComplexityLevel::Debutant)),
            case("c2", "Douleur thoracique", "Infarctus", Some("cardiologie"), Some(ComplexityLevel::Avance)),
            case("c3", "Toux chronique", "Tuberculose", None, None),
            case("c4", "Céphalées", "", Some("neurologie"), Some(ComplexityLevel::Debutant)),
        ]
    }

    #[test]
    fn search_covers_pathology_and_reason() {
        let cases = catalog();
        let query = CaseQuery {
            search: "PALU".into(),
            ..CaseQuery::default()
        };
        assert_eq!(query.apply(&cases).len(), 1);

        let query = CaseQuery {
            search: "thoracique".into(),
            ..CaseQuery::default()
        };
        assert_eq!(query.apply(&cases)[0].id, "c2");
    }

    #[test]
    fn domain_and_level_filters_are_exact() {
        let cases = catalog();
        let query = CaseQuery {
            niveau: Some(ComplexityLevel::Debutant),
            ..CaseQuery::default()
        };
        let ids: Vec<&str> = query.apply(&cases).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c4"]);

        let query = CaseQuery {
            domaine: Some("cardio".into()),
            ..CaseQuery::default()
        };
        assert!(query.apply(&cases).is_empty());
    }

    #[test]
    fn facets_are_sorted_and_distinct() {
        let mut cases = catalog();
        cases.push(case("c5", "", "Paludisme", None, Some(ComplexityLevel::Debutant)));

        assert_eq!(
            available_pathologies(&cases),
            vec!["Infarctus", "Paludisme", "Tuberculose"]
        );
        assert_eq!(
            available_levels(&cases),
            vec![ComplexityLevel::Debutant, ComplexityLevel::Avance]
        );
    }

    #[test]
    fn suggestions_merge_common_pathologies() {
        let suggestions = pathology_suggestions(&catalog());
        assert!(suggestions.contains(&"Infarctus".to_string()));
        assert!(suggestions.contains(&"Grippe".to_string()));
        assert_eq!(
            suggestions.iter().filter(|p| *p == "Tuberculose").count(),
            1
        );
        let mut sorted = suggestions.clone();
        sorted.sort();
        assert_eq!(suggestions, sorted);
    }

    #[test]
    fn visibility_by_domain() {
        let cases = catalog();
        assert!(visible_to_expert(&cases[1], Some("cardiologie")));
        assert!(!visible_to_expert(&cases[0], Some("cardiologie")));
        // No domain on the case: general medicine, visible to all.
        assert!(visible_to_expert(&cases[2], Some("cardiologie")));
        assert!(visible_to_expert(&cases[0], None));
    }

    #[test]
    fn export_writes_a_json_array() {
        let mut out = Vec::new();
        export_json(&catalog()[..1], &mut out).expect("export");
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["id"], "c1");
        assert!(String::from_utf8(out).unwrap().contains("\n  "));
    }
}

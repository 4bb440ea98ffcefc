//! Editing of stored cases.
//!
//! [`CaseEditor`] holds the case as it was opened and an isolated draft. Edits go to the draft
//! only; saving sends just the top-level branches that differ from the opened case.

use crate::error::{CaseError, CaseResult};
use crate::model::ClinicalCase;
use crate::patch::{self, CasePath, PatchValue};
use crate::repository::{CaseChanges, CaseRepository};
use serde_json::Value;

pub struct CaseEditor {
    original: Option<ClinicalCase>,
    draft: ClinicalCase,
}

impl CaseEditor {
    /// Edit an existing case. The caller's value is never modified.
    pub fn open(case: &ClinicalCase) -> Self {
        Self {
            original: Some(case.clone()),
            draft: case.clone(),
        }
    }

    /// Edit a case that does not exist yet, starting from a blank case tagged with `domain`.
    pub fn new_case(domain: Option<&str>) -> Self {
        Self {
            original: None,
            draft: ClinicalCase::from_scratch(domain),
        }
    }

    pub fn draft(&self) -> &ClinicalCase {
        &self.draft
    }

    pub fn is_new(&self) -> bool {
        self.original.is_none()
    }

    pub fn patch(&mut self, path: CasePath, value: impl Into<PatchValue>) -> CaseResult<()> {
        self.draft = patch::patch(&self.draft, path, value)?;
        Ok(())
    }

    pub fn patch_str(&mut self, path: &str, value: impl Into<PatchValue>) -> CaseResult<()> {
        self.draft = patch::patch_str(&self.draft, path, value)?;
        Ok(())
    }

    /// Apply a collection operation (see [`crate::collections`]) to the draft.
    pub fn apply(&mut self, op: impl FnOnce(&ClinicalCase) -> ClinicalCase) {
        self.draft = op(&self.draft);
    }

    /// Discard all edits.
    pub fn revert(&mut self) {
        if let Some(original) = &self.original {
            self.draft = original.clone();
        }
    }

    /// Top-level branches of the draft that differ from the opened case, keyed by field name.
    ///
    /// A branch removed from the draft is reported as `null`. `id` is never part of the changes.
    /// For a new case every branch of the draft is reported.
    pub fn changes(&self) -> CaseResult<CaseChanges> {
        let draft = to_object(&self.draft)?;
        let original = match &self.original {
            Some(original) => to_object(original)?,
            None => CaseChanges::new(),
        };

        let mut changes = CaseChanges::new();
        for (key, value) in &draft {
            if key != "id" && original.get(key) != Some(value) {
                changes.insert(key.clone(), value.clone());
            }
        }
        for key in original.keys() {
            if key != "id" && !draft.contains_key(key) {
                changes.insert(key.clone(), Value::Null);
            }
        }
        Ok(changes)
    }

    pub fn has_changes(&self) -> CaseResult<bool> {
        Ok(!self.changes()?.is_empty())
    }

    /// Persist the draft.
    ///
    /// An opened case is updated with [`CaseEditor::changes`], and nothing is sent when there are
    /// none. A new case is created. On success the editor is re-based on the stored case.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::Repository`] when the store fails. The draft is kept.
    pub async fn save<R: CaseRepository>(&mut self, repo: &R) -> CaseResult<ClinicalCase> {
        let Some(original) = &self.original else {
            return self.create(repo).await;
        };

        let changes = self.changes()?;
        if changes.is_empty() {
            tracing::debug!(case_id = %original.id, "no changes to save");
            return Ok(original.clone());
        }

        let id = original.id.clone();
        match repo.update(&id, &changes).await {
            Ok(stored) => {
                tracing::info!(case_id = %id, branches = changes.len(), "case updated");
                self.rebase(stored.clone());
                Ok(stored)
            }
            Err(err) => {
                tracing::warn!(case_id = %id, "case update failed: {}", err);
                Err(err.into())
            }
        }
    }

    /// Send the whole draft as a new case.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::Repository`] when the store fails. The draft is kept.
    pub async fn create<R: CaseRepository>(&mut self, repo: &R) -> CaseResult<ClinicalCase> {
        match repo.create(&self.draft).await {
            Ok(stored) => {
                tracing::info!(case_id = %stored.id, "case created");
                self.rebase(stored.clone());
                Ok(stored)
            }
            Err(err) => {
                tracing::warn!("case creation failed: {}", err);
                Err(err.into())
            }
        }
    }

    fn rebase(&mut self, stored: ClinicalCase) {
        self.draft = stored.clone();
        self.original = Some(stored);
    }
}

fn to_object(case: &ClinicalCase) -> CaseResult<CaseChanges> {
    match serde_json::to_value(case).map_err(CaseError::Serialization)? {
        Value::Object(fields) => Ok(fields),
        _ => Ok(CaseChanges::new()),
    }
}

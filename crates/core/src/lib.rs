//! # Casebook Core
//!
//! Core business logic for the clinical casebook.
//!
//! This crate contains the case model and every operation over it:
//! - Clinical case and school case documents (`model`)
//! - Nested field patching with structural sharing (`patch`)
//! - Ordered collection editing: exams, prescriptions, drug lines, hospitalisations (`collections`)
//! - Editing and saving stored cases (`editor`)
//! - The four-step school-case authoring workflow (`authoring`)
//! - Expert review decisions and the rejection form (`review`)
//! - Repository contracts and an in-memory repository (`repository`)
//!
//! **No API concerns**: HTTP clients, REST servers and command line handling belong in
//! `casebook-client`, `casebook-api-rest` and `casebook-cli`.

pub mod authoring;
pub mod catalog;
pub mod collections;
pub mod config;
pub mod constants;
pub mod editor;
pub mod error;
pub mod model;
pub mod patch;
pub mod repository;
pub mod review;
pub mod store;

pub use authoring::{AuthoringEvent, AuthoringStep, AuthoringWorkflow, CustomizeView, ScheduleForm};
pub use config::CoreConfig;
pub use editor::CaseEditor;
pub use error::{CaseError, CaseResult, RepositoryError, RepositoryResult, ValidationError};
pub use model::{CasEcole, ClinicalCase, Teacher};
pub use patch::{patch, patch_str, CasePath, PatchValue};
pub use repository::{
    CaseFilter, CaseRepository, ExpertIdentity, InMemoryCaseRepository, ReviewRepository,
    SchoolCaseRepository,
};
pub use review::{RejectableRegion, RejectionForm};
pub use store::{Notifications, Store, Subscription};

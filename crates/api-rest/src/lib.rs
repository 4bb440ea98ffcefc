//! # API REST
//!
//! REST API for presentation collaborators of the casebook.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - Authoring sessions: one school-case authoring workflow per session id
//! - Case browsing and expert decisions
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! The router is generic over the case store, so the same endpoints run against the HTTP client
//! in production and against the in-memory repository in tests.

#![warn(rust_2018_idioms)]

mod authoring;
mod cases;
mod error;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, patch, post, put},
    Router,
};
use casebook_core::repository::{CaseRepository, ReviewRepository, SchoolCaseRepository};
use casebook_core::store::Notification;
use casebook_core::{AuthoringWorkflow, CoreConfig, Notifications};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

pub use error::ApiError;

/// Everything the REST layer needs from the case store.
pub trait CaseStore: CaseRepository + SchoolCaseRepository + ReviewRepository + 'static {}

impl<T> CaseStore for T where T: CaseRepository + SchoolCaseRepository + ReviewRepository + 'static {}

type Session = Arc<Mutex<AuthoringWorkflow>>;

/// Sessions untouched for this long are dropped.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

struct SessionEntry {
    workflow: Session,
    last_touched: Instant,
}

/// Application state shared by all request handlers.
pub struct AppState<R> {
    cfg: Arc<CoreConfig>,
    repo: Arc<R>,
    sessions: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
    session_idle_timeout: Duration,
    notifications: Notifications,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            cfg: Arc::clone(&self.cfg),
            repo: Arc::clone(&self.repo),
            sessions: Arc::clone(&self.sessions),
            session_idle_timeout: self.session_idle_timeout,
            notifications: self.notifications.clone(),
        }
    }
}

impl<R: CaseStore> AppState<R> {
    pub fn new(cfg: Arc<CoreConfig>, repo: Arc<R>) -> Self {
        Self {
            cfg,
            repo,
            sessions: Arc::default(),
            session_idle_timeout: SESSION_IDLE_TIMEOUT,
            notifications: Notifications::new(),
        }
    }

    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    /// Look up a session and mark it as used. Idle sessions are dropped first.
    async fn session(&self, sid: Uuid) -> Result<Session, ApiError> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        self.drop_idle(&mut sessions, now);
        let entry = sessions
            .get_mut(&sid)
            .ok_or(ApiError::SessionNotFound(sid))?;
        entry.last_touched = now;
        Ok(Arc::clone(&entry.workflow))
    }

    async fn insert_session(&self, sid: Uuid, workflow: AuthoringWorkflow) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        self.drop_idle(&mut sessions, now);
        sessions.insert(
            sid,
            SessionEntry {
                workflow: Arc::new(Mutex::new(workflow)),
                last_touched: now,
            },
        );
    }

    async fn remove_session(&self, sid: Uuid) -> bool {
        self.sessions.lock().await.remove(&sid).is_some()
    }

    /// Drop every session idle at `now`. Returns how many were removed.
    pub async fn expire_idle_sessions(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock().await;
        self.drop_idle(&mut sessions, now)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn drop_idle(&self, sessions: &mut HashMap<Uuid, SessionEntry>, now: Instant) -> usize {
        let before = sessions.len();
        sessions.retain(|sid, entry| {
            let idle = now.saturating_duration_since(entry.last_touched) >= self.session_idle_timeout;
            if idle {
                tracing::info!(session_id = %sid, "idle authoring session dropped");
            }
            !idle
        });
        before - sessions.len()
    }
}

/// Build the REST router over `state`.
pub fn router<R: CaseStore>(state: AppState<R>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/notifications", get(list_notifications::<R>))
        .route("/notifications/:id", delete(dismiss_notification::<R>))
        .route("/cases", get(cases::list_cases::<R>))
        .route("/cases/:id", get(cases::get_case::<R>))
        .route("/cases/:id/approve", post(cases::approve_case::<R>))
        .route("/cases/:id/reject", post(cases::reject_case::<R>))
        .route("/cases/:id/in_progress", post(cases::start_review::<R>))
        .route("/school_cases", get(cases::list_school_cases::<R>))
        .route("/school_cases/:id", delete(cases::delete_school_case::<R>))
        .route(
            "/school_cases/:id/toggle_actif",
            put(cases::toggle_school_case::<R>),
        )
        .route("/authoring", post(authoring::start::<R>))
        .route(
            "/authoring/:sid",
            get(authoring::snapshot::<R>).delete(authoring::discard::<R>),
        )
        .route("/authoring/:sid/select", post(authoring::select::<R>))
        .route("/authoring/:sid/scratch", post(authoring::scratch::<R>))
        .route("/authoring/:sid/advance", post(authoring::advance::<R>))
        .route("/authoring/:sid/back", post(authoring::back::<R>))
        .route("/authoring/:sid/view", put(authoring::set_view::<R>))
        .route("/authoring/:sid/case", patch(authoring::patch_case::<R>))
        .route("/authoring/:sid/exams", post(authoring::append_exam::<R>))
        .route(
            "/authoring/:sid/exams/:index",
            patch(authoring::update_exam::<R>).delete(authoring::remove_exam::<R>),
        )
        .route(
            "/authoring/:sid/prescriptions",
            post(authoring::add_prescription::<R>),
        )
        .route(
            "/authoring/:sid/prescriptions/:index",
            patch(authoring::update_prescription::<R>)
                .delete(authoring::remove_prescription::<R>),
        )
        .route(
            "/authoring/:sid/prescriptions/:index/drugs",
            post(authoring::add_drug_line::<R>),
        )
        .route(
            "/authoring/:sid/prescriptions/:index/drugs/:drug",
            patch(authoring::update_drug_line::<R>).delete(authoring::remove_drug_line::<R>),
        )
        .route(
            "/authoring/:sid/hospitalisations",
            post(authoring::add_hospitalisation::<R>),
        )
        .route(
            "/authoring/:sid/hospitalisations/:index",
            patch(authoring::update_hospitalisation::<R>)
                .delete(authoring::remove_hospitalisation::<R>),
        )
        .route("/authoring/:sid/schedule", put(authoring::set_schedule::<R>))
        .route("/authoring/:sid/summary", get(authoring::summary::<R>))
        .route("/authoring/:sid/submit", post(authoring::submit::<R>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Health check endpoint for the REST API.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Casebook REST API is alive".into(),
    })
}

async fn list_notifications<R: CaseStore>(
    State(state): State<AppState<R>>,
) -> Json<Vec<Notification>> {
    Json(state.notifications.active(Instant::now()))
}

async fn dismiss_notification<R: CaseStore>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> StatusCode {
    state.notifications.dismiss(&id);
    StatusCode::NO_CONTENT
}

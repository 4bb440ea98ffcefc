//! Constants used throughout the casebook core crate.
//!
//! Endpoint paths, default values and fixed vocabularies live here so the client, the workflow
//! and the REST layer agree on them.

/// Default base URL of the expert agent API when nothing is configured.
pub const DEFAULT_EXPERT_API_URL: &str = "http://localhost:5001";

/// Default transport timeout, in milliseconds, for repository calls.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Expertise domains, in display order. The first one tags cases created from scratch.
pub const EXPERTISE_DOMAINS: [&str; 21] = [
    "cardiologie",
    "neurologie",
    "pneumologie",
    "gastro-enterologie",
    "nephrologie",
    "endocrinologie",
    "rhumatologie",
    "dermatologie",
    "pediatrie",
    "geriatrie",
    "psychiatrie",
    "medecine-generale",
    "chirurgie-generale",
    "gynecologie",
    "urologie",
    "ophtalmologie",
    "orl",
    "oncologie",
    "hematologie",
    "infectiologie",
    "autre",
];

/// Domain tag used when no domain list is available at all.
pub const FALLBACK_DOMAIN: &str = "Général";

/// Domain assumed for cases that carry no domain tag. Visible to every expert.
pub const GENERAL_MEDICINE_DOMAIN: &str = "Médecine Générale";

/// Pathologies offered as suggestions even when no stored case mentions them.
pub const COMMON_PATHOLOGIES: [&str; 10] = [
    "Paludisme",
    "Fièvre Typhoïde",
    "Grippe",
    "Diabète type 2",
    "Hypertension Artérielle",
    "Pneumonie",
    "Bronchite",
    "Gastro-entérite",
    "Infection Urinaire",
    "Tuberculose",
];

/// Default time limit of a school case, in minutes.
pub const DEFAULT_TIME_LIMIT_MINUTES: u32 = 30;

/// Default penalty, in points, per minute past the time limit.
pub const DEFAULT_PENALTY_PER_MINUTE: u32 = 1;

/// Substituted for a zero school or class identifier on submission.
pub const DEFAULT_OWNER_ID: i64 = 1;

pub const DEFAULT_SCHOOL_NAME: &str = "École par défaut";
pub const DEFAULT_CLASS_NAME: &str = "Classe par défaut";

/// Status of a freshly requested exam.
pub const EXAM_STATUS_PENDING: &str = "pending";

/// Payment status of a freshly added hospitalisation.
pub const PAYMENT_STATUS_PENDING: &str = "pending";

/// Room type of a freshly added hospitalisation.
pub const DEFAULT_ROOM_TYPE: &str = "Standard";

/// Expert agent endpoints, as path segments relative to the base URL.
///
/// Ids are always one whole segment; the transport escapes them, so an id containing `/`, `?` or
/// `#` cannot change the request target.
pub mod endpoints {
    pub const CASES: &[&str] = &["cases"];
    pub const CAS_ECOLE: &[&str] = &["cas_ecole"];
    pub const CAS_ECOLE_FROM_CASE: &[&str] = &["cas_ecole", "from_fultang"];
    pub const CAS_CLINIQUES_DISPONIBLES: &[&str] = &["cas_ecole", "cas_disponibles"];
    pub const HEALTH: &[&str] = &["health"];

    pub fn case_by_id(id: &str) -> [&str; 2] {
        ["cases", id]
    }

    pub fn approve_case(id: &str) -> [&str; 3] {
        ["cases", id, "approve"]
    }

    pub fn reject_case(id: &str) -> [&str; 3] {
        ["cases", id, "reject"]
    }

    pub fn in_progress_case(id: &str) -> [&str; 3] {
        ["cases", id, "in_progress"]
    }

    pub fn cas_ecole_by_id(id: &str) -> [&str; 2] {
        ["cas_ecole", id]
    }

    pub fn cas_ecole_toggle_actif(id: &str) -> [&str; 3] {
        ["cas_ecole", id, "toggle_actif"]
    }
}

//! ---
//! fsm_section: "07-session-routing"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session ownership, credential persistence and route guarding."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
//! Session/auth state for the FSM console: who is logged in, how that is
//! persisted across restarts, and which routes may render.

pub mod backend;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod manager;
pub mod navigation;
pub mod state;

pub use backend::{ApiEnvelope, AuthBackend, LoginData, MockAuthBackend, RestAuthBackend};
pub use credentials::{
    CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore, CREDENTIAL_KEYS,
};
pub use error::{AuthError, BackendError, CredentialStoreError};
pub use guard::{evaluate, GuardDecision, ProtectedRoute, RouteGuard, RouteRequirement};
pub use manager::{RestoreOutcome, SessionManager};
pub use navigation::{Navigator, RecordingNavigator, SessionRoutes};
pub use state::{AuthenticatedSession, SessionPhase, SessionState};

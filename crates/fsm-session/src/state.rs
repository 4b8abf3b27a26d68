//! ---
//! fsm_section: "07-session-routing"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session ownership, credential persistence and route guarding."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use std::sync::Arc;

use fsm_security::{get_user_permissions, EffectivePermissionTable, User};
use serde::Serialize;
use strum::{AsRefStr, Display, IntoStaticStr};

/// Coarse lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
}

/// Signed-in user together with the permission table derived from it.
///
/// The table is computed once here and never mutated, so it always matches
/// the user it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    user: Arc<User>,
    permissions: Arc<EffectivePermissionTable>,
}

impl AuthenticatedSession {
    pub fn new(user: User) -> Self {
        let permissions = get_user_permissions(Some(&user));
        Self {
            user: Arc::new(user),
            permissions: Arc::new(permissions),
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn permissions(&self) -> &EffectivePermissionTable {
        &self.permissions
    }
}

/// Who is logged in, as seen by every consumer of the session.
///
/// `Authenticating` is the loading window: neither authenticated nor
/// anonymous, and checks made during it are "unknown" rather than denials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated(AuthenticatedSession),
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Anonymous => SessionPhase::Anonymous,
            SessionState::Authenticating => SessionPhase::Authenticating,
            SessionState::Authenticated(_) => SessionPhase::Authenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Authenticating)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(session) => Some(session.user()),
            _ => None,
        }
    }

    /// Effective permissions; empty unless authenticated.
    pub fn permissions(&self) -> EffectivePermissionTable {
        match self {
            SessionState::Authenticated(session) => session.permissions().clone(),
            _ => EffectivePermissionTable::empty(),
        }
    }
}

//! ---
//! fsm_section: "07-session-routing"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session ownership, credential persistence and route guarding."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
//! Decides whether a protected route renders, waits or redirects.
use std::fmt;
use std::str::FromStr;

use fsm_logging::{fsm_debug, fsm_info, LogContext};
use fsm_security::{Action, ResourceId};
use serde::Serialize;

use crate::manager::SessionManager;
use crate::state::SessionState;

/// Permission a route demands on top of being signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRequirement {
    pub resource: ResourceId,
    pub action: Action,
}

impl RouteRequirement {
    pub fn new(resource: impl Into<ResourceId>, action: Action) -> Self {
        Self {
            resource: resource.into(),
            action,
        }
    }
}

impl fmt::Display for RouteRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// Parses `resource:action`, e.g. `finance-manager:write`.
impl FromStr for RouteRequirement {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (resource, action) = value
            .rsplit_once(':')
            .ok_or_else(|| format!("expected <resource>:<action>, got '{value}'"))?;
        if resource.trim().is_empty() {
            return Err(format!("missing resource in '{value}'"));
        }
        let action = Action::from_str(action.trim())
            .map_err(|_| format!("unknown action '{action}' (read, write, delete, admin)"))?;
        Ok(Self::new(resource.trim(), action))
    }
}

/// A route that requires a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedRoute {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<RouteRequirement>,
}

impl ProtectedRoute {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            requirement: None,
        }
    }

    pub fn requiring(mut self, resource: impl Into<ResourceId>, action: Action) -> Self {
        self.requirement = Some(RouteRequirement::new(resource, action));
        self
    }
}

/// What the router should do with a protected route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// The session is still loading; show a placeholder.
    Pending,
    /// Render the protected content.
    Render,
    /// Go to the login view, returning to `return_to` afterwards.
    Redirect { to: String, return_to: String },
    /// Signed in but lacking the route requirement.
    Forbidden { resource: ResourceId, action: Action },
}

/// Pure guard decision for `route` under `state`.
pub fn evaluate(state: &SessionState, route: &ProtectedRoute, login_route: &str) -> GuardDecision {
    match state {
        SessionState::Authenticating => GuardDecision::Pending,
        SessionState::Anonymous => GuardDecision::Redirect {
            to: login_route.to_owned(),
            return_to: route.path.clone(),
        },
        SessionState::Authenticated(session) => match &route.requirement {
            Some(requirement)
                if !session
                    .permissions()
                    .allows(&requirement.resource, requirement.action) =>
            {
                GuardDecision::Forbidden {
                    resource: requirement.resource.clone(),
                    action: requirement.action,
                }
            }
            _ => GuardDecision::Render,
        },
    }
}

/// Route guard bound to the live session.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    session: SessionManager,
}

impl RouteGuard {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn evaluate(&self, route: &ProtectedRoute) -> GuardDecision {
        evaluate(
            &self.session.state(),
            route,
            &self.session.routes().login_route,
        )
    }

    /// Evaluate against the current session and apply the redirect.
    pub fn check(&self, route: &ProtectedRoute) -> GuardDecision {
        let decision = self.evaluate(route);
        let context = LogContext::new().with_route(&route.path);
        match &decision {
            GuardDecision::Redirect { to, return_to } => {
                self.session.remember_destination(return_to.clone());
                if let Some(metrics) = self.session.metrics() {
                    metrics.inc_guard_redirect();
                }
                fsm_info!(context = context, "unauthenticated visit, redirecting to {to}");
                self.session.navigate(to);
            }
            GuardDecision::Forbidden { resource, action } => {
                if let Some(metrics) = self.session.metrics() {
                    metrics.inc_authorization_denial(resource);
                }
                fsm_info!(
                    context = context.with_resource(resource),
                    "route requires {action}"
                );
            }
            GuardDecision::Pending => {
                fsm_debug!(context = context, "session loading, deferring decision");
            }
            GuardDecision::Render => {}
        }
        decision
    }

    /// Wait for the loading window to close, then [`RouteGuard::check`].
    pub async fn resolve(&self, route: &ProtectedRoute) -> GuardDecision {
        let mut changes = self.session.subscribe();
        if changes.wait_for(|state| !state.is_loading()).await.is_err() {
            fsm_debug!("session channel closed while waiting for restore");
        }
        self.check(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthBackend, MockAuthBackend};
    use crate::credentials::MemoryCredentialStore;
    use crate::navigation::{RecordingNavigator, SessionRoutes};
    use crate::state::AuthenticatedSession;
    use fsm_security::{resources, Permission, Role, SecurityMetrics, User};
    use prometheus::Registry;
    use std::sync::Arc;
    use std::time::Duration;

    fn viewer() -> SessionState {
        let user = User::new(
            "u-1",
            "viewer@fsm.local",
            vec![Role::new(
                "r-viewer",
                "Viewer",
                vec![Permission::new(resources::DASHBOARD, [Action::Read])],
            )],
        );
        SessionState::Authenticated(AuthenticatedSession::new(user))
    }

    fn session_with(
        store: MemoryCredentialStore,
        latency: Duration,
    ) -> (SessionManager, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::new());
        let session = SessionManager::new(
            Arc::new(MockAuthBackend::new("guard-tests", latency).with_demo_accounts()),
            Arc::new(store),
            navigator.clone(),
            SessionRoutes::default(),
        );
        (session, navigator)
    }

    #[test]
    fn loading_is_pending_never_redirect() {
        let route = ProtectedRoute::new("/technicians");
        assert_eq!(
            evaluate(&SessionState::Authenticating, &route, "/login"),
            GuardDecision::Pending
        );
    }

    #[test]
    fn anonymous_redirects_with_return_path() {
        let route = ProtectedRoute::new("/technicians");
        assert_eq!(
            evaluate(&SessionState::Anonymous, &route, "/login"),
            GuardDecision::Redirect {
                to: "/login".into(),
                return_to: "/technicians".into()
            }
        );
    }

    #[test]
    fn authenticated_renders_and_requirement_can_forbid() {
        let open = ProtectedRoute::new("/dashboard");
        assert_eq!(evaluate(&viewer(), &open, "/login"), GuardDecision::Render);

        let allowed = ProtectedRoute::new("/dashboard").requiring(resources::DASHBOARD, Action::Read);
        assert_eq!(evaluate(&viewer(), &allowed, "/login"), GuardDecision::Render);

        let finance =
            ProtectedRoute::new("/finance").requiring(resources::FINANCE_MANAGER, Action::Read);
        assert_eq!(
            evaluate(&viewer(), &finance, "/login"),
            GuardDecision::Forbidden {
                resource: resources::FINANCE_MANAGER.into(),
                action: Action::Read
            }
        );
    }

    #[test]
    fn requirement_parses_resource_and_action() {
        let requirement: RouteRequirement = "finance-manager:write".parse().unwrap();
        assert_eq!(
            requirement,
            RouteRequirement::new(resources::FINANCE_MANAGER, Action::Write)
        );
        assert_eq!(requirement.to_string(), "finance-manager:write");
        assert!("finance-manager".parse::<RouteRequirement>().is_err());
        assert!("finance-manager:execute".parse::<RouteRequirement>().is_err());
        assert!(":read".parse::<RouteRequirement>().is_err());
    }

    #[test]
    fn decision_serializes_with_tag() {
        let value = serde_json::to_value(GuardDecision::Redirect {
            to: "/login".into(),
            return_to: "/finance".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"decision": "redirect", "to": "/login", "return_to": "/finance"})
        );
    }

    #[tokio::test]
    async fn check_remembers_destination_and_navigates_to_login() {
        let metrics = Arc::new(SecurityMetrics::new(Arc::new(Registry::new())).unwrap());
        let (session, navigator) = session_with(MemoryCredentialStore::new(), Duration::ZERO);
        let session = session.with_metrics(metrics.clone());
        session.init().await;

        let guard = RouteGuard::new(session.clone());
        let decision = guard.check(&ProtectedRoute::new("/inventory"));
        assert!(matches!(decision, GuardDecision::Redirect { .. }));
        assert_eq!(navigator.history(), vec!["/login"]);
        assert_eq!(metrics.guard_redirects(), 1);

        session
            .login("dispatcher@fsm.local", "dispatch123")
            .await
            .unwrap();
        assert_eq!(navigator.last().as_deref(), Some("/inventory"));
        assert_eq!(
            guard.check(&ProtectedRoute::new("/inventory")),
            GuardDecision::Render
        );
    }

    #[tokio::test]
    async fn pending_check_has_no_side_effects() {
        let (session, navigator) = session_with(MemoryCredentialStore::new(), Duration::ZERO);
        let guard = RouteGuard::new(session.clone());
        assert_eq!(
            guard.check(&ProtectedRoute::new("/dashboard")),
            GuardDecision::Pending
        );
        assert!(navigator.history().is_empty());
        assert!(session.take_destination().is_none());
    }

    #[tokio::test]
    async fn reload_with_valid_credential_never_redirects() {
        let issued = MockAuthBackend::new("guard-tests", Duration::ZERO)
            .with_demo_accounts()
            .login("admin@fsm.local", "admin123")
            .await
            .unwrap();
        let (session, navigator) = session_with(
            MemoryCredentialStore::with_credentials(&issued.credentials()),
            Duration::from_millis(20),
        );
        let guard = RouteGuard::new(session.clone());
        let route = ProtectedRoute::new("/security").requiring(resources::SECURITY_MANAGER, Action::Admin);

        assert_eq!(guard.check(&route), GuardDecision::Pending);
        let waiting = {
            let guard = guard.clone();
            let route = route.clone();
            tokio::spawn(async move { guard.resolve(&route).await })
        };
        assert_eq!(session.init().await, crate::manager::RestoreOutcome::Restored);

        assert_eq!(waiting.await.unwrap(), GuardDecision::Render);
        assert!(navigator.history().is_empty());
    }
}

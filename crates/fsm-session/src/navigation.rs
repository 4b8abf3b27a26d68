//! ---
//! fsm_section: "07-session-routing"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session ownership, credential persistence and route guarding."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use fsm_common::config::NavigationConfig;
use fsm_logging::{fsm_debug, LogContext};
use parking_lot::Mutex;

/// Client-side router seen by the session owner and the guard.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Route names the session owner navigates to after transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRoutes {
    pub login_route: String,
    pub landing_route: String,
}

impl Default for SessionRoutes {
    fn default() -> Self {
        Self::from(&NavigationConfig::default())
    }
}

impl From<&NavigationConfig> for SessionRoutes {
    fn from(config: &NavigationConfig) -> Self {
        Self {
            login_route: config.login_route.clone(),
            landing_route: config.landing_route.clone(),
        }
    }
}

/// Keeps every navigation in order; used by tests and the CLI.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.history.lock().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        fsm_debug!(context = LogContext::new().with_route(path), "navigate");
        self.history.lock().push(path.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_navigator_keeps_order() {
        let navigator = RecordingNavigator::new();
        navigator.navigate("/login");
        navigator.navigate("/dashboard");
        assert_eq!(navigator.history(), vec!["/login", "/dashboard"]);
        assert_eq!(navigator.last().as_deref(), Some("/dashboard"));
    }

    #[test]
    fn routes_follow_navigation_config() {
        let routes = SessionRoutes::default();
        assert_eq!(routes.login_route, "/login");
        assert_eq!(routes.landing_route, "/dashboard");
    }
}

//! ---
//! fsm_section: "06-security-access-control"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Permission model and resolution for console users."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

use crate::permission::resources;

/// Label used for resources outside the console vocabulary.
pub const UNKNOWN_RESOURCE_LABEL: &str = "unknown";

fn resource_label(resource: &str) -> &str {
    if resources::is_known(resource) {
        resource
    } else {
        UNKNOWN_RESOURCE_LABEL
    }
}

/// Session and authorization counters exported via Prometheus.
#[derive(Clone)]
pub struct SecurityMetrics {
    registry: Arc<Registry>,
    login_attempts_total: IntCounter,
    login_failures_total: IntCounter,
    session_restores_total: IntCounterVec,
    logouts_total: IntCounter,
    authorization_denials_total: IntCounterVec,
    guard_redirects_total: IntCounter,
}

impl SecurityMetrics {
    /// Register metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let login_attempts_total =
            IntCounter::new("fsm_login_attempts_total", "Interactive login attempts")?;
        let login_failures_total =
            IntCounter::new("fsm_login_failures_total", "Rejected or failed login attempts")?;
        let session_restores_total = IntCounterVec::new(
            Opts::new(
                "fsm_session_restores_total",
                "Silent session restores by outcome",
            ),
            &["outcome"],
        )?;
        let logouts_total = IntCounter::new("fsm_logouts_total", "Completed logouts")?;
        let authorization_denials_total = IntCounterVec::new(
            Opts::new(
                "fsm_authorization_denials_total",
                "Permission checks that returned false",
            ),
            &["resource"],
        )?;
        let guard_redirects_total = IntCounter::new(
            "fsm_guard_redirects_total",
            "Protected navigations redirected to the login view",
        )?;

        registry.register(Box::new(login_attempts_total.clone()))?;
        registry.register(Box::new(login_failures_total.clone()))?;
        registry.register(Box::new(session_restores_total.clone()))?;
        registry.register(Box::new(logouts_total.clone()))?;
        registry.register(Box::new(authorization_denials_total.clone()))?;
        registry.register(Box::new(guard_redirects_total.clone()))?;

        Ok(Self {
            registry,
            login_attempts_total,
            login_failures_total,
            session_restores_total,
            logouts_total,
            authorization_denials_total,
            guard_redirects_total,
        })
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Increment login attempts.
    pub fn inc_login_attempt(&self) {
        self.login_attempts_total.inc();
    }

    /// Increment login failures.
    pub fn inc_login_failure(&self) {
        self.login_failures_total.inc();
    }

    /// Count a restore by outcome label (`restored`, `no_credential`, `rejected`, `superseded`).
    pub fn inc_session_restore(&self, outcome: &str) {
        self.session_restores_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment completed logouts.
    pub fn inc_logout(&self) {
        self.logouts_total.inc();
    }

    /// Count a denied permission check against `resource`; unrecognised
    /// resources share the `unknown` label.
    pub fn inc_authorization_denial(&self, resource: &str) {
        self.authorization_denials_total
            .with_label_values(&[resource_label(resource)])
            .inc();
    }

    /// Increment guard redirects to the login view.
    pub fn inc_guard_redirect(&self) {
        self.guard_redirects_total.inc();
    }

    /// Current value of the login attempt counter.
    pub fn login_attempts(&self) -> u64 {
        self.login_attempts_total.get()
    }

    /// Current value of the login failure counter.
    pub fn login_failures(&self) -> u64 {
        self.login_failures_total.get()
    }

    /// Current value of the restore counter for `outcome`.
    pub fn session_restores(&self, outcome: &str) -> u64 {
        self.session_restores_total
            .with_label_values(&[outcome])
            .get()
    }

    /// Current value of the logout counter.
    pub fn logouts(&self) -> u64 {
        self.logouts_total.get()
    }

    /// Current value of the denial counter for `resource`.
    pub fn authorization_denials(&self, resource: &str) -> u64 {
        self.authorization_denials_total
            .with_label_values(&[resource_label(resource)])
            .get()
    }

    /// Current value of the guard redirect counter.
    pub fn guard_redirects(&self) -> u64 {
        self.guard_redirects_total.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_increment() {
        let registry = Arc::new(Registry::new());
        let metrics = SecurityMetrics::new(registry.clone()).unwrap();
        metrics.inc_login_attempt();
        metrics.inc_login_failure();
        metrics.inc_session_restore("rejected");
        metrics.inc_logout();
        metrics.inc_authorization_denial("finance-manager");
        metrics.inc_guard_redirect();
        assert_eq!(metrics.login_attempts(), 1);
        assert_eq!(metrics.session_restores("rejected"), 1);
        assert_eq!(metrics.session_restores("restored"), 0);
        assert_eq!(registry.gather().len(), 6);
    }

    #[test]
    fn unrecognised_resources_share_one_denial_label() {
        use prometheus::core::Collector;

        let metrics = SecurityMetrics::new(Arc::new(Registry::new())).unwrap();
        metrics.inc_authorization_denial("reports-manager");
        metrics.inc_authorization_denial("../../etc/passwd");
        metrics.inc_authorization_denial(resources::FINANCE_MANAGER);

        assert_eq!(metrics.authorization_denials(UNKNOWN_RESOURCE_LABEL), 2);
        assert_eq!(metrics.authorization_denials(resources::FINANCE_MANAGER), 1);
        let labels = metrics.authorization_denials_total.collect()[0]
            .get_metric()
            .len();
        assert_eq!(labels, 2);
    }

    #[test]
    fn double_registration_fails() {
        let registry = Arc::new(Registry::new());
        SecurityMetrics::new(registry.clone()).unwrap();
        assert!(SecurityMetrics::new(registry).is_err());
    }
}

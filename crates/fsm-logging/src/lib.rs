//! ---
//! fsm_section: "03-logging"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session-aware structured logging helpers."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

#[doc(hidden)]
pub use tracing;

/// Initialize a baseline stderr subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured session context propagated by the logging macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Email or identifier of the acting user.
    pub user: Option<&'a str>,
    /// Route being navigated to or guarded.
    pub route: Option<&'a str>,
    /// Resource key involved in an authorization check.
    pub resource: Option<&'a str>,
    /// Session phase at the time of the event (`anonymous`, `authenticating`, ...).
    pub phase: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the acting user.
    pub fn with_user(mut self, user: &'a str) -> Self {
        self.user = Some(user);
        self
    }

    /// Attach a route path.
    pub fn with_route(mut self, route: &'a str) -> Self {
        self.route = Some(route);
        self
    }

    /// Attach a resource key.
    pub fn with_resource(mut self, resource: &'a str) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Attach the session phase.
    pub fn with_phase(mut self, phase: &'a str) -> Self {
        self.phase = Some(phase);
        self
    }
}

/// Outcome of an authentication lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventOutcome {
    /// The transition completed.
    Success,
    /// The transition failed and the session fell back to anonymous.
    Failure,
}

impl AuthEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            AuthEventOutcome::Success => "success",
            AuthEventOutcome::Failure => "failure",
        }
    }
}

/// Emit a standardized authentication lifecycle event (`session.login`,
/// `session.restore`, `session.logout`, ...). Failures are logged at WARN since
/// every failure degrades to the anonymous state rather than aborting.
pub fn log_auth_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: AuthEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    match outcome {
        AuthEventOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            user = ctx.user.unwrap_or(""),
            route = ctx.route.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %message
        ),
        AuthEventOutcome::Failure => tracing::warn!(
            event,
            outcome = outcome.as_str(),
            user = ctx.user.unwrap_or(""),
            route = ctx.route.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_user("dispatcher@fsm.local")
            .with_route("/technicians");
        fsm_info!(context = ctx.clone(), "route rendered");
        fsm_debug!("debug message");
        fsm_warn!(context = ctx.clone().with_resource("user-manager"), "permission denied");
        fsm_error!(context = ctx, "unexpected status {}", 500);
    }

    #[test]
    fn auth_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_user("a@b.com").with_phase("authenticating");
        log_auth_event(
            Some(&ctx),
            "session.login",
            "login completed",
            AuthEventOutcome::Success,
        );
        log_auth_event(
            None,
            "session.restore",
            "persisted credential rejected",
            AuthEventOutcome::Failure,
        );
    }
}

//! ---
//! fsm_section: "07-session-routing"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session ownership, credential persistence and route guarding."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
//! Single owner of the console session.
//!
//! Every consumer reads the session through a [`SessionManager`] handle,
//! either as a snapshot ([`SessionManager::state`]) or as a change stream
//! ([`SessionManager::subscribe`]). Only the manager writes the credential
//! store.
use std::sync::Arc;

use fsm_logging::{fsm_debug, fsm_warn, log_auth_event, AuthEventOutcome, LogContext};
use fsm_security::{Action, EffectivePermissionTable, SecurityMetrics, User};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use strum::{AsRefStr, Display};
use tokio::sync::watch;

use crate::backend::AuthBackend;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{AuthError, BackendError};
use crate::navigation::{Navigator, SessionRoutes};
use crate::state::{AuthenticatedSession, SessionState};

/// Result of a silent restore from the persisted credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// The credential was accepted and the user reloaded.
    Restored,
    /// Nothing was persisted.
    NoCredential,
    /// The credential was refused or unusable and has been cleared.
    Rejected,
    /// A logout or another transition took precedence; nothing was applied.
    Superseded,
}

#[derive(Debug, Default)]
struct TransitionSlot {
    epoch: u64,
    in_flight: bool,
}

struct SessionInner {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    routes: SessionRoutes,
    state: watch::Sender<SessionState>,
    transition: Mutex<TransitionSlot>,
    destination: Mutex<Option<String>>,
    metrics: OnceCell<Arc<SecurityMetrics>>,
}

/// Cloneable handle over the shared session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("phase", &self.inner.state.borrow().phase())
            .field("routes", &self.inner.routes)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager in the loading state; call [`SessionManager::init`]
    /// to resolve it.
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        routes: SessionRoutes,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Authenticating);
        Self {
            inner: Arc::new(SessionInner {
                backend,
                store,
                navigator,
                routes,
                state,
                transition: Mutex::new(TransitionSlot::default()),
                destination: Mutex::new(None),
                metrics: OnceCell::new(),
            }),
        }
    }

    /// Attach Prometheus counters. Only the first call has an effect.
    pub fn with_metrics(self, metrics: Arc<SecurityMetrics>) -> Self {
        let _ = self.inner.metrics.set(metrics);
        self
    }

    pub(crate) fn metrics(&self) -> Option<&SecurityMetrics> {
        self.inner.metrics.get().map(Arc::as_ref)
    }

    pub fn routes(&self) -> &SessionRoutes {
        &self.inner.routes
    }

    /// Snapshot of the current session.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every session change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    /// Startup entry point: restore the persisted session, if any.
    pub async fn init(&self) -> RestoreOutcome {
        self.restore().await
    }

    /// Silently rebuild the session from the persisted credential.
    ///
    /// Failures never reach the caller: the credential is cleared and the
    /// session falls back to anonymous. An already authenticated session is
    /// left untouched and reported as `Restored`.
    pub async fn restore(&self) -> RestoreOutcome {
        let epoch = match self.begin_restore() {
            Ok(epoch) => epoch,
            Err(outcome) => return outcome,
        };

        let credentials = match self.inner.store.load() {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                let outcome = self.finish(epoch, SessionState::Anonymous);
                return self.record_restore(match outcome {
                    Some(()) => RestoreOutcome::NoCredential,
                    None => RestoreOutcome::Superseded,
                });
            }
            Err(err) => {
                fsm_warn!("persisted credential unreadable: {err}");
                return self.record_restore(self.reject_restore(epoch));
            }
        };

        let result = self.inner.backend.current_user(&credentials).await;
        let outcome = match result {
            Ok(user) => {
                let email = user.email.clone();
                let next = SessionState::Authenticated(AuthenticatedSession::new(user));
                match self.finish(epoch, next) {
                    Some(()) => {
                        log_auth_event(
                            Some(&self.event_context(Some(&email))),
                            "session.restore",
                            "session restored from persisted credential",
                            AuthEventOutcome::Success,
                        );
                        RestoreOutcome::Restored
                    }
                    None => RestoreOutcome::Superseded,
                }
            }
            Err(err) => {
                let outcome = self.reject_restore(epoch);
                if outcome == RestoreOutcome::Rejected {
                    log_auth_event(
                        Some(&self.event_context(None)),
                        "session.restore",
                        &format!("persisted credential rejected: {err}"),
                        AuthEventOutcome::Failure,
                    );
                }
                outcome
            }
        };
        self.record_restore(outcome)
    }

    /// Interactive login. Only allowed from the anonymous state.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let epoch = self.begin_login()?;
        if let Some(metrics) = self.metrics() {
            metrics.inc_login_attempt();
        }
        let result = self.authenticate(email, password).await;

        let mut slot = self.inner.transition.lock();
        if slot.epoch != epoch {
            drop(slot);
            fsm_debug!(
                context = LogContext::new().with_user(email),
                "login result discarded after logout"
            );
            return Err(AuthError::Superseded);
        }
        slot.in_flight = false;

        let (credentials, user) = match result {
            Ok(authenticated) => authenticated,
            Err(err) => {
                self.inner.state.send_replace(SessionState::Anonymous);
                drop(slot);
                if let Some(metrics) = self.metrics() {
                    metrics.inc_login_failure();
                }
                log_auth_event(
                    Some(&self.event_context(Some(email))),
                    "session.login",
                    &err.to_string(),
                    AuthEventOutcome::Failure,
                );
                return Err(AuthError::Authentication(err.user_message()));
            }
        };

        if let Err(err) = self.inner.store.save(&credentials) {
            self.inner.state.send_replace(SessionState::Anonymous);
            drop(slot);
            if let Some(metrics) = self.metrics() {
                metrics.inc_login_failure();
            }
            log_auth_event(
                Some(&self.event_context(Some(email))),
                "session.login",
                &format!("credential could not be persisted: {err}"),
                AuthEventOutcome::Failure,
            );
            return Err(err.into());
        }
        self.inner
            .state
            .send_replace(SessionState::Authenticated(AuthenticatedSession::new(
                user.clone(),
            )));
        drop(slot);

        log_auth_event(
            Some(&self.event_context(Some(email))),
            "session.login",
            "login completed",
            AuthEventOutcome::Success,
        );
        let target = self
            .take_destination()
            .unwrap_or_else(|| self.inner.routes.landing_route.clone());
        self.inner.navigator.navigate(&target);
        Ok(user)
    }

    /// End the session. Always allowed; orphans any in-flight transition.
    ///
    /// A credential store failure is returned only after the in-memory
    /// session has already become anonymous.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let credentials = self.inner.store.load().unwrap_or_else(|err| {
            fsm_warn!("persisted credential unreadable during logout: {err}");
            None
        });
        let user = self.current_user();

        let cleared = {
            let mut slot = self.inner.transition.lock();
            slot.epoch += 1;
            slot.in_flight = false;
            let cleared = self.inner.store.clear();
            self.inner.state.send_replace(SessionState::Anonymous);
            cleared
        };
        self.inner.destination.lock().take();
        if let Some(metrics) = self.metrics() {
            metrics.inc_logout();
        }
        self.inner.navigator.navigate(&self.inner.routes.login_route);

        let context = self.event_context(user.as_ref().map(|user| user.email.as_str()));
        if let Some(credentials) = credentials {
            if let Err(err) = self.inner.backend.logout(&credentials).await {
                fsm_warn!(context = context.clone(), "backend logout failed: {err}");
            }
        }

        match cleared {
            Ok(()) => {
                log_auth_event(
                    Some(&context),
                    "session.logout",
                    "session ended",
                    AuthEventOutcome::Success,
                );
                Ok(())
            }
            Err(err) => {
                log_auth_event(
                    Some(&context),
                    "session.logout",
                    &format!("credential could not be cleared: {err}"),
                    AuthEventOutcome::Failure,
                );
                Err(err.into())
            }
        }
    }

    /// Whether the current user holds `action` on `resource`.
    ///
    /// While the session is loading the answer is `false` but unknown, so it
    /// is not counted or logged as a denial.
    pub fn has_permission(&self, resource: &str, action: Action) -> bool {
        let (allowed, loading) = {
            let state = self.inner.state.borrow();
            (
                fsm_security::has_permission(state.user(), resource, action),
                state.is_loading(),
            )
        };
        if !allowed && !loading {
            if let Some(metrics) = self.metrics() {
                metrics.inc_authorization_denial(resource);
            }
            fsm_debug!(
                context = LogContext::new().with_resource(resource),
                "permission denied: {action}"
            );
        }
        allowed
    }

    pub fn is_admin(&self) -> bool {
        fsm_security::is_admin(self.inner.state.borrow().user())
    }

    /// Effective permission table of the current user; empty when anonymous.
    pub fn permissions(&self) -> EffectivePermissionTable {
        self.inner.state.borrow().permissions()
    }

    /// Remember where to go once the user has signed in.
    pub fn remember_destination(&self, path: impl Into<String>) {
        *self.inner.destination.lock() = Some(path.into());
    }

    pub fn take_destination(&self) -> Option<String> {
        self.inner.destination.lock().take()
    }

    pub(crate) fn navigate(&self, path: &str) {
        self.inner.navigator.navigate(path);
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Credentials, User), BackendError> {
        let data = self.inner.backend.login(email, password).await?;
        let credentials = data.credentials();
        let user = self.inner.backend.current_user(&credentials).await?;
        Ok((credentials, user))
    }

    fn begin_login(&self) -> Result<u64, AuthError> {
        let mut slot = self.inner.transition.lock();
        let state = self.inner.state.borrow().clone();
        match state {
            _ if slot.in_flight => return Err(AuthError::TransitionInFlight),
            SessionState::Authenticating => return Err(AuthError::TransitionInFlight),
            SessionState::Authenticated(_) => return Err(AuthError::AlreadyAuthenticated),
            SessionState::Anonymous => {}
        }
        slot.in_flight = true;
        self.inner.state.send_replace(SessionState::Authenticating);
        Ok(slot.epoch)
    }

    /// Claim the transition slot for a restore, or say why it is skipped.
    fn begin_restore(&self) -> Result<u64, RestoreOutcome> {
        let mut slot = self.inner.transition.lock();
        if slot.in_flight {
            drop(slot);
            fsm_debug!("restore skipped: another transition is in flight");
            return Err(self.record_restore(RestoreOutcome::Superseded));
        }
        if self.inner.state.borrow().is_authenticated() {
            drop(slot);
            fsm_debug!("restore skipped: session already authenticated");
            return Err(RestoreOutcome::Restored);
        }
        slot.in_flight = true;
        self.inner.state.send_replace(SessionState::Authenticating);
        Ok(slot.epoch)
    }

    /// Context for auth events, tagged with the phase the session is in now.
    fn event_context<'a>(&self, user: Option<&'a str>) -> LogContext<'a> {
        let phase: &'static str = self.inner.state.borrow().phase().into();
        let context = LogContext::new().with_phase(phase);
        match user {
            Some(user) => context.with_user(user),
            None => context,
        }
    }

    /// Apply `next` if `epoch` is still current. Returns `None` when stale.
    fn finish(&self, epoch: u64, next: SessionState) -> Option<()> {
        let mut slot = self.inner.transition.lock();
        if slot.epoch != epoch {
            return None;
        }
        slot.in_flight = false;
        self.inner.state.send_replace(next);
        Some(())
    }

    fn reject_restore(&self, epoch: u64) -> RestoreOutcome {
        let mut slot = self.inner.transition.lock();
        if slot.epoch != epoch {
            return RestoreOutcome::Superseded;
        }
        slot.in_flight = false;
        if let Err(err) = self.inner.store.clear() {
            fsm_warn!("failed to clear rejected credential: {err}");
        }
        self.inner.state.send_replace(SessionState::Anonymous);
        RestoreOutcome::Rejected
    }

    fn record_restore(&self, outcome: RestoreOutcome) -> RestoreOutcome {
        if let Some(metrics) = self.metrics() {
            metrics.inc_session_restore(outcome.as_ref());
        }
        outcome
    }
}

//! ---
//! fsm_section: "05-networking-external-interfaces"
//! fsm_subsection: "binary"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session CLI for operators of the FSM console."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use fsm_common::AppConfig;
use fsm_logging::{fsm_debug, LogContext};
use fsm_security::{Action, EffectivePermissionTable, SecurityMetrics, User};
use fsm_session::{
    AuthBackend, FileCredentialStore, GuardDecision, MockAuthBackend, ProtectedRoute,
    RecordingNavigator, RestAuthBackend, RestoreOutcome, RouteGuard, RouteRequirement,
    SessionManager, SessionRoutes,
};
use prometheus::Registry;
use serde::Serialize;

/// One CLI invocation's view of the session.
pub struct Console {
    session: SessionManager,
    navigator: Arc<RecordingNavigator>,
    metrics: Arc<SecurityMetrics>,
}

#[derive(Serialize)]
struct UserReport<'a> {
    id: &'a str,
    email: &'a str,
    user_name: &'a str,
    roles: Vec<&'a str>,
    is_admin: bool,
    permissions: EffectivePermissionTable,
}

#[derive(Serialize)]
struct LoginReport<'a> {
    user: UserReport<'a>,
    navigated_to: Option<String>,
}

#[derive(Serialize)]
struct CanReport<'a> {
    resource: &'a str,
    action: Action,
    allowed: bool,
}

#[derive(Serialize)]
struct OpenReport<'a> {
    route: &'a ProtectedRoute,
    restore: RestoreOutcome,
    #[serde(flatten)]
    decision: &'a GuardDecision,
    navigations: Vec<String>,
}

impl Console {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let backend: Arc<dyn AuthBackend> = if config.auth.mock {
            fsm_debug!("using mock authentication backend");
            Arc::new(MockAuthBackend::from_config(&config.auth))
        } else {
            Arc::new(RestAuthBackend::from_config(&config.auth)?)
        };
        let store = Arc::new(FileCredentialStore::new(&config.credentials.path));
        let navigator = Arc::new(RecordingNavigator::new());
        let metrics = Arc::new(SecurityMetrics::new(Arc::new(Registry::new()))?);
        let session = SessionManager::new(
            backend,
            store,
            navigator.clone(),
            SessionRoutes::from(&config.navigation),
        )
        .with_metrics(metrics.clone());
        Ok(Self {
            session,
            navigator,
            metrics,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<ExitCode> {
        if self.session.init().await == RestoreOutcome::Restored {
            // login is only accepted from the anonymous state
            self.session.logout().await?;
        }
        let user = self
            .session
            .login(email, password)
            .await
            .map_err(|err| anyhow!(err.user_message()))?;
        print_json(&LoginReport {
            user: self.report(&user),
            navigated_to: self.navigator.last(),
        })?;
        Ok(ExitCode::SUCCESS)
    }

    pub async fn logout(&self) -> Result<ExitCode> {
        self.session.init().await;
        self.session.logout().await?;
        print_json(&serde_json::json!({
            "logged_out": true,
            "logouts": self.metrics.logouts(),
        }))?;
        Ok(ExitCode::SUCCESS)
    }

    pub async fn whoami(&self) -> Result<ExitCode> {
        let outcome = self.session.init().await;
        match self.session.current_user() {
            Some(user) => {
                print_json(&self.report(&user))?;
                Ok(ExitCode::SUCCESS)
            }
            None => {
                print_json(&serde_json::json!({ "authenticated": false, "restore": outcome }))?;
                Ok(ExitCode::FAILURE)
            }
        }
    }

    pub async fn can(&self, resource: &str, action: Action) -> Result<ExitCode> {
        self.session.init().await;
        let allowed = self.session.has_permission(resource, action);
        if !fsm_security::resources::is_known(resource) {
            fsm_debug!(
                context = LogContext::new().with_resource(resource),
                "resource is not part of the console vocabulary"
            );
        }
        print_json(&CanReport {
            resource,
            action,
            allowed,
        })?;
        Ok(if allowed {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }

    pub async fn open(&self, path: &str, require: Option<RouteRequirement>) -> Result<ExitCode> {
        let route = ProtectedRoute {
            path: path.to_owned(),
            requirement: require,
        };
        let guard = RouteGuard::new(self.session.clone());
        let restore = self.session.init().await;
        let decision = guard.resolve(&route).await;
        print_json(&OpenReport {
            route: &route,
            restore,
            decision: &decision,
            navigations: self.navigator.history(),
        })?;
        Ok(match decision {
            GuardDecision::Render => ExitCode::SUCCESS,
            _ => ExitCode::FAILURE,
        })
    }

    fn report<'a>(&self, user: &'a User) -> UserReport<'a> {
        UserReport {
            id: &user.id,
            email: &user.email,
            user_name: &user.user_name,
            roles: user.roles.iter().map(|role| role.name.as_str()).collect(),
            is_admin: fsm_security::is_admin(Some(user)),
            permissions: fsm_security::get_user_permissions(Some(user)),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

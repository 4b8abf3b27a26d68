//! ---
//! fsm_section: "07-session-routing"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session ownership, credential persistence and route guarding."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
//! In-memory authentication backend with artificial latency.
//!
//! Tokens are derived from a seed and the user id, so a credential persisted
//! by one process is accepted by the next one using the same seed.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fsm_common::config::AuthConfig;
use fsm_security::{resources, Action, Permission, Role, User};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{AuthBackend, LoginData};
use crate::credentials::Credentials;
use crate::error::BackendError;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

#[derive(Debug, Clone)]
struct MockAccount {
    password: String,
    user: User,
}

/// Development backend serving a fixed account directory.
#[derive(Debug, Clone)]
pub struct MockAuthBackend {
    accounts: Arc<RwLock<HashMap<String, MockAccount>>>,
    revoked: Arc<RwLock<HashSet<String>>>,
    latency: Duration,
    seed: String,
}

impl MockAuthBackend {
    /// Empty directory answering after `latency`.
    pub fn new(seed: impl Into<String>, latency: Duration) -> Self {
        Self {
            accounts: Arc::default(),
            revoked: Arc::default(),
            latency,
            seed: seed.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.mock_token_seed.clone(), config.mock_latency).with_demo_accounts()
    }

    /// Register or replace an account. Emails match case-insensitively.
    pub fn add_account(&self, password: impl Into<String>, user: User) {
        self.accounts.write().insert(
            user.email.to_lowercase(),
            MockAccount {
                password: password.into(),
                user,
            },
        );
    }

    /// Seed the directory with one account per typical console persona.
    pub fn with_demo_accounts(self) -> Self {
        let every_resource = resources::ALL
            .iter()
            .map(|resource| Permission::new(*resource, Action::ALL))
            .collect();
        let mut admin = User::new(
            "usr-admin",
            "admin@fsm.local",
            vec![Role::new("role-super-admin", "Super Admin", every_resource)],
        );
        admin.user_name = "Console Admin".into();
        admin.admin = true;
        self.add_account("admin123", admin);

        let mut dispatcher = User::new(
            "usr-dispatch",
            "dispatcher@fsm.local",
            vec![Role::new(
                "role-dispatcher",
                "Dispatcher",
                vec![
                    Permission::new(resources::DASHBOARD, [Action::Read]),
                    Permission::new(resources::TECHNICIANS_MANAGER, [Action::Read, Action::Write]),
                    Permission::new(resources::INVENTORY_MANAGER, [Action::Read]),
                ],
            )],
        );
        dispatcher.user_name = "Front Office".into();
        self.add_account("dispatch123", dispatcher);

        let mut accountant = User::new(
            "usr-finance",
            "accountant@fsm.local",
            vec![
                Role::new(
                    "role-viewer",
                    "Viewer",
                    vec![Permission::new(resources::DASHBOARD, [Action::Read])],
                ),
                Role::new(
                    "role-accounting",
                    "Accounting",
                    vec![
                        Permission::new(resources::FINANCE_MANAGER, [Action::Read, Action::Write]),
                        Permission::new(resources::FINANCE_MANAGER, [Action::Delete]),
                    ],
                ),
            ],
        );
        accountant.user_name = "Accounts".into();
        self.add_account("finance123", accountant);
        self
    }

    fn derive_token(&self, purpose: &str, user_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.as_bytes());
        hasher.update(b":");
        hasher.update(purpose.as_bytes());
        hasher.update(b":");
        hasher.update(user_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl AuthBackend for MockAuthBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginData, BackendError> {
        self.simulate_latency().await;
        let account = self
            .accounts
            .read()
            .get(&email.trim().to_lowercase())
            .filter(|account| account.password == password)
            .cloned()
            .ok_or_else(|| BackendError::Rejected {
                message: INVALID_CREDENTIALS.to_owned(),
            })?;
        let user = account.user;
        let access_token = self.derive_token("access", &user.id);
        self.revoked.write().remove(&access_token);
        debug!(user = %user.email, "mock login accepted");
        Ok(LoginData {
            role_id: user.roles.first().map(|role| role.id.clone()),
            refresh_token: Some(self.derive_token("refresh", &user.id)),
            token_type: Some("Bearer".to_owned()),
            access_token,
            id: user.id,
            email: user.email,
            user_name: user.user_name,
            admin: user.admin,
        })
    }

    async fn current_user(&self, credentials: &Credentials) -> Result<User, BackendError> {
        self.simulate_latency().await;
        if self.revoked.read().contains(&credentials.access_token) {
            return Err(BackendError::Unauthorized);
        }
        self.accounts
            .read()
            .values()
            .find(|account| self.derive_token("access", &account.user.id) == credentials.access_token)
            .map(|account| account.user.clone())
            .ok_or(BackendError::Unauthorized)
    }

    async fn logout(&self, credentials: &Credentials) -> Result<(), BackendError> {
        self.simulate_latency().await;
        self.revoked.write().insert(credentials.access_token.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MockAuthBackend {
        MockAuthBackend::new("test-seed", Duration::ZERO).with_demo_accounts()
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_with_message() {
        let err = backend().login("admin@fsm.local", "nope").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid credentials");
    }

    #[tokio::test]
    async fn issued_token_resolves_to_user() {
        let backend = backend();
        let data = backend.login("Dispatcher@FSM.local", "dispatch123").await.unwrap();
        let user = backend.current_user(&data.credentials()).await.unwrap();
        assert_eq!(user.email, "dispatcher@fsm.local");
        assert_eq!(data.role_id.as_deref(), Some("role-dispatcher"));
    }

    #[tokio::test]
    async fn tokens_are_stable_across_instances_with_same_seed() {
        let data = backend().login("admin@fsm.local", "admin123").await.unwrap();
        let user = backend().current_user(&data.credentials()).await.unwrap();
        assert_eq!(user.id, "usr-admin");

        let other_seed = MockAuthBackend::new("other", Duration::ZERO).with_demo_accounts();
        assert!(other_seed.current_user(&data.credentials()).await.is_err());
    }

    #[tokio::test]
    async fn logout_revokes_until_next_login() {
        let backend = backend();
        let data = backend.login("admin@fsm.local", "admin123").await.unwrap();
        backend.logout(&data.credentials()).await.unwrap();
        assert!(matches!(
            backend.current_user(&data.credentials()).await,
            Err(BackendError::Unauthorized)
        ));
        backend.login("admin@fsm.local", "admin123").await.unwrap();
        assert!(backend.current_user(&data.credentials()).await.is_ok());
    }
}

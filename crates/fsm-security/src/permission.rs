//! ---
//! fsm_section: "06-security-access-control"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Permission model and resolution for console users."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Opaque key identifying a protected feature area of the console.
pub type ResourceId = String;

/// Resource keys known to the console.
///
/// The vocabulary is closed on the consumer side only: a resource string that
/// is not listed here is still accepted in permission data and simply never
/// matches a check.
pub mod resources {
    /// Landing dashboard.
    pub const DASHBOARD: &str = "dashboard";
    /// Technician roster and scheduling screens.
    pub const TECHNICIANS_MANAGER: &str = "technicians-manager";
    /// Front-office staff and account management.
    pub const USER_MANAGER: &str = "user-manager";
    /// Parts and stock screens.
    pub const INVENTORY_MANAGER: &str = "inventory-manager";
    /// Invoicing and payments.
    pub const FINANCE_MANAGER: &str = "finance-manager";
    /// Roles and permission assignment.
    pub const SECURITY_MANAGER: &str = "security-manager";
    /// Job types, content and global settings.
    pub const SYSTEM_SETTINGS: &str = "system-settings";

    /// Resource whose `admin` action marks a super-admin.
    pub const ADMIN_SENTINEL: &str = USER_MANAGER;

    /// Every resource key the console checks against.
    pub const ALL: [&str; 7] = [
        DASHBOARD,
        TECHNICIANS_MANAGER,
        USER_MANAGER,
        INVENTORY_MANAGER,
        FINANCE_MANAGER,
        SECURITY_MANAGER,
        SYSTEM_SETTINGS,
    ];

    /// Whether `resource` belongs to the known vocabulary.
    pub fn is_known(resource: &str) -> bool {
        ALL.contains(&resource)
    }
}

/// Operation being authorized on a resource.
///
/// The four actions are independent bits: `Admin` does not imply the others.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    /// View records.
    Read,
    /// Create or update records.
    Write,
    /// Remove records.
    Delete,
    /// Administer the resource.
    Admin,
}

impl Action {
    /// All four actions, in declaration order.
    pub const ALL: [Action; 4] = [Action::Read, Action::Write, Action::Delete, Action::Admin];
}

/// Grant of zero or more actions on exactly one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Resource key the actions apply to.
    pub resource: ResourceId,
    /// Granted actions.
    #[serde(default)]
    pub actions: BTreeSet<Action>,
}

impl Permission {
    /// Build a permission from a resource key and a list of actions.
    pub fn new(resource: impl Into<ResourceId>, actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            resource: resource.into(),
            actions: actions.into_iter().collect(),
        }
    }

    /// Whether this entry grants `action` on `resource`.
    pub fn grants(&self, resource: &str, action: Action) -> bool {
        self.resource == resource && self.actions.contains(&action)
    }
}

/// Named bundle of permissions assignable to a user.
///
/// The same resource may be listed more than once; the resolver merges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Ordered permission entries.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    /// Short helper for constructing a role.
    pub fn new(id: impl Into<String>, name: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            permissions,
        }
    }
}

/// Console account as returned by the authentication endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable identifier.
    pub id: String,
    /// Login email.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub user_name: String,
    /// Roles held by the user.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Legacy administrator flag. Carried for display only; authorization
    /// goes through [`crate::resolver::is_admin`].
    #[serde(default)]
    pub admin: bool,
}

impl User {
    /// Short helper for constructing a user.
    pub fn new(id: impl Into<String>, email: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            user_name: String::new(),
            roles,
            admin: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn actions_parse_and_render_lowercase() {
        for action in Action::iter() {
            assert_eq!(Action::from_str(action.as_ref()).unwrap(), action);
        }
        assert_eq!(Action::Admin.to_string(), "admin");
        assert!(Action::from_str("execute").is_err());
    }

    #[test]
    fn user_payload_decodes_from_endpoint_shape() {
        let payload = serde_json::json!({
            "id": "u-1",
            "email": "a@b.com",
            "userName": "Ada",
            "roleId": "r-1",
            "admin": true,
            "roles": [{
                "id": "r-1",
                "name": "Dispatcher",
                "permissions": [
                    {"resource": "technicians-manager", "actions": ["read", "write", "read"]}
                ]
            }]
        });
        let user: User = serde_json::from_value(payload).unwrap();
        assert_eq!(user.user_name, "Ada");
        assert!(user.admin);
        let permission = &user.roles[0].permissions[0];
        assert_eq!(permission.actions.len(), 2);
        assert!(permission.grants("technicians-manager", Action::Write));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let payload = serde_json::json!({"resource": "dashboard", "actions": ["execute"]});
        assert!(serde_json::from_value::<Permission>(payload).is_err());
    }

    #[test]
    fn vocabulary_contains_sentinel() {
        assert!(resources::is_known(resources::ADMIN_SENTINEL));
        assert!(!resources::is_known("reports-manager"));
    }
}

//! ---
//! fsm_section: "06-security-access-control"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Permission model and resolution for console users."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
//! Pure permission resolution over an optional [`User`].
//!
//! A missing user is a valid input and always resolves to "no permission".
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::permission::{resources, Action, ResourceId, User};

/// Per-resource union of the actions granted to a user across all roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectivePermissionTable(BTreeMap<ResourceId, BTreeSet<Action>>);

impl EffectivePermissionTable {
    /// Empty table, the state of an anonymous session.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether `action` is granted on `resource`.
    pub fn allows(&self, resource: &str, action: Action) -> bool {
        self.0
            .get(resource)
            .is_some_and(|actions| actions.contains(&action))
    }

    /// Actions granted on `resource`, if any.
    pub fn actions(&self, resource: &str) -> Option<&BTreeSet<Action>> {
        self.0.get(resource)
    }

    /// Whether no resource is granted at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of resources in the table.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn grant(&mut self, resource: &str, actions: impl IntoIterator<Item = Action>) {
        self.0
            .entry(resource.to_owned())
            .or_default()
            .extend(actions);
    }
}

/// Whether any role held by `user` grants `action` on `resource`.
///
/// Exact containment only: `Admin` on a resource does not imply `Read`,
/// `Write` or `Delete` on it.
pub fn has_permission(user: Option<&User>, resource: &str, action: Action) -> bool {
    let Some(user) = user else {
        return false;
    };
    user.roles
        .iter()
        .flat_map(|role| role.permissions.iter())
        .any(|permission| permission.grants(resource, action))
}

/// Whether `user` is a console super-admin.
///
/// Super-admin status is tied to the `admin` action on
/// [`resources::ADMIN_SENTINEL`] and nothing else: `admin` on every other
/// resource, or the legacy [`User::admin`] flag, does not make a super-admin.
pub fn is_admin(user: Option<&User>) -> bool {
    has_permission(user, resources::ADMIN_SENTINEL, Action::Admin)
}

/// Flatten every `(resource, actions)` pair across all roles of `user` into one
/// table, merging repeated resources by set union.
pub fn get_user_permissions(user: Option<&User>) -> EffectivePermissionTable {
    let mut table = EffectivePermissionTable::empty();
    let Some(user) = user else {
        return table;
    };
    for permission in user.roles.iter().flat_map(|role| role.permissions.iter()) {
        table.grant(&permission.resource, permission.actions.iter().copied());
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::{Permission, Role};
    use strum::IntoEnumIterator;

    fn user_with(roles: Vec<Role>) -> User {
        User::new("u-1", "a@b.com", roles)
    }

    fn role(id: &str, permissions: Vec<Permission>) -> Role {
        Role::new(id, id, permissions)
    }

    #[test]
    fn missing_user_has_nothing() {
        assert!(!has_permission(None, resources::DASHBOARD, Action::Read));
        assert!(!is_admin(None));
        assert!(get_user_permissions(None).is_empty());
    }

    #[test]
    fn unlisted_resource_is_denied_for_every_action() {
        let user = user_with(vec![role(
            "dispatcher",
            vec![Permission::new(resources::TECHNICIANS_MANAGER, Action::iter())],
        )]);
        for action in Action::iter() {
            assert!(!has_permission(Some(&user), resources::FINANCE_MANAGER, action));
            assert!(!has_permission(Some(&user), "not-a-resource", action));
        }
    }

    #[test]
    fn grant_holds_regardless_of_ordering() {
        let read = role(
            "reader",
            vec![Permission::new(resources::INVENTORY_MANAGER, [Action::Read])],
        );
        let delete = role(
            "cleaner",
            vec![
                Permission::new(resources::DASHBOARD, [Action::Read]),
                Permission::new(resources::INVENTORY_MANAGER, [Action::Delete]),
            ],
        );
        let forward = user_with(vec![read.clone(), delete.clone()]);
        let reversed = user_with(vec![delete, read]);
        for user in [&forward, &reversed] {
            assert!(has_permission(Some(user), resources::INVENTORY_MANAGER, Action::Read));
            assert!(has_permission(Some(user), resources::INVENTORY_MANAGER, Action::Delete));
            assert!(!has_permission(Some(user), resources::INVENTORY_MANAGER, Action::Write));
        }
        assert_eq!(
            get_user_permissions(Some(&forward)),
            get_user_permissions(Some(&reversed))
        );
    }

    #[test]
    fn repeated_resources_merge_by_union() {
        let user = user_with(vec![
            role("a", vec![Permission::new("R", [Action::Read])]),
            role(
                "b",
                vec![
                    Permission::new("R", [Action::Write]),
                    Permission::new("R", [Action::Write]),
                ],
            ),
        ]);
        let table = get_user_permissions(Some(&user));
        assert_eq!(
            table.actions("R").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![Action::Read, Action::Write]
        );
        assert_eq!(table, get_user_permissions(Some(&user)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn table_agrees_with_has_permission() {
        let user = user_with(vec![
            role(
                "ops",
                vec![
                    Permission::new(resources::TECHNICIANS_MANAGER, [Action::Read, Action::Write]),
                    Permission::new(resources::SYSTEM_SETTINGS, Vec::new()),
                ],
            ),
            role("audit", vec![Permission::new(resources::FINANCE_MANAGER, [Action::Read])]),
        ]);
        let table = get_user_permissions(Some(&user));
        for resource in resources::ALL {
            for action in Action::iter() {
                assert_eq!(
                    table.allows(resource, action),
                    has_permission(Some(&user), resource, action),
                    "{resource}:{action}"
                );
            }
        }
    }

    // `admin` is an independent bit; flipping this requires an explicit decision.
    #[test]
    fn admin_action_does_not_imply_other_actions() {
        let user = user_with(vec![role(
            "owner",
            vec![Permission::new(resources::FINANCE_MANAGER, [Action::Admin])],
        )]);
        assert!(has_permission(Some(&user), resources::FINANCE_MANAGER, Action::Admin));
        assert!(!has_permission(Some(&user), resources::FINANCE_MANAGER, Action::Read));
        assert!(!has_permission(Some(&user), resources::FINANCE_MANAGER, Action::Write));
        assert!(!has_permission(Some(&user), resources::FINANCE_MANAGER, Action::Delete));
    }

    #[test]
    fn admin_requires_sentinel_resource() {
        let everywhere_but_sentinel = resources::ALL
            .iter()
            .filter(|resource| **resource != resources::ADMIN_SENTINEL)
            .map(|resource| Permission::new(*resource, Action::iter()))
            .collect();
        let mut user = user_with(vec![role("almost", everywhere_but_sentinel)]);
        user.admin = true;
        assert!(!is_admin(Some(&user)));

        user.roles.push(role(
            "root",
            vec![Permission::new(resources::USER_MANAGER, [Action::Admin])],
        ));
        assert!(is_admin(Some(&user)));
    }

    #[test]
    fn table_serializes_as_resource_map() {
        let user = user_with(vec![role(
            "viewer",
            vec![Permission::new(resources::DASHBOARD, [Action::Read])],
        )]);
        let json = serde_json::to_value(get_user_permissions(Some(&user))).unwrap();
        assert_eq!(json, serde_json::json!({"dashboard": ["read"]}));
    }
}

//! ---
//! fsm_section: "06-security-access-control"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Permission model and resolution for console users."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod metrics;
pub mod permission;
pub mod resolver;

pub use metrics::SecurityMetrics;
pub use permission::{resources, Action, Permission, ResourceId, Role, User};
pub use resolver::{get_user_permissions, has_permission, is_admin, EffectivePermissionTable};

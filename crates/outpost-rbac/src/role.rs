// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Roles, scoped permissions and the subject that holds them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::object::resource;
use crate::{Action, Object};

/// Whether a matching permission grants or forbids the action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
	#[default]
	Allow,
	Deny,
}

/// Condition under which a permission applies to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
	/// Applies to every object.
	Site,
	/// Applies when the object's organization is the role's organization.
	Org,
	/// Applies when the subject owns the object.
	Owner,
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Scope::Site => write!(f, "site"),
			Scope::Org => write!(f, "org"),
			Scope::Owner => write!(f, "owner"),
		}
	}
}

/// A single grant or denial carried by a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopedPermission {
	pub resource_type: String,
	pub action: Action,
	pub effect: Effect,
	pub scope: Scope,
}

impl ScopedPermission {
	pub fn allow(resource_type: impl Into<String>, action: Action, scope: Scope) -> Self {
		Self {
			resource_type: resource_type.into(),
			action,
			effect: Effect::Allow,
			scope,
		}
	}

	pub fn deny(resource_type: impl Into<String>, action: Action, scope: Scope) -> Self {
		Self {
			resource_type: resource_type.into(),
			action,
			effect: Effect::Deny,
			scope,
		}
	}

	/// Returns true if this permission names `resource_type` (directly or by wildcard).
	pub fn covers_type(&self, resource_type: &str) -> bool {
		self.resource_type == resource::WILDCARD || self.resource_type == resource_type
	}

	/// Returns true if this permission is about `action` on `resource_type`.
	pub fn targets(&self, resource_type: &str, action: Action) -> bool {
		self.action == action && self.covers_type(resource_type)
	}
}

/// A named, immutable set of permissions.
///
/// Organization roles carry the organization they were resolved for; their
/// [`Scope::Org`] permissions only apply to objects in that organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub name: String,
	pub org: Option<String>,
	pub permissions: Vec<ScopedPermission>,
}

impl Role {
	/// Creates a site role. Duplicate permissions are collapsed.
	pub fn new(name: impl Into<String>, permissions: impl IntoIterator<Item = ScopedPermission>) -> Self {
		let mut unique: Vec<ScopedPermission> = Vec::new();
		for permission in permissions {
			if !unique.contains(&permission) {
				unique.push(permission);
			}
		}
		Self {
			name: name.into(),
			org: None,
			permissions: unique,
		}
	}

	/// Builder: bind this role to an organization.
	pub fn in_org(mut self, org_id: impl Into<String>) -> Self {
		self.org = Some(org_id.into());
		self
	}

	pub fn org_id(&self) -> Option<&str> {
		self.org.as_deref().filter(|o| !o.is_empty())
	}

	/// Returns true if `permission`'s scope holds for `subject_id` acting on `object`.
	pub fn scope_holds(&self, permission: &ScopedPermission, subject_id: &str, object: &Object) -> bool {
		match permission.scope {
			Scope::Site => true,
			Scope::Org => match (self.org_id(), object.org_id()) {
				(Some(role_org), Some(object_org)) => role_org == object_org,
				_ => false,
			},
			Scope::Owner => object.owner_id() == Some(subject_id),
		}
	}
}

/// The acting identity together with its resolved roles for one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
	pub id: String,
	pub roles: Vec<Role>,
}

impl Subject {
	pub fn new(id: impl Into<String>, roles: Vec<Role>) -> Self {
		Self {
			id: id.into(),
			roles,
		}
	}

	pub fn role_names(&self) -> Vec<&str> {
		self.roles.iter().map(|r| r.name.as_str()).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_role_collapses_duplicates() {
		let role = Role::new(
			"reader",
			[
				ScopedPermission::allow("workspace", Action::Read, Scope::Site),
				ScopedPermission::allow("workspace", Action::Read, Scope::Site),
				ScopedPermission::deny("workspace", Action::Read, Scope::Site),
			],
		);
		assert_eq!(role.permissions.len(), 2);
		assert_eq!(role.org, None);
	}

	#[test]
	fn wildcard_covers_every_type() {
		let permission = ScopedPermission::allow("*", Action::Read, Scope::Site);
		assert!(permission.targets("workspace", Action::Read));
		assert!(permission.targets("license", Action::Read));
		assert!(!permission.targets("license", Action::Delete));
	}

	mod scopes {
		use super::*;

		fn permission(scope: Scope) -> ScopedPermission {
			ScopedPermission::allow("workspace", Action::Read, scope)
		}

		#[test]
		fn site_always_holds() {
			let role = Role::new("r", []);
			assert!(role.scope_holds(&permission(Scope::Site), "u1", &Object::workspace()));
		}

		#[test]
		fn org_requires_matching_org() {
			let role = Role::new("r", []).in_org("A");
			let same = Object::workspace().in_org("A");
			let other = Object::workspace().in_org("B");
			let none = Object::workspace();
			assert!(role.scope_holds(&permission(Scope::Org), "u1", &same));
			assert!(!role.scope_holds(&permission(Scope::Org), "u1", &other));
			assert!(!role.scope_holds(&permission(Scope::Org), "u1", &none));
		}

		#[test]
		fn org_scope_without_role_org_never_holds() {
			let role = Role::new("r", []);
			let object = Object::workspace().in_org("A");
			assert!(!role.scope_holds(&permission(Scope::Org), "u1", &object));
		}

		#[test]
		fn empty_orgs_never_match() {
			let role = Role::new("r", []).in_org("");
			let object = Object::workspace().in_org("");
			assert!(!role.scope_holds(&permission(Scope::Org), "u1", &object));
		}

		#[test]
		fn owner_requires_subject_ownership() {
			let role = Role::new("r", []);
			let mine = Object::workspace().with_owner("u1");
			let theirs = Object::workspace().with_owner("u2");
			assert!(role.scope_holds(&permission(Scope::Owner), "u1", &mine));
			assert!(!role.scope_holds(&permission(Scope::Owner), "u1", &theirs));
			assert!(!role.scope_holds(&permission(Scope::Owner), "u1", &Object::workspace()));
		}
	}
}

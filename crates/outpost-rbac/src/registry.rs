// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The role catalog.
//!
//! A [`RoleRegistry`] is built once, from the catalog embedded in the binary or
//! from a custom role set in tests, and is read-only afterwards. Lookups by
//! name either return a complete [`Role`] or fail with
//! [`RbacError::UnknownRole`]; there is no empty fallback role.
//!
//! # Role names
//!
//! - Site roles are plain names: `admin`, `member`, `auditor`, `template-admin`
//! - Organization roles are `<name>:<org id>`, e.g. `org-admin:A`

use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

use crate::error::{RbacError, Result};
use crate::{Action, Effect, Role, Scope, ScopedPermission};

const BUILTIN_CATALOG: &str = include_str!("roles.toml");

/// Separates an organization role's name from its organization id.
pub const ORG_ROLE_SEPARATOR: char = ':';

#[derive(Debug, Clone)]
enum Entry {
	/// Returned as-is.
	Fixed(Role),
	/// Bound to the organization named in the lookup.
	OrgTemplate(Vec<ScopedPermission>),
}

/// Read-only catalog of named roles.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
	version: u32,
	entries: BTreeMap<String, Entry>,
}

impl RoleRegistry {
	/// Loads the catalog embedded at build time.
	pub fn builtin() -> Result<Self> {
		Self::from_toml(BUILTIN_CATALOG)
	}

	/// Parses a catalog definition.
	pub fn from_toml(source: &str) -> Result<Self> {
		let catalog: CatalogDef =
			toml::from_str(source).map_err(|e| RbacError::Catalog(e.to_string()))?;

		let mut entries = BTreeMap::new();
		for def in catalog.roles {
			let (name, entry) = def.into_entry()?;
			if entries.insert(name.clone(), entry).is_some() {
				return Err(RbacError::Catalog(format!("duplicate role '{name}'")));
			}
		}

		debug!(version = catalog.version, roles = entries.len(), "role catalog loaded");
		Ok(Self {
			version: catalog.version,
			entries,
		})
	}

	/// Builds a registry holding exactly the given roles, looked up by their name.
	///
	/// Names follow the catalog rules: non-empty, unique and free of the org
	/// separator.
	pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Result<Self> {
		let mut entries = BTreeMap::new();
		for role in roles {
			validate_role_name(&role.name)?;
			let name = role.name.clone();
			if entries.insert(name.clone(), Entry::Fixed(role)).is_some() {
				return Err(RbacError::Catalog(format!("duplicate role '{name}'")));
			}
		}
		Ok(Self { version: 0, entries })
	}

	/// Catalog version; zero for custom registries.
	pub fn version(&self) -> u32 {
		self.version
	}

	/// Names of every catalog entry. Organization roles are listed without an org id.
	pub fn role_names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	/// Resolves a role name.
	pub fn role_by_name(&self, name: &str) -> Result<Role> {
		let unknown = || RbacError::UnknownRole(name.to_string());

		if let Some((base, org)) = name.split_once(ORG_ROLE_SEPARATOR) {
			if org.is_empty() {
				return Err(unknown());
			}
			return match self.entries.get(base) {
				Some(Entry::OrgTemplate(permissions)) => Ok(Role {
					name: name.to_string(),
					org: Some(org.to_string()),
					permissions: permissions.clone(),
				}),
				_ => Err(unknown()),
			};
		}

		match self.entries.get(name) {
			Some(Entry::Fixed(role)) => Ok(role.clone()),
			_ => Err(unknown()),
		}
	}

	/// Resolves every name, failing on the first unknown one.
	pub fn roles_by_name<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Role>> {
		names.iter().map(|n| self.role_by_name(n.as_ref())).collect()
	}
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDef {
	version: u32,
	#[serde(default, rename = "role")]
	roles: Vec<RoleDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RoleKind {
	Site,
	Org,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RoleDef {
	name: String,
	scope: RoleKind,
	#[serde(default, rename = "permission")]
	permissions: Vec<PermissionDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PermissionDef {
	resource: String,
	actions: Vec<String>,
	#[serde(default)]
	effect: Effect,
	scope: Scope,
}

impl RoleDef {
	fn into_entry(self) -> Result<(String, Entry)> {
		let invalid = |msg: String| RbacError::Catalog(format!("role '{}': {msg}", self.name));

		validate_role_name(&self.name)?;

		let mut permissions = Vec::new();
		for def in &self.permissions {
			if def.resource.is_empty() {
				return Err(invalid("permission with empty resource".to_string()));
			}
			if self.scope == RoleKind::Site && def.scope == Scope::Org {
				return Err(invalid("site role cannot hold org-scoped permissions".to_string()));
			}
			for action in expand_actions(&def.actions).map_err(invalid)? {
				permissions.push(ScopedPermission {
					resource_type: def.resource.clone(),
					action,
					effect: def.effect,
					scope: def.scope,
				});
			}
		}

		let role = Role::new(self.name.clone(), permissions);
		let entry = match self.scope {
			RoleKind::Site => Entry::Fixed(role),
			RoleKind::Org => Entry::OrgTemplate(role.permissions),
		};
		Ok((self.name, entry))
	}
}

fn validate_role_name(name: &str) -> Result<()> {
	if name.is_empty() || name.contains(ORG_ROLE_SEPARATOR) {
		return Err(RbacError::Catalog(format!("role '{name}': invalid role name")));
	}
	Ok(())
}

fn expand_actions(names: &[String]) -> std::result::Result<Vec<Action>, String> {
	if names.is_empty() {
		return Err("permission without actions".to_string());
	}
	let mut actions = Vec::new();
	for name in names {
		if name == "*" {
			actions.extend_from_slice(Action::all());
		} else {
			actions.push(Action::from_str(name)?);
		}
	}
	Ok(actions)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn builtin() -> RoleRegistry {
		RoleRegistry::builtin().expect("embedded catalog must parse")
	}

	#[test]
	fn builtin_catalog_loads() {
		let registry = builtin();
		assert_eq!(registry.version(), 1);
		let names: Vec<&str> = registry.role_names().collect();
		assert_eq!(
			names,
			vec!["admin", "auditor", "member", "org-admin", "org-member", "template-admin"]
		);
	}

	#[test]
	fn site_role_resolves() {
		let role = builtin().role_by_name("member").unwrap();
		assert_eq!(role.name, "member");
		assert_eq!(role.org, None);
		assert!(role
			.permissions
			.contains(&ScopedPermission::allow("workspace", Action::Read, Scope::Owner)));
	}

	#[test]
	fn org_role_binds_org() {
		let role = builtin().role_by_name("org-admin:A").unwrap();
		assert_eq!(role.name, "org-admin:A");
		assert_eq!(role.org.as_deref(), Some("A"));
		assert_eq!(role.permissions.len(), 4);
	}

	#[test]
	fn wildcard_actions_expand() {
		let admin = builtin().role_by_name("admin").unwrap();
		for action in Action::all() {
			assert!(admin
				.permissions
				.contains(&ScopedPermission::allow("*", *action, Scope::Site)));
		}
	}

	mod unknown_roles {
		use super::*;

		#[test]
		fn nonexistent_is_an_error() {
			let err = builtin().role_by_name("nonexistent").unwrap_err();
			assert_eq!(err, RbacError::UnknownRole("nonexistent".to_string()));
		}

		#[test]
		fn org_template_needs_org() {
			assert!(builtin().role_by_name("org-admin").is_err());
			assert!(builtin().role_by_name("org-admin:").is_err());
		}

		#[test]
		fn site_role_rejects_org_suffix() {
			assert!(builtin().role_by_name("admin:A").is_err());
		}

		#[test]
		fn empty_name_is_unknown() {
			assert!(builtin().role_by_name("").is_err());
		}

		#[test]
		fn one_unknown_name_fails_the_batch() {
			let err = builtin()
				.roles_by_name(&["member", "ghost", "auditor"])
				.unwrap_err();
			assert_eq!(err, RbacError::UnknownRole("ghost".to_string()));
		}
	}

	mod custom {
		use super::*;

		#[test]
		fn from_roles_returns_exact_values() {
			let role = Role::new(
				"deny-reads",
				[ScopedPermission::deny("workspace", Action::Read, Scope::Site)],
			)
			.in_org("A");
			let registry = RoleRegistry::from_roles([role.clone()]).unwrap();
			assert_eq!(registry.version(), 0);
			assert_eq!(registry.role_by_name("deny-reads").unwrap(), role);
			assert!(registry.role_by_name("deny-reads:A").is_err());
			assert!(registry.role_by_name("admin").is_err());
		}

		fn bare(name: &str) -> Role {
			Role::new(name, Vec::<ScopedPermission>::new())
		}

		#[test]
		fn from_roles_rejects_names_lookup_cannot_resolve() {
			for name in ["team:ops", ""] {
				let err = RoleRegistry::from_roles([bare(name)]).unwrap_err();
				assert!(matches!(err, RbacError::Catalog(_)), "{name}");
			}
		}

		#[test]
		fn from_roles_rejects_duplicates() {
			let err = RoleRegistry::from_roles([bare("ops"), bare("ops")]).unwrap_err();
			assert!(matches!(err, RbacError::Catalog(msg) if msg.contains("duplicate")));
		}

		#[test]
		fn from_roles_names_all_resolve() {
			let registry = RoleRegistry::from_roles([bare("ops"), bare("dev")]).unwrap();
			for name in registry.role_names() {
				assert!(registry.role_by_name(name).is_ok(), "{name}");
			}
		}

		#[test]
		fn catalog_rejects_duplicates() {
			let source = r#"
				version = 1
				[[role]]
				name = "a"
				scope = "site"
				[[role]]
				name = "a"
				scope = "site"
			"#;
			let err = RoleRegistry::from_toml(source).unwrap_err();
			assert!(matches!(err, RbacError::Catalog(msg) if msg.contains("duplicate")));
		}

		#[test]
		fn catalog_rejects_unknown_action() {
			let source = r#"
				version = 1
				[[role]]
				name = "a"
				scope = "site"
				[[role.permission]]
				resource = "workspace"
				actions = ["write"]
				scope = "site"
			"#;
			assert!(matches!(
				RoleRegistry::from_toml(source),
				Err(RbacError::Catalog(_))
			));
		}

		#[test]
		fn catalog_rejects_org_scope_in_site_role() {
			let source = r#"
				version = 1
				[[role]]
				name = "a"
				scope = "site"
				[[role.permission]]
				resource = "workspace"
				actions = ["read"]
				scope = "org"
			"#;
			assert!(RoleRegistry::from_toml(source).is_err());
		}

		#[test]
		fn catalog_parses_deny_effect() {
			let source = r#"
				version = 3
				[[role]]
				name = "no-delete"
				scope = "site"
				[[role.permission]]
				resource = "*"
				actions = ["delete"]
				effect = "deny"
				scope = "site"
			"#;
			let registry = RoleRegistry::from_toml(source).unwrap();
			assert_eq!(registry.version(), 3);
			let role = registry.role_by_name("no-delete").unwrap();
			assert_eq!(
				role.permissions,
				vec![ScopedPermission::deny("*", Action::Delete, Scope::Site)]
			);
		}

		#[test]
		fn malformed_catalog_is_an_error() {
			assert!(matches!(
				RoleRegistry::from_toml("version = "),
				Err(RbacError::Catalog(_))
			));
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial evaluation: compile once per `(subject, roles, action, type)`,
//! evaluate many times against concrete objects.
//!
//! [`PartialQuery::prepare`] resolves everything that does not depend on the
//! object. Site-scoped permissions become constants; org- and owner-scoped
//! permissions and the ACL become residual [`Condition`]s over the object's
//! unbound fields. Deny and allow residuals are kept apart so that
//! [`PartialQuery::evaluate`] applies the same precedence as
//! [`evaluate`](crate::engine::evaluate): any deny wins, then any allow,
//! otherwise deny.

use serde::Serialize;
use tracing::instrument;

use crate::engine::{validate_request, Decision};
use crate::error::{RbacError, Result};
use crate::object::resource;
use crate::{Action, Effect, Object, Scope, Subject};

/// A test on one unbound object field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum Condition {
	/// The object belongs to this organization.
	OrgIs(String),
	/// The object is owned by this user.
	OwnerIs(String),
	/// The object's ACL grants the action to this user.
	AclGrants(String),
}

impl Condition {
	fn holds(&self, action: Action, object: &Object) -> bool {
		match self {
			Condition::OrgIs(org) => object.org_id() == Some(org.as_str()),
			Condition::OwnerIs(owner) => object.owner_id() == Some(owner.as_str()),
			Condition::AclGrants(user) => object.acl_allows(user, action),
		}
	}
}

/// A disjunction of conditions, or a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Residual {
	Always,
	/// Holds when any condition holds; never holds when empty.
	AnyOf(Vec<Condition>),
}

impl Residual {
	fn never() -> Self {
		Residual::AnyOf(Vec::new())
	}

	fn add(&mut self, condition: Condition) {
		if let Residual::AnyOf(conditions) = self {
			if !conditions.contains(&condition) {
				conditions.push(condition);
			}
		}
	}

	fn holds(&self, action: Action, object: &Object) -> bool {
		match self {
			Residual::Always => true,
			Residual::AnyOf(conditions) => conditions.iter().any(|c| c.holds(action, object)),
		}
	}

	fn is_never(&self) -> bool {
		matches!(self, Residual::AnyOf(c) if c.is_empty())
	}
}

/// A compiled decision function for one subject, role set, action and resource type.
///
/// Immutable and `Send + Sync`; evaluate it against as many objects of the
/// prepared type as needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialQuery {
	subject_id: String,
	role_names: Vec<String>,
	action: Action,
	resource_type: String,
	deny: Residual,
	allow: Residual,
}

impl PartialQuery {
	/// Compiles the query. Fails with [`RbacError::Compilation`] when the
	/// request cannot be compiled; callers fall back to full evaluation.
	#[instrument(
		level = "debug",
		skip(subject),
		fields(subject_id = %subject.id, action = %action)
	)]
	pub fn prepare(subject: &Subject, action: Action, resource_type: &str) -> Result<Self> {
		if resource_type == resource::WILDCARD {
			return Err(RbacError::Compilation(
				"cannot compile for the wildcard resource type".to_string(),
			));
		}
		validate_request(&subject.id, resource_type)
			.map_err(|e| RbacError::Compilation(e.to_string()))?;

		let mut deny = Residual::never();
		let mut allow = Residual::never();

		for role in &subject.roles {
			for permission in role.permissions.iter().filter(|p| p.targets(resource_type, action)) {
				let target = match permission.effect {
					Effect::Deny => &mut deny,
					Effect::Allow => &mut allow,
				};
				match permission.scope {
					Scope::Site => *target = Residual::Always,
					Scope::Org => {
						// Without an org the permission can never apply.
						if let Some(org) = role.org_id() {
							target.add(Condition::OrgIs(org.to_string()));
						}
					}
					Scope::Owner => target.add(Condition::OwnerIs(subject.id.clone())),
				}
			}
		}

		allow.add(Condition::AclGrants(subject.id.clone()));

		let query = Self {
			subject_id: subject.id.clone(),
			role_names: subject.role_names().into_iter().map(str::to_string).collect(),
			action,
			resource_type: resource_type.to_string(),
			deny,
			allow,
		};
		tracing::trace!(constant = ?query.constant_decision(), "partial query compiled");
		Ok(query)
	}

	pub fn subject_id(&self) -> &str {
		&self.subject_id
	}

	pub fn role_names(&self) -> &[String] {
		&self.role_names
	}

	pub fn action(&self) -> Action {
		self.action
	}

	pub fn resource_type(&self) -> &str {
		&self.resource_type
	}

	pub fn deny_residual(&self) -> &Residual {
		&self.deny
	}

	pub fn allow_residual(&self) -> &Residual {
		&self.allow
	}

	/// The decision, if it does not depend on the object at all.
	pub fn constant_decision(&self) -> Option<Decision> {
		match (&self.deny, &self.allow) {
			(Residual::Always, _) => Some(Decision::Deny),
			(deny, Residual::Always) if deny.is_never() => Some(Decision::Allow),
			_ => None,
		}
	}

	pub fn is_constant(&self) -> bool {
		self.constant_decision().is_some()
	}

	/// Binds `object` into the residuals.
	///
	/// Objects of another type than the prepared one are an evaluation error.
	pub fn evaluate(&self, object: &Object) -> Result<Decision> {
		if object.resource_type != self.resource_type {
			return Err(RbacError::Evaluation(format!(
				"query prepared for '{}' evaluated against '{}'",
				self.resource_type, object.resource_type
			)));
		}

		if self.deny.holds(self.action, object) {
			return Ok(Decision::Deny);
		}
		if self.allow.holds(self.action, object) {
			return Ok(Decision::Allow);
		}
		Ok(Decision::Deny)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::evaluate;
	use crate::{Role, RoleRegistry, ScopedPermission};
	use proptest::prelude::*;

	fn builtin_subject(id: &str, roles: &[&str]) -> Subject {
		let registry = RoleRegistry::builtin().unwrap();
		Subject::new(id, registry.roles_by_name(roles).unwrap())
	}

	mod compile {
		use super::*;

		#[test]
		fn site_allow_is_constant() {
			let s = builtin_subject("root", &["admin"]);
			let query = PartialQuery::prepare(&s, Action::Delete, "workspace").unwrap();
			assert_eq!(query.constant_decision(), Some(Decision::Allow));
			assert_eq!(query.allow_residual(), &Residual::Always);
		}

		#[test]
		fn site_deny_is_constant() {
			let role = Role::new(
				"frozen",
				[
					ScopedPermission::allow("*", Action::Update, Scope::Site),
					ScopedPermission::deny("workspace", Action::Update, Scope::Site),
				],
			);
			let s = Subject::new("u1", vec![role]);
			let query = PartialQuery::prepare(&s, Action::Update, "workspace").unwrap();
			assert_eq!(query.constant_decision(), Some(Decision::Deny));
		}

		#[test]
		fn owner_scope_leaves_residual() {
			let s = builtin_subject("u1", &["member"]);
			let query = PartialQuery::prepare(&s, Action::Read, "workspace").unwrap();
			assert!(!query.is_constant());
			assert_eq!(
				query.allow_residual(),
				&Residual::AnyOf(vec![
					Condition::OwnerIs("u1".to_string()),
					Condition::AclGrants("u1".to_string()),
				])
			);
			assert!(query.deny_residual().is_never());
		}

		#[test]
		fn org_scope_leaves_residual() {
			let s = builtin_subject("u1", &["org-admin:A", "org-admin:B"]);
			let query = PartialQuery::prepare(&s, Action::Delete, "workspace").unwrap();
			assert_eq!(
				query.allow_residual(),
				&Residual::AnyOf(vec![
					Condition::OrgIs("A".to_string()),
					Condition::OrgIs("B".to_string()),
					Condition::AclGrants("u1".to_string()),
				])
			);
			assert_eq!(query.role_names(), &["org-admin:A", "org-admin:B"]);
		}

		#[test]
		fn unrelated_permissions_are_dropped() {
			let s = builtin_subject("u1", &["template-admin"]);
			let query = PartialQuery::prepare(&s, Action::Read, "workspace").unwrap();
			assert_eq!(
				query.allow_residual(),
				&Residual::AnyOf(vec![Condition::AclGrants("u1".to_string())])
			);
		}

		#[test]
		fn wildcard_type_fails_to_compile() {
			let s = builtin_subject("u1", &["member"]);
			assert!(matches!(
				PartialQuery::prepare(&s, Action::Read, "*"),
				Err(RbacError::Compilation(_))
			));
		}

		#[test]
		fn malformed_request_fails_to_compile() {
			let s = builtin_subject("", &["member"]);
			assert!(matches!(
				PartialQuery::prepare(&s, Action::Read, "workspace"),
				Err(RbacError::Compilation(_))
			));
			let s = builtin_subject("u1", &["member"]);
			assert!(PartialQuery::prepare(&s, Action::Read, "").is_err());
		}
	}

	mod evaluation {
		use super::*;

		#[test]
		fn type_mismatch_is_an_error() {
			let s = builtin_subject("root", &["admin"]);
			let query = PartialQuery::prepare(&s, Action::Read, "workspace").unwrap();
			assert!(matches!(
				query.evaluate(&Object::template()),
				Err(RbacError::Evaluation(_))
			));
		}

		#[test]
		fn acl_residual_binds_object_acl() {
			let s = builtin_subject("u1", &[]);
			let query = PartialQuery::prepare(&s, Action::Read, "template").unwrap();
			let shared = Object::template().with_acl_entry("u1", [Action::Read]);
			assert_eq!(query.evaluate(&shared).unwrap(), Decision::Allow);
			assert_eq!(query.evaluate(&Object::template()).unwrap(), Decision::Deny);
		}

		#[test]
		fn owner_deny_overrides_site_allow() {
			let role = Role::new(
				"mixed",
				[
					ScopedPermission::allow("workspace", Action::Read, Scope::Site),
					ScopedPermission::deny("workspace", Action::Read, Scope::Owner),
				],
			);
			let s = Subject::new("u1", vec![role]);
			let query = PartialQuery::prepare(&s, Action::Read, "workspace").unwrap();
			assert_eq!(
				query.evaluate(&Object::workspace().with_owner("u1")).unwrap(),
				Decision::Deny
			);
			assert_eq!(
				query.evaluate(&Object::workspace().with_owner("u2")).unwrap(),
				Decision::Allow
			);
		}
	}

	fn arb_action() -> impl Strategy<Value = Action> {
		prop_oneof![
			Just(Action::Create),
			Just(Action::Read),
			Just(Action::Update),
			Just(Action::Delete),
		]
	}

	fn arb_scope() -> impl Strategy<Value = Scope> {
		prop_oneof![Just(Scope::Site), Just(Scope::Org), Just(Scope::Owner)]
	}

	fn arb_permission() -> impl Strategy<Value = ScopedPermission> {
		(
			prop_oneof![Just("workspace"), Just("template"), Just("*")],
			arb_action(),
			prop_oneof![Just(Effect::Allow), Just(Effect::Deny)],
			arb_scope(),
		)
			.prop_map(|(resource_type, action, effect, scope)| ScopedPermission {
				resource_type: resource_type.to_string(),
				action,
				effect,
				scope,
			})
	}

	fn arb_role() -> impl Strategy<Value = Role> {
		(
			prop::collection::vec(arb_permission(), 0..6),
			prop::option::of(prop_oneof![Just("A"), Just("B"), Just("")]),
		)
			.prop_map(|(permissions, org)| {
				let role = Role::new("custom", permissions);
				match org {
					Some(org) => role.in_org(org),
					None => role,
				}
			})
	}

	fn arb_object() -> impl Strategy<Value = Object> {
		let user = prop_oneof![Just("u1"), Just("u2"), Just("")];
		(
			prop::option::of(user.clone()),
			prop::option::of(prop_oneof![Just("A"), Just("B"), Just("C")]),
			prop::collection::btree_map(user, prop::collection::btree_set(arb_action(), 0..3), 0..3),
		)
			.prop_map(|(owner, org, acl)| {
				let mut object = Object::workspace().with_acl_user_list(acl);
				object.owner = owner.map(str::to_string);
				object.org = org.map(str::to_string);
				object
			})
	}

	proptest! {
		#[test]
		fn partial_matches_full_evaluation(
			roles in prop::collection::vec(arb_role(), 0..4),
			action in arb_action(),
			objects in prop::collection::vec(arb_object(), 1..20),
		) {
			let subject = Subject::new("u1", roles);
			let query = PartialQuery::prepare(&subject, action, "workspace").unwrap();
			for object in &objects {
				let full = evaluate(&subject, action, object).unwrap().decision;
				prop_assert_eq!(query.evaluate(object).unwrap(), full);
			}
		}

		#[test]
		fn constant_queries_ignore_the_object(
			roles in prop::collection::vec(arb_role(), 0..4),
			action in arb_action(),
			objects in prop::collection::vec(arb_object(), 1..10),
		) {
			let subject = Subject::new("u1", roles);
			let query = PartialQuery::prepare(&subject, action, "workspace").unwrap();
			if let Some(decision) = query.constant_decision() {
				for object in &objects {
					prop_assert_eq!(query.evaluate(object).unwrap(), decision);
				}
			}
		}
	}
}

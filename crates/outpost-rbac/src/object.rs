// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Normalized view of a protected resource.
//!
//! Every resource type takes part in authorization the same way: it converts
//! itself into an [`Object`] through the [`RbacObject`] capability. The engine
//! only ever looks at that tuple and never special-cases a resource type.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::Action;

/// Resource type names known to the platform.
pub mod resource {
	/// Matches every resource type in a permission.
	pub const WILDCARD: &str = "*";

	pub const WORKSPACE: &str = "workspace";
	pub const WORKSPACE_EXECUTION: &str = "workspace_execution";
	pub const TEMPLATE: &str = "template";
	pub const ORGANIZATION: &str = "organization";
	pub const ORGANIZATION_MEMBER: &str = "organization_member";
	pub const PROVISIONER_DAEMON: &str = "provisioner_daemon";
	pub const FILE: &str = "file";
	pub const USER: &str = "user";
	pub const USER_DATA: &str = "user_data";
	pub const LICENSE: &str = "license";
}

/// Attributes of the resource being accessed.
///
/// Empty owner or organization strings are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Object {
	#[serde(rename = "type")]
	pub resource_type: String,
	pub resource_id: Option<String>,
	pub owner: Option<String>,
	pub org: Option<String>,
	/// Direct grants: user id to the actions that user may perform on this object.
	pub acl: BTreeMap<String, BTreeSet<Action>>,
}

impl Object {
	/// Creates an object of the given type with no owner, organization or ACL.
	pub fn new(resource_type: impl Into<String>) -> Self {
		Self {
			resource_type: resource_type.into(),
			resource_id: None,
			owner: None,
			org: None,
			acl: BTreeMap::new(),
		}
	}

	pub fn workspace() -> Self {
		Self::new(resource::WORKSPACE)
	}

	pub fn workspace_execution() -> Self {
		Self::new(resource::WORKSPACE_EXECUTION)
	}

	pub fn template() -> Self {
		Self::new(resource::TEMPLATE)
	}

	pub fn organization(org_id: impl Into<String>) -> Self {
		Self::new(resource::ORGANIZATION).in_org(org_id)
	}

	pub fn organization_member() -> Self {
		Self::new(resource::ORGANIZATION_MEMBER)
	}

	pub fn provisioner_daemon() -> Self {
		Self::new(resource::PROVISIONER_DAEMON)
	}

	pub fn file() -> Self {
		Self::new(resource::FILE)
	}

	/// The site-wide user resource.
	pub fn user() -> Self {
		Self::new(resource::USER)
	}

	/// Data belonging to a single user, owned by that user.
	pub fn user_data(user_id: impl Into<String>) -> Self {
		Self::new(resource::USER_DATA).with_owner(user_id)
	}

	pub fn license() -> Self {
		Self::new(resource::LICENSE)
	}

	/// Builder: set the owning organization.
	pub fn in_org(mut self, org_id: impl Into<String>) -> Self {
		self.org = Some(org_id.into());
		self
	}

	/// Builder: set the owning user.
	pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
		self.owner = Some(owner_id.into());
		self
	}

	/// Builder: set the instance id.
	pub fn with_id(mut self, resource_id: impl Into<String>) -> Self {
		self.resource_id = Some(resource_id.into());
		self
	}

	/// Builder: replace the ACL with the given user list.
	pub fn with_acl_user_list<U, A>(mut self, acl: impl IntoIterator<Item = (U, A)>) -> Self
	where
		U: Into<String>,
		A: IntoIterator<Item = Action>,
	{
		self.acl = acl
			.into_iter()
			.map(|(user, actions)| (user.into(), actions.into_iter().collect()))
			.collect();
		self
	}

	/// Builder: add actions to one user's ACL entry.
	pub fn with_acl_entry(
		mut self,
		user_id: impl Into<String>,
		actions: impl IntoIterator<Item = Action>,
	) -> Self {
		self.acl.entry(user_id.into()).or_default().extend(actions);
		self
	}

	pub fn owner_id(&self) -> Option<&str> {
		self.owner.as_deref().filter(|o| !o.is_empty())
	}

	pub fn org_id(&self) -> Option<&str> {
		self.org.as_deref().filter(|o| !o.is_empty())
	}

	/// Returns true if the ACL grants `action` to `user_id` directly.
	pub fn acl_allows(&self, user_id: &str, action: Action) -> bool {
		self
			.acl
			.get(user_id)
			.map(|actions| actions.contains(&action))
			.unwrap_or(false)
	}
}

/// Capability implemented by every resource type that takes part in authorization.
pub trait RbacObject {
	fn rbac_object(&self) -> Object;
}

impl RbacObject for Object {
	fn rbac_object(&self) -> Object {
		self.clone()
	}
}

impl<T: RbacObject + ?Sized> RbacObject for &T {
	fn rbac_object(&self) -> Object {
		(**self).rbac_object()
	}
}

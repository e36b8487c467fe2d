// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-template user access lists.
//!
//! Templates can be shared with individual users independent of their roles.
//! A [`UserAcl`] stores one [`TemplateRole`] per user and expands into the
//! action sets carried by an [`Object`]'s ACL.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{Action, Object};

/// Access level granted to a user on a single template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateRole {
	Read,
	Write,
	Admin,
}

impl TemplateRole {
	/// Actions granted by this access level.
	pub fn actions(&self) -> &'static [Action] {
		match self {
			TemplateRole::Read => &[Action::Read],
			TemplateRole::Write => &[Action::Read, Action::Update],
			TemplateRole::Admin => Action::all(),
		}
	}
}

/// Template access list: user id to access level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserAcl(BTreeMap<String, TemplateRole>);

impl UserAcl {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn grant(mut self, user_id: impl Into<String>, role: TemplateRole) -> Self {
		self.0.insert(user_id.into(), role);
		self
	}

	pub fn role(&self, user_id: &str) -> Option<TemplateRole> {
		self.0.get(user_id).copied()
	}

	/// Expands every entry into its action set.
	pub fn actions(&self) -> BTreeMap<String, BTreeSet<Action>> {
		self
			.0
			.iter()
			.map(|(user, role)| (user.clone(), role.actions().iter().copied().collect()))
			.collect()
	}
}

/// A template as seen by authorization: it lives in an organization and
/// carries its own user access list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
	pub id: String,
	pub organization_id: String,
	pub user_acl: UserAcl,
}

impl crate::RbacObject for Template {
	fn rbac_object(&self) -> Object {
		Object::template()
			.with_id(self.id.clone())
			.in_org(self.organization_id.clone())
			.with_acl_user_list(self.user_acl.actions())
	}
}

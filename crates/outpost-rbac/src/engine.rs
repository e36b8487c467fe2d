// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Full policy evaluation.
//!
//! [`evaluate`] decides a single `(subject, action, object)` request:
//!
//! 1. Collect every permission of every held role that targets the object's
//!    type and the requested action and whose scope holds for the object
//! 2. Consult the object's ACL entry for the subject (an implicit allow)
//! 3. Any applicable deny wins; otherwise any allow grants; otherwise deny
//!
//! Evaluation is a pure function of its inputs.

use serde::Serialize;
use std::fmt;
use tracing::instrument;

use crate::error::{RbacError, Result};
use crate::object::resource;
use crate::{Action, Effect, Object, ScopedPermission, Subject};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
	Allow,
	Deny,
}

impl Decision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, Decision::Allow)
	}
}

impl fmt::Display for Decision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Decision::Allow => write!(f, "allow"),
			Decision::Deny => write!(f, "deny"),
		}
	}
}

/// A role permission that applied to the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedPermission {
	pub role: String,
	pub permission: ScopedPermission,
}

/// A decision together with the permissions that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
	pub decision: Decision,
	pub matched: Vec<MatchedPermission>,
	pub acl_allowed: bool,
}

impl Evaluation {
	/// Human-readable reason, for logs.
	pub fn reason(&self) -> String {
		if let Some(deny) = self.matched.iter().find(|m| m.permission.effect == Effect::Deny) {
			return format!(
				"denied by role '{}' ({} {} at {} scope)",
				deny.role, deny.permission.action, deny.permission.resource_type, deny.permission.scope
			);
		}
		if let Some(allow) = self.matched.first() {
			return format!("allowed by role '{}'", allow.role);
		}
		if self.acl_allowed {
			return "allowed by object ACL".to_string();
		}
		"no permission grants the action".to_string()
	}
}

/// Checks that a request is well formed enough to evaluate.
pub(crate) fn validate_request(subject_id: &str, resource_type: &str) -> Result<()> {
	if subject_id.is_empty() {
		return Err(RbacError::Evaluation("subject id is empty".to_string()));
	}
	if resource_type.is_empty() {
		return Err(RbacError::Evaluation("object type is empty".to_string()));
	}
	if resource_type == resource::WILDCARD {
		return Err(RbacError::Evaluation(
			"object type cannot be the wildcard".to_string(),
		));
	}
	Ok(())
}

/// Evaluates whether `subject` may perform `action` on `object`.
#[instrument(
	level = "debug",
	skip(subject, object),
	fields(
		subject_id = %subject.id,
		action = %action,
		resource_type = %object.resource_type,
	)
)]
pub fn evaluate(subject: &Subject, action: Action, object: &Object) -> Result<Evaluation> {
	validate_request(&subject.id, &object.resource_type)?;

	let matched: Vec<MatchedPermission> = subject
		.roles
		.iter()
		.flat_map(|role| {
			role
				.permissions
				.iter()
				.filter(move |p| p.targets(&object.resource_type, action))
				.filter(move |p| role.scope_holds(p, &subject.id, object))
				.map(move |p| MatchedPermission {
					role: role.name.clone(),
					permission: p.clone(),
				})
		})
		.collect();

	let acl_allowed = object.acl_allows(&subject.id, action);

	let denied = matched.iter().any(|m| m.permission.effect == Effect::Deny);
	let allowed = acl_allowed || matched.iter().any(|m| m.permission.effect == Effect::Allow);

	let decision = if denied {
		Decision::Deny
	} else if allowed {
		Decision::Allow
	} else {
		Decision::Deny
	};

	tracing::trace!(%decision, matched = matched.len(), acl_allowed, "evaluated");

	Ok(Evaluation {
		decision,
		matched,
		acl_allowed,
	})
}

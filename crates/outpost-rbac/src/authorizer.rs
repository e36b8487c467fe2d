// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The authorization facade.
//!
//! [`Authorizer`] is the single entry point for HTTP handlers, background jobs
//! and anything else that needs a decision. Every outcome other than "allowed"
//! is a [`Forbidden`] error: policy denials, unknown role names, evaluation
//! failures and compilation failures alike. Callers should report a
//! `Forbidden` on a specific resource as "not found" so its existence is not
//! confirmed to unauthorized users.
//!
//! # Security Properties
//!
//! - Fail-closed: no internal error ever results in `Ok(())`
//! - Decisions are logged with subject id, action and resource type; ACL
//!   contents and forbidden diagnostics never leave the server
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use outpost_rbac::{Action, Authorizer, Object, RbacAuthorizer, RoleRegistry};
//!
//! let authorizer = RbacAuthorizer::new(Arc::new(RoleRegistry::builtin().unwrap()));
//! let roles = vec!["member".to_string()];
//! let workspace = Object::workspace().with_owner("u1").in_org("A");
//!
//! assert!(authorizer.authorize("u1", &roles, Action::Read, &workspace).is_ok());
//! assert!(authorizer.authorize("u2", &roles, Action::Read, &workspace).is_err());
//! ```

use outpost_rbac_config::{AuthzConfig, CacheConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheKey, PartialQueryCache};
use crate::engine::{self, Decision};
use crate::error::{Forbidden, RbacError};
use crate::{Action, Object, PartialQuery, Role, RoleRegistry, Subject};

const POLICY_DENIED: &str = "policy disallows request";

/// Decides whether a subject holding named roles may act on an object.
pub trait Authorizer: Send + Sync {
	/// Resolves role names, failing with a forbidden error on any unknown name.
	fn resolve_roles(&self, role_names: &[String]) -> Result<Vec<Role>, Forbidden>;

	/// Full evaluation with roles already resolved, by
	/// [`Authorizer::resolve_roles`] or built by hand.
	fn authorize_roles(
		&self,
		subject_id: &str,
		roles: &[Role],
		action: Action,
		object: &Object,
	) -> Result<(), Forbidden>;

	/// Full evaluation of a single request.
	fn authorize(
		&self,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		object: &Object,
	) -> Result<(), Forbidden>;

	/// Same contract as [`Authorizer::authorize`], through a compiled partial query.
	fn authorize_partial(
		&self,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		object: &Object,
	) -> Result<(), Forbidden>;

	/// Compiles a query for evaluating many objects of `resource_type`.
	fn prepare_partial(
		&self,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		resource_type: &str,
	) -> Result<Arc<PartialQuery>, Forbidden>;
}

/// [`Authorizer`] backed by a [`RoleRegistry`] and the native engine.
#[derive(Debug)]
pub struct RbacAuthorizer {
	registry: Arc<RoleRegistry>,
	cache: Option<PartialQueryCache>,
}

impl RbacAuthorizer {
	/// Creates an authorizer without a query cache.
	pub fn new(registry: Arc<RoleRegistry>) -> Self {
		Self {
			registry,
			cache: None,
		}
	}

	/// Creates an authorizer whose compiled queries are cached per `config`.
	pub fn with_cache(registry: Arc<RoleRegistry>, config: &CacheConfig) -> Self {
		Self {
			registry,
			cache: PartialQueryCache::from_config(config),
		}
	}

	/// Creates an authorizer over the built-in role catalog.
	pub fn from_config(config: &AuthzConfig) -> Result<Self, RbacError> {
		let registry = RoleRegistry::builtin()?;
		info!(
			catalog_version = registry.version(),
			cache_enabled = config.cache.enabled,
			"authorizer initialized"
		);
		Ok(Self::with_cache(Arc::new(registry), &config.cache))
	}

	pub fn registry(&self) -> &RoleRegistry {
		&self.registry
	}

	/// Number of compiled queries currently retained.
	pub fn cached_queries(&self) -> usize {
		self.cache.as_ref().map(PartialQueryCache::len).unwrap_or(0)
	}

	/// Compiles a partial query with already-resolved roles. Never cached.
	pub fn prepare_roles(
		&self,
		subject_id: &str,
		roles: &[Role],
		action: Action,
		resource_type: &str,
	) -> Result<PartialQuery, Forbidden> {
		let subject = Subject::new(subject_id, roles.to_vec());
		PartialQuery::prepare(&subject, action, resource_type).map_err(|e| {
			warn!(error = %e, resource_type, "partial query compilation failed");
			let context = request_context(
				subject_id,
				&subject.role_names(),
				action,
				json!({ "type": resource_type }),
			);
			Forbidden::internal(e, context)
		})
	}

	/// Evaluates a compiled query against one object.
	pub fn check_query(&self, query: &PartialQuery, object: &Object) -> Result<(), Forbidden> {
		let roles: Vec<&str> = query.role_names().iter().map(String::as_str).collect();
		self.check_compiled(query, &roles, object)
	}

	/// Like [`RbacAuthorizer::check_query`], reporting `role_names` as sent by
	/// the caller. A cached query keeps the role list of whoever compiled it.
	fn check_compiled(&self, query: &PartialQuery, role_names: &[&str], object: &Object) -> Result<(), Forbidden> {
		let context = || {
			let context = request_context(query.subject_id(), role_names, query.action(), json!(object));
			with_field(context, "query", json!(query))
		};

		match query.evaluate(object) {
			Ok(Decision::Allow) => Ok(()),
			Ok(Decision::Deny) => {
				info!(
					subject_id = %query.subject_id(),
					action = %query.action(),
					resource_type = %object.resource_type,
					"authorization denied by partial query"
				);
				Err(Forbidden::denied(POLICY_DENIED, context()))
			}
			Err(e) => {
				warn!(error = %e, "partial query evaluation failed");
				Err(Forbidden::internal(e, context()))
			}
		}
	}

	fn forbid_unknown_role(
		&self,
		err: RbacError,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		target: Value,
	) -> Forbidden {
		warn!(subject_id, error = %err, "role resolution failed");
		let names: Vec<&str> = role_names.iter().map(String::as_str).collect();
		Forbidden::internal(err, request_context(subject_id, &names, action, target))
	}
}

impl Authorizer for RbacAuthorizer {
	fn resolve_roles(&self, role_names: &[String]) -> Result<Vec<Role>, Forbidden> {
		self.registry.roles_by_name(role_names).map_err(|e| {
			warn!(error = %e, "role resolution failed");
			Forbidden::internal(e, json!({ "roles": role_names }))
		})
	}

	#[instrument(
		level = "debug",
		skip_all,
		fields(
			subject_id = %subject_id,
			action = %action,
			resource_type = %object.resource_type,
		)
	)]
	fn authorize_roles(
		&self,
		subject_id: &str,
		roles: &[Role],
		action: Action,
		object: &Object,
	) -> Result<(), Forbidden> {
		let subject = Subject::new(subject_id, roles.to_vec());
		let context = request_context(subject_id, &subject.role_names(), action, json!(object));

		match engine::evaluate(&subject, action, object) {
			Ok(evaluation) if evaluation.decision.is_allowed() => {
				debug!(reason = %evaluation.reason(), "authorization allowed");
				Ok(())
			}
			Ok(evaluation) => {
				let reason = evaluation.reason();
				info!(reason = %reason, "authorization denied");
				Err(Forbidden::denied(reason, with_field(context, "trace", json!(evaluation))))
			}
			Err(e) => {
				warn!(error = %e, "authorization evaluation failed");
				Err(Forbidden::internal(e, context))
			}
		}
	}

	fn authorize(
		&self,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		object: &Object,
	) -> Result<(), Forbidden> {
		let roles = self.registry.roles_by_name(role_names).map_err(|e| {
			self.forbid_unknown_role(e, subject_id, role_names, action, json!(object))
		})?;
		self.authorize_roles(subject_id, &roles, action, object)
	}

	fn authorize_partial(
		&self,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		object: &Object,
	) -> Result<(), Forbidden> {
		match self.prepare_partial(subject_id, role_names, action, &object.resource_type) {
			Ok(query) => {
				let names: Vec<&str> = role_names.iter().map(String::as_str).collect();
				self.check_compiled(&query, &names, object)
			}
			Err(err) if err.is_compilation_failure() => {
				debug!(reason = %err.reason(), "falling back to full evaluation");
				self.authorize(subject_id, role_names, action, object)
			}
			Err(err) => Err(err),
		}
	}

	#[instrument(
		level = "debug",
		skip_all,
		fields(subject_id = %subject_id, action = %action, resource_type = %resource_type)
	)]
	fn prepare_partial(
		&self,
		subject_id: &str,
		role_names: &[String],
		action: Action,
		resource_type: &str,
	) -> Result<Arc<PartialQuery>, Forbidden> {
		let key = self
			.cache
			.as_ref()
			.map(|_| CacheKey::new(subject_id, role_names, action, resource_type));

		if let (Some(cache), Some(key)) = (&self.cache, &key) {
			if let Some(query) = cache.get(key) {
				debug!("partial query cache hit");
				return Ok(query);
			}
		}

		let roles = self.registry.roles_by_name(role_names).map_err(|e| {
			self.forbid_unknown_role(e, subject_id, role_names, action, json!({ "type": resource_type }))
		})?;
		let query = self.prepare_roles(subject_id, &roles, action, resource_type)?;

		Ok(match (&self.cache, key) {
			(Some(cache), Some(key)) => cache.insert(key, query),
			_ => Arc::new(query),
		})
	}
}

fn request_context(subject_id: &str, role_names: &[&str], action: Action, target: Value) -> Value {
	json!({
		"subject": { "id": subject_id, "roles": role_names },
		"action": action,
		"object": target,
	})
}

fn with_field(mut context: Value, key: &str, value: Value) -> Value {
	if let Value::Object(map) = &mut context {
		map.insert(key.to_string(), value);
	}
	context
}

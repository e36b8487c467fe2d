// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Filtering collections down to the objects a subject may act on.
//!
//! Both functions preserve input order and return the same subset for the
//! same inputs. [`partial_filter`] compiles one query up front and is the one
//! to use for large listings.

use tracing::{debug, warn};

use crate::error::Forbidden;
use crate::{Action, Authorizer, Decision, RbacObject};

/// Keeps the objects `authorizer` allows `action` on, one full evaluation per
/// object.
///
/// Role names are resolved once, before any object is evaluated, so an unknown
/// role fails the whole call instead of silently excluding everything.
pub fn filter<A, T>(
	authorizer: &A,
	subject_id: &str,
	role_names: &[String],
	action: Action,
	objects: impl IntoIterator<Item = T>,
) -> Result<Vec<T>, Forbidden>
where
	A: Authorizer + ?Sized,
	T: RbacObject,
{
	let roles = authorizer.resolve_roles(role_names)?;

	let mut kept = Vec::new();
	let mut rejected = 0usize;
	for item in objects {
		let object = item.rbac_object();
		match authorizer.authorize_roles(subject_id, &roles, action, &object) {
			Ok(()) => kept.push(item),
			Err(_) => rejected += 1,
		}
	}

	debug!(subject_id, %action, kept = kept.len(), rejected, "filtered objects");
	Ok(kept)
}

/// Keeps the objects `authorizer` allows `action` on, compiling a single
/// query for `resource_type`.
///
/// Falls back to [`filter`] if the query cannot be compiled. Objects that
/// cannot be evaluated against the query, such as objects of another type,
/// are excluded.
pub fn partial_filter<A, T>(
	authorizer: &A,
	subject_id: &str,
	role_names: &[String],
	action: Action,
	resource_type: &str,
	objects: impl IntoIterator<Item = T>,
) -> Result<Vec<T>, Forbidden>
where
	A: Authorizer + ?Sized,
	T: RbacObject,
{
	let query = match authorizer.prepare_partial(subject_id, role_names, action, resource_type) {
		Ok(query) => query,
		Err(err) if err.is_compilation_failure() => {
			warn!(
				subject_id,
				resource_type,
				reason = %err.reason(),
				"partial query compilation failed, filtering with full evaluation"
			);
			return filter(authorizer, subject_id, role_names, action, objects);
		}
		Err(err) => return Err(err),
	};

	if query.constant_decision() == Some(Decision::Deny) {
		debug!(subject_id, %action, resource_type, "partial query denies every object");
		return Ok(Vec::new());
	}

	let mut kept = Vec::new();
	let mut rejected = 0usize;
	for item in objects {
		let object = item.rbac_object();
		match query.evaluate(&object) {
			Ok(Decision::Allow) => kept.push(item),
			Ok(Decision::Deny) => rejected += 1,
			Err(e) => {
				debug!(error = %e, "excluding object that cannot be evaluated");
				rejected += 1;
			}
		}
	}

	debug!(subject_id, %action, resource_type, kept = kept.len(), rejected, "partially filtered objects");
	Ok(kept)
}

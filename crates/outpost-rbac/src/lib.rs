// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role-based authorization for Outpost.
//!
//! This crate decides whether a subject, holding a set of named roles, may
//! perform an action on an object. It provides:
//! - A registry of built-in roles, including organization-scoped roles named
//!   `<role>:<org id>`
//! - A normalized object model with ownership, organization and per-user ACLs
//! - Full evaluation with deny-overrides-allow precedence
//! - Partial evaluation: a query compiled once per subject, action and
//!   resource type, then checked cheaply against many objects
//! - An [`Authorizer`] facade that turns every failure into [`Forbidden`]
//! - [`filter`] and [`partial_filter`] for narrowing collections
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use outpost_rbac::{partial_filter, Action, Object, RbacAuthorizer, RoleRegistry};
//!
//! let authorizer = RbacAuthorizer::new(Arc::new(RoleRegistry::builtin().unwrap()));
//! let roles = vec!["member".to_string(), "org-member:A".to_string()];
//! let workspaces = vec![
//! 	Object::workspace().with_owner("u1").in_org("A"),
//! 	Object::workspace().with_owner("u2").in_org("A"),
//! ];
//!
//! let visible = partial_filter(&authorizer, "u1", &roles, Action::Read, "workspace", workspaces).unwrap();
//! assert_eq!(visible.len(), 1);
//! ```

pub mod acl;
pub mod action;
pub mod authorizer;
pub mod cache;
pub mod engine;
pub mod error;
pub mod filter;
pub mod object;
pub mod partial;
pub mod registry;
pub mod role;

pub use acl::{Template, TemplateRole, UserAcl};
pub use action::Action;
pub use authorizer::{Authorizer, RbacAuthorizer};
pub use cache::PartialQueryCache;
pub use engine::{evaluate, Decision, Evaluation, MatchedPermission};
pub use error::{Forbidden, RbacError, Result};
pub use filter::{filter, partial_filter};
pub use object::{resource, Object, RbacObject};
pub use partial::{Condition, PartialQuery, Residual};
pub use registry::RoleRegistry;
pub use role::{Effect, Role, Scope, ScopedPermission, Subject};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for authorization.
//!
//! [`RbacError`] describes internal failures. None of them ever reaches an API
//! caller as-is: the [`Authorizer`](crate::Authorizer) facade folds every
//! failure, together with genuine policy denials, into [`Forbidden`].

use serde_json::Value;
use thiserror::Error;

/// Internal failures of the registry, engine and compiler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RbacError {
	#[error("unknown role: {0}")]
	UnknownRole(String),

	#[error("evaluation failed: {0}")]
	Evaluation(String),

	#[error("partial query compilation failed: {0}")]
	Compilation(String),

	#[error("invalid role catalog: {0}")]
	Catalog(String),
}

/// Result type for registry, engine and compiler operations.
pub type Result<T> = std::result::Result<T, RbacError>;

/// The only error an authorization call returns.
///
/// `Display` never includes the reason, the cause or the context: those are
/// for server-side logs and are reachable through the accessors only.
#[derive(Debug, Error)]
#[error("forbidden")]
pub struct Forbidden {
	reason: String,
	#[source]
	cause: Option<RbacError>,
	context: Value,
}

impl Forbidden {
	/// A genuine policy denial.
	pub fn denied(reason: impl Into<String>, context: Value) -> Self {
		Self {
			reason: reason.into(),
			cause: None,
			context,
		}
	}

	/// A denial caused by an internal failure.
	pub fn internal(cause: RbacError, context: Value) -> Self {
		Self {
			reason: cause.to_string(),
			cause: Some(cause),
			context,
		}
	}

	pub fn reason(&self) -> &str {
		&self.reason
	}

	/// The internal failure behind this denial, if it was not a policy decision.
	pub fn cause(&self) -> Option<&RbacError> {
		self.cause.as_ref()
	}

	/// Raw evaluation input and decision trace.
	pub fn context(&self) -> &Value {
		&self.context
	}

	pub fn is_unknown_role(&self) -> bool {
		matches!(self.cause, Some(RbacError::UnknownRole(_)))
	}

	pub fn is_compilation_failure(&self) -> bool {
		matches!(self.cause, Some(RbacError::Compilation(_)))
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache of compiled partial queries shared across requests.
//!
//! The lock guards lookup and insertion only; evaluation always runs on an
//! `Arc` clone taken outside the lock.

use outpost_rbac_config::CacheConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::{Action, PartialQuery};

/// Identifies a compiled query. Role order does not affect the decision, so
/// role names are stored sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
	subject_id: String,
	role_names: Vec<String>,
	action: Action,
	resource_type: String,
}

impl CacheKey {
	pub fn new(subject_id: &str, role_names: &[String], action: Action, resource_type: &str) -> Self {
		let mut role_names = role_names.to_vec();
		role_names.sort();
		role_names.dedup();
		Self {
			subject_id: subject_id.to_string(),
			role_names,
			action,
			resource_type: resource_type.to_string(),
		}
	}
}

/// Bounded cache of compiled queries.
///
/// When an insert finds the cache full, the whole map is replaced by a fresh
/// one holding only the new query, so recent requests always get a slot.
#[derive(Debug)]
pub struct PartialQueryCache {
	capacity: usize,
	entries: RwLock<HashMap<CacheKey, Arc<PartialQuery>>>,
}

impl PartialQueryCache {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity: capacity.max(1),
			entries: RwLock::new(HashMap::new()),
		}
	}

	/// Returns `None` when the configuration disables caching.
	pub fn from_config(config: &CacheConfig) -> Option<Self> {
		(config.enabled && config.capacity > 0).then(|| Self::new(config.capacity))
	}

	pub fn get(&self, key: &CacheKey) -> Option<Arc<PartialQuery>> {
		self.entries.read().get(key).cloned()
	}

	/// Stores `query` unless another caller stored one for `key` first, and
	/// returns whichever is cached.
	pub fn insert(&self, key: CacheKey, query: PartialQuery) -> Arc<PartialQuery> {
		let mut entries = self.entries.write();
		if let Some(existing) = entries.get(&key) {
			return Arc::clone(existing);
		}

		if entries.len() >= self.capacity {
			debug!(capacity = self.capacity, "partial query cache full, starting a new generation");
			*entries = HashMap::with_capacity(self.capacity);
		}

		let query = Arc::new(query);
		entries.insert(key, Arc::clone(&query));
		query
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}

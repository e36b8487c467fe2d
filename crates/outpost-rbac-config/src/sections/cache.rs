// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Compiled partial-query cache configuration.

use serde::Deserialize;

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Partial-query cache configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
	pub enabled: bool,
	pub capacity: usize,
}

impl Default for CacheConfig {
	fn default() -> Self {
		CacheConfigLayer::default().finalize()
	}
}

/// Partial-query cache configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub capacity: Option<usize>,
}

impl CacheConfigLayer {
	pub fn merge(&mut self, other: CacheConfigLayer) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.capacity.is_some() {
			self.capacity = other.capacity;
		}
	}

	pub fn finalize(self) -> CacheConfig {
		CacheConfig {
			enabled: self.enabled.unwrap_or(true),
			capacity: self.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
		}
	}
}

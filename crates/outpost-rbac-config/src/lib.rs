// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Outpost authorization engine.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`OUTPOST_RBAC_*`)
//! - [`init_tracing`] for installing the process-wide tracing subscriber
//!
//! # Usage
//!
//! ```ignore
//! use outpost_rbac_config::{init_tracing, load_config};
//!
//! let config = load_config()?;
//! init_tracing(&config.logging);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;
pub mod telemetry;

pub use error::ConfigError;
pub use layer::AuthzConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};
pub use telemetry::init_tracing;

use tracing::{debug, info};

/// Fully resolved authorization configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthzConfig {
	pub cache: CacheConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`OUTPOST_RBAC_*`)
/// 2. Config file (`/etc/outpost/rbac.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<AuthzConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<AuthzConfig, ConfigError> {
	load_from_sources(vec![Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<AuthzConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<AuthzConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = AuthzConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: AuthzConfigLayer) -> Result<AuthzConfig, ConfigError> {
	let cache = layer.cache.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&cache)?;

	info!(
		cache_enabled = cache.enabled,
		cache_capacity = cache.capacity,
		log_level = %logging.level,
		"Authorization configuration loaded"
	);

	Ok(AuthzConfig { cache, logging })
}

/// Validate cross-field configuration rules.
fn validate_config(cache: &CacheConfig) -> Result<(), ConfigError> {
	if cache.enabled && cache.capacity == 0 {
		return Err(ConfigError::Validation(
			"partial query cache is enabled with capacity 0; set OUTPOST_RBAC_CACHE_CAPACITY \
			 to a positive value or disable the cache"
				.to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_enabled_cache_needs_capacity() {
		let cache = CacheConfig {
			enabled: true,
			capacity: 0,
		};
		let result = validate_config(&cache);
		assert!(result.unwrap_err().to_string().contains("capacity 0"));
	}

	#[test]
	fn test_disabled_cache_with_zero_capacity_ok() {
		let cache = CacheConfig {
			enabled: false,
			capacity: 0,
		};
		assert!(validate_config(&cache).is_ok());
	}

	#[test]
	fn test_finalize_defaults() {
		let config = finalize(AuthzConfigLayer::default()).unwrap();
		assert_eq!(config, AuthzConfig::default());
		assert!(config.cache.enabled);
	}

	#[test]
	fn test_file_overrides_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[cache]\ncapacity = 7").unwrap();

		let config = load_from_sources(vec![
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		])
		.unwrap();
		assert_eq!(config.cache.capacity, 7);
		assert!(config.cache.enabled);
		assert_eq!(config.logging.level, "info");
	}
}

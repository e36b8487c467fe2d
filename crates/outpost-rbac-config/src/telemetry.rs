// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing subscriber setup for processes embedding the authorization engine.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::sections::{LogFormat, LoggingConfig};

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(logging: &LoggingConfig) -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

/// Installs the global tracing subscriber.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(logging: &LoggingConfig) -> bool {
	let filter = env_filter(logging);

	let result = match logging.format {
		LogFormat::Json => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json())
			.try_init(),
		LogFormat::Compact => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().compact())
			.try_init(),
		LogFormat::Pretty => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer())
			.try_init(),
	};

	result.is_ok()
}

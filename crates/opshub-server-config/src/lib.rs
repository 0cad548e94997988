// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the OpsHub RBAC core.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`OPSHUB_*`)
//!
//! # Usage
//!
//! ```ignore
//! use opshub_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("cache holds up to {} clusters", config.cluster_cache.max_entries);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::OpsHubConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpsHubConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub cluster_cache: ClusterCacheConfig,
	pub rbac: RbacConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`OPSHUB_*`)
/// 2. Config file (`/etc/opshub/rbac.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<OpsHubConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<OpsHubConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<OpsHubConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<OpsHubConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = OpsHubConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: OpsHubConfigLayer) -> Result<OpsHubConfig, ConfigError> {
	let config = OpsHubConfig {
		database: layer.database.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		cluster_cache: layer.cluster_cache.unwrap_or_default().finalize(),
		rbac: layer.rbac.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		database = %config.database.url,
		max_entries = config.cluster_cache.max_entries,
		idle_ttl_secs = config.cluster_cache.idle_ttl_secs,
		failure_threshold = config.cluster_cache.failure_threshold,
		service_account_prefix = %config.rbac.service_account_prefix,
		credential_namespace = %config.rbac.credential_namespace,
		"RBAC configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &OpsHubConfig) -> Result<(), ConfigError> {
	if config.cluster_cache.max_entries == 0 {
		return Err(ConfigError::Validation(
			"cluster_cache.max_entries must be at least 1".to_string(),
		));
	}
	if config.cluster_cache.failure_threshold == 0 {
		return Err(ConfigError::Validation(
			"cluster_cache.failure_threshold must be at least 1".to_string(),
		));
	}

	let prefix = &config.rbac.service_account_prefix;
	if prefix.is_empty() || prefix.contains('-') {
		return Err(ConfigError::Validation(format!(
			"rbac.service_account_prefix '{prefix}' must be non-empty and must not contain '-'"
		)));
	}
	if config.rbac.credential_namespace.trim().is_empty() {
		return Err(ConfigError::Validation(
			"rbac.credential_namespace must not be empty".to_string(),
		));
	}

	Ok(())
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::OpsHubConfigLayer;
use crate::sections::{
	ClusterCacheConfigLayer, DatabaseConfigLayer, LoggingConfigLayer, RbacConfigLayer,
};

/// Default location of the config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/opshub/rbac.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<OpsHubConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<OpsHubConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(OpsHubConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<OpsHubConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(OpsHubConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: OpsHubConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: OPSHUB_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<OpsHubConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(OpsHubConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: env_var("OPSHUB_DATABASE_URL"),
			}),
			logging: Some(LoggingConfigLayer {
				level: env_var("OPSHUB_LOG_LEVEL"),
			}),
			cluster_cache: Some(load_cluster_cache_from_env()?),
			rbac: Some(load_rbac_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(name: &str, type_name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v
			.trim()
			.parse()
			.map(Some)
			.map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {type_name} value '{v}'"),
			}),
		None => Ok(None),
	}
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	env_parse(name, "u32")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	env_parse(name, "u64")
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	env_parse(name, "usize")
}

fn load_cluster_cache_from_env() -> Result<ClusterCacheConfigLayer, ConfigError> {
	Ok(ClusterCacheConfigLayer {
		max_entries: env_usize("OPSHUB_CLUSTER_CACHE_MAX_ENTRIES")?,
		idle_ttl_secs: env_u64("OPSHUB_CLUSTER_CACHE_IDLE_TTL_SECS")?,
		failure_threshold: env_u32("OPSHUB_CLUSTER_CACHE_FAILURE_THRESHOLD")?,
		eviction_interval_secs: env_u64("OPSHUB_CLUSTER_CACHE_EVICTION_INTERVAL_SECS")?,
		connect_timeout_secs: env_u64("OPSHUB_CLUSTER_CONNECT_TIMEOUT_SECS")?,
		read_timeout_secs: env_u64("OPSHUB_CLUSTER_READ_TIMEOUT_SECS")?,
		probe_timeout_secs: env_u64("OPSHUB_CLUSTER_PROBE_TIMEOUT_SECS")?,
	})
}

fn load_rbac_from_env() -> Result<RbacConfigLayer, ConfigError> {
	Ok(RbacConfigLayer {
		service_account_prefix: env_var("OPSHUB_RBAC_SERVICE_ACCOUNT_PREFIX"),
		credential_namespace: env_var("OPSHUB_RBAC_CREDENTIAL_NAMESPACE"),
		operation_timeout_secs: env_u64("OPSHUB_RBAC_OPERATION_TIMEOUT_SECS")?,
	})
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cluster client cache configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_MAX_ENTRIES: usize = 64;
const DEFAULT_IDLE_TTL_SECS: u64 = 30 * 60;
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_EVICTION_INTERVAL_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// Cluster client cache configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterCacheConfig {
	/// Upper bound on live clients; the least recently used one is dropped
	/// to make room.
	pub max_entries: usize,
	/// Clients unused for this long are evicted. Zero disables idle eviction.
	pub idle_ttl_secs: u64,
	/// Consecutive connection failures through a cached client before it is
	/// discarded.
	pub failure_threshold: u32,
	pub eviction_interval_secs: u64,
	pub connect_timeout_secs: u64,
	pub read_timeout_secs: u64,
	pub probe_timeout_secs: u64,
}

impl ClusterCacheConfig {
	pub fn idle_ttl(&self) -> Option<Duration> {
		(self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
	}

	pub fn eviction_interval(&self) -> Duration {
		Duration::from_secs(self.eviction_interval_secs.max(1))
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_secs(self.connect_timeout_secs)
	}

	pub fn read_timeout(&self) -> Duration {
		Duration::from_secs(self.read_timeout_secs)
	}

	pub fn probe_timeout(&self) -> Duration {
		Duration::from_secs(self.probe_timeout_secs)
	}
}

impl Default for ClusterCacheConfig {
	fn default() -> Self {
		ClusterCacheConfigLayer::default().finalize()
	}
}

/// Cluster client cache configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterCacheConfigLayer {
	#[serde(default)]
	pub max_entries: Option<usize>,
	#[serde(default)]
	pub idle_ttl_secs: Option<u64>,
	#[serde(default)]
	pub failure_threshold: Option<u32>,
	#[serde(default)]
	pub eviction_interval_secs: Option<u64>,
	#[serde(default)]
	pub connect_timeout_secs: Option<u64>,
	#[serde(default)]
	pub read_timeout_secs: Option<u64>,
	#[serde(default)]
	pub probe_timeout_secs: Option<u64>,
}

impl ClusterCacheConfigLayer {
	pub fn merge(&mut self, other: ClusterCacheConfigLayer) {
		if other.max_entries.is_some() {
			self.max_entries = other.max_entries;
		}
		if other.idle_ttl_secs.is_some() {
			self.idle_ttl_secs = other.idle_ttl_secs;
		}
		if other.failure_threshold.is_some() {
			self.failure_threshold = other.failure_threshold;
		}
		if other.eviction_interval_secs.is_some() {
			self.eviction_interval_secs = other.eviction_interval_secs;
		}
		if other.connect_timeout_secs.is_some() {
			self.connect_timeout_secs = other.connect_timeout_secs;
		}
		if other.read_timeout_secs.is_some() {
			self.read_timeout_secs = other.read_timeout_secs;
		}
		if other.probe_timeout_secs.is_some() {
			self.probe_timeout_secs = other.probe_timeout_secs;
		}
	}

	pub fn finalize(self) -> ClusterCacheConfig {
		ClusterCacheConfig {
			max_entries: self.max_entries.unwrap_or(DEFAULT_MAX_ENTRIES),
			idle_ttl_secs: self.idle_ttl_secs.unwrap_or(DEFAULT_IDLE_TTL_SECS),
			failure_threshold: self.failure_threshold.unwrap_or(DEFAULT_FAILURE_THRESHOLD),
			eviction_interval_secs: self
				.eviction_interval_secs
				.unwrap_or(DEFAULT_EVICTION_INTERVAL_SECS),
			connect_timeout_secs: self
				.connect_timeout_secs
				.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
			read_timeout_secs: self.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
			probe_timeout_secs: self.probe_timeout_secs.unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = ClusterCacheConfig::default();
		assert_eq!(config.max_entries, 64);
		assert_eq!(config.failure_threshold, 3);
		assert_eq!(config.idle_ttl(), Some(Duration::from_secs(1800)));
		assert_eq!(config.probe_timeout(), Duration::from_secs(10));
	}

	#[test]
	fn test_zero_ttl_disables_idle_eviction() {
		let config = ClusterCacheConfigLayer {
			idle_ttl_secs: Some(0),
			..Default::default()
		}
		.finalize();
		assert_eq!(config.idle_ttl(), None);
	}

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut base = ClusterCacheConfigLayer {
			max_entries: Some(8),
			failure_threshold: Some(5),
			..Default::default()
		};
		base.merge(ClusterCacheConfigLayer {
			failure_threshold: Some(1),
			..Default::default()
		});
		let config = base.finalize();
		assert_eq!(config.max_entries, 8);
		assert_eq!(config.failure_threshold, 1);
	}
}

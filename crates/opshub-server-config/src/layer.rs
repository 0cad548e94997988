// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	ClusterCacheConfigLayer, DatabaseConfigLayer, LoggingConfigLayer, RbacConfigLayer,
};

/// Configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpsHubConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub cluster_cache: Option<ClusterCacheConfigLayer>,
	#[serde(default)]
	pub rbac: Option<RbacConfigLayer>,
}

impl OpsHubConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: OpsHubConfigLayer) {
		merge_option(
			&mut self.database,
			other.database,
			DatabaseConfigLayer::merge,
		);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_option(
			&mut self.cluster_cache,
			other.cluster_cache,
			ClusterCacheConfigLayer::merge,
		);
		merge_option(&mut self.rbac, other.rbac, RbacConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_empty_layers() {
		let mut base = OpsHubConfigLayer::default();
		base.merge(OpsHubConfigLayer::default());
		assert!(base.database.is_none());
		assert!(base.cluster_cache.is_none());
	}

	#[test]
	fn test_merge_other_overwrites_field_by_field() {
		let mut base = OpsHubConfigLayer {
			cluster_cache: Some(ClusterCacheConfigLayer {
				max_entries: Some(8),
				idle_ttl_secs: Some(60),
				..Default::default()
			}),
			..Default::default()
		};
		let other = OpsHubConfigLayer {
			cluster_cache: Some(ClusterCacheConfigLayer {
				max_entries: Some(16),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(other);
		let cache = base.cluster_cache.unwrap();
		assert_eq!(cache.max_entries, Some(16));
		assert_eq!(cache.idle_ttl_secs, Some(60));
	}

	#[test]
	fn test_merge_adds_missing_sections() {
		let mut base = OpsHubConfigLayer::default();
		base.merge(OpsHubConfigLayer {
			rbac: Some(RbacConfigLayer {
				service_account_prefix: Some("ops".to_string()),
				..Default::default()
			}),
			..Default::default()
		});
		assert_eq!(
			base.rbac.unwrap().service_account_prefix,
			Some("ops".to_string())
		);
	}

	#[test]
	fn test_deserialize_full_toml() {
		let layer: OpsHubConfigLayer = toml::from_str(
			r#"
[database]
url = "sqlite:/tmp/rbac.db"

[cluster_cache]
max_entries = 4
failure_threshold = 2

[rbac]
credential_namespace = "platform"
"#,
		)
		.unwrap();
		assert_eq!(
			layer.database.unwrap().url.as_deref(),
			Some("sqlite:/tmp/rbac.db")
		);
		assert_eq!(layer.cluster_cache.unwrap().failure_threshold, Some(2));
		assert!(layer.logging.is_none());
	}
}

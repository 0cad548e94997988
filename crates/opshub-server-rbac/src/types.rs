// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Typed results of engine operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use opshub_server_db::{PlatformUser, UserId};
use opshub_server_k8s::{ClusterRole, Namespace, PolicyRule, Role};
use serde::{Deserialize, Serialize};

/// Where a role lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "namespace")]
pub enum RoleScope {
	#[serde(rename = "ClusterRole")]
	Cluster,
	#[serde(rename = "Role")]
	Namespace(String),
}

impl RoleScope {
	pub fn namespace(&self) -> Option<&str> {
		match self {
			RoleScope::Cluster => None,
			RoleScope::Namespace(ns) => Some(ns),
		}
	}
}

/// One policy rule of a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
	pub api_groups: Vec<String>,
	pub resources: Vec<String>,
	pub verbs: Vec<String>,
	pub resource_names: Vec<String>,
	pub non_resource_urls: Vec<String>,
}

impl From<&PolicyRule> for RuleRecord {
	fn from(rule: &PolicyRule) -> Self {
		Self {
			api_groups: rule.api_groups.clone().unwrap_or_default(),
			resources: rule.resources.clone().unwrap_or_default(),
			verbs: rule.verbs.clone(),
			resource_names: rule.resource_names.clone().unwrap_or_default(),
			non_resource_urls: rule.non_resource_urls.clone().unwrap_or_default(),
		}
	}
}

/// A ClusterRole or namespaced Role as currently seen in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
	pub name: String,
	pub scope: RoleScope,
	pub labels: BTreeMap<String, String>,
	pub created_at: Option<DateTime<Utc>>,
	pub age: String,
	pub rules: Vec<RuleRecord>,
}

impl RoleRecord {
	pub fn from_cluster_role(role: &ClusterRole, now: DateTime<Utc>) -> Self {
		Self::from_parts(&role.metadata, RoleScope::Cluster, role.rules.as_deref(), now)
	}

	/// `namespace` is used when the object does not carry its own.
	pub fn from_role(role: &Role, namespace: &str, now: DateTime<Utc>) -> Self {
		let namespace = role
			.metadata
			.namespace
			.clone()
			.unwrap_or_else(|| namespace.to_string());
		Self::from_parts(
			&role.metadata,
			RoleScope::Namespace(namespace),
			role.rules.as_deref(),
			now,
		)
	}

	fn from_parts(
		metadata: &ObjectMeta,
		scope: RoleScope,
		rules: Option<&[PolicyRule]>,
		now: DateTime<Utc>,
	) -> Self {
		let created_at = metadata.creation_timestamp.as_ref().map(|t| t.0);
		Self {
			name: metadata.name.clone().unwrap_or_default(),
			scope,
			labels: metadata
				.labels
				.clone()
				.map(|labels| labels.into_iter().collect())
				.unwrap_or_default(),
			created_at,
			age: created_at.map(|ts| format_age(ts, now)).unwrap_or_default(),
			rules: rules
				.unwrap_or_default()
				.iter()
				.map(RuleRecord::from)
				.collect(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceInfo {
	pub name: String,
	pub phase: Option<String>,
	pub created_at: Option<DateTime<Utc>>,
	pub age: String,
	/// `None` when the pods could not be counted.
	pub pod_count: Option<usize>,
}

impl NamespaceInfo {
	pub fn from_namespace(namespace: &Namespace, now: DateTime<Utc>) -> Self {
		let created_at = namespace
			.metadata
			.creation_timestamp
			.as_ref()
			.map(|t| t.0);
		Self {
			name: namespace.metadata.name.clone().unwrap_or_default(),
			phase: namespace.status.as_ref().and_then(|s| s.phase.clone()),
			created_at,
			age: created_at.map(|ts| format_age(ts, now)).unwrap_or_default(),
			pod_count: None,
		}
	}
}

/// Which system supplied a credential user's timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
	/// The platform holds a credential record for the service account.
	Platform,
	/// The service account exists only in the cluster.
	Cluster,
}

/// A platform user who has a service account in a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialUser {
	pub user_id: UserId,
	pub username: String,
	pub real_name: String,
	pub service_account: String,
	pub namespace: String,
	pub created_at: Option<DateTime<Utc>>,
	pub source: CredentialSource,
}

/// One page of bindable users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableUsers {
	pub users: Vec<PlatformUser>,
	pub total: i64,
	pub page: u32,
	pub page_size: u32,
}

/// Human-readable age in the style of `kubectl get`: `<1m`, `Nm`, `Nh`, `Nd`.
pub fn format_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
	let elapsed = now.signed_duration_since(created_at);
	let minutes = elapsed.num_minutes();
	if minutes < 1 {
		"<1m".to_string()
	} else if minutes < 60 {
		format!("{minutes}m")
	} else if elapsed.num_hours() < 24 {
		format!("{}h", elapsed.num_hours())
	} else {
		format!("{}d", elapsed.num_days())
	}
}

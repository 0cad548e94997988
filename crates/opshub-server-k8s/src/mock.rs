// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory stand-in for a managed cluster.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::NamespaceStatus;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{ClusterRole, Namespace, PolicyRule, Role, ServiceAccount};

#[derive(Debug, Default)]
struct MockState {
	cluster_roles: BTreeMap<String, ClusterRole>,
	roles: BTreeMap<(String, String), Role>,
	namespaces: BTreeMap<String, Namespace>,
	pod_counts: BTreeMap<String, usize>,
	service_accounts: BTreeMap<(String, String), ServiceAccount>,
	queued_failures: VecDeque<K8sError>,
	unreachable: bool,
}

/// A mock K8s cluster that can be used for testing RBAC operations.
///
/// Objects are kept in memory and returned in name order. Failures can be
/// queued one call at a time with [`MockK8sClient::fail_next`], or the whole
/// cluster can be made unreachable.
#[derive(Debug, Clone, Default)]
pub struct MockK8sClient {
	state: Arc<Mutex<MockState>>,
	calls: Arc<AtomicUsize>,
	probes: Arc<AtomicUsize>,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self::default()
	}

	fn state(&self) -> MutexGuard<'_, MockState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Count the call and return the queued failure, if any.
	fn enter(&self) -> Result<MutexGuard<'_, MockState>, K8sError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let mut state = self.state();
		if let Some(err) = state.queued_failures.pop_front() {
			return Err(err);
		}
		if state.unreachable {
			return Err(K8sError::Transport {
				message: "connection refused".to_string(),
			});
		}
		Ok(state)
	}

	/// Total calls made through the [`K8sClient`] trait, probes included.
	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn probe_count(&self) -> usize {
		self.probes.load(Ordering::SeqCst)
	}

	/// Queue an error for the next call. Errors are returned in FIFO order.
	pub fn fail_next(&self, err: K8sError) {
		self.state().queued_failures.push_back(err);
	}

	pub fn set_unreachable(&self, unreachable: bool) {
		self.state().unreachable = unreachable;
	}

	pub fn add_cluster_role(&self, name: &str, rules: Vec<PolicyRule>) {
		let role = ClusterRole {
			metadata: object_meta(name, None, Utc::now()),
			rules: Some(rules),
			..Default::default()
		};
		self.state().cluster_roles.insert(name.to_string(), role);
	}

	pub fn add_role(&self, namespace: &str, name: &str, rules: Vec<PolicyRule>) {
		let role = Role {
			metadata: object_meta(name, Some(namespace), Utc::now()),
			rules: Some(rules),
		};
		self
			.state()
			.roles
			.insert((namespace.to_string(), name.to_string()), role);
	}

	pub fn add_namespace(&self, name: &str, pod_count: usize) {
		let namespace = Namespace {
			metadata: object_meta(name, None, Utc::now()),
			status: Some(NamespaceStatus {
				phase: Some("Active".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		let mut state = self.state();
		state.namespaces.insert(name.to_string(), namespace);
		state.pod_counts.insert(name.to_string(), pod_count);
	}

	/// Make pod listing in `namespace` fail with 403.
	pub fn deny_pod_listing(&self, namespace: &str) {
		self.state().pod_counts.remove(namespace);
	}

	pub fn add_service_account(&self, namespace: &str, name: &str, created_at: DateTime<Utc>) {
		let account = ServiceAccount {
			metadata: object_meta(name, Some(namespace), created_at),
			..Default::default()
		};
		self
			.state()
			.service_accounts
			.insert((namespace.to_string(), name.to_string()), account);
	}

	/// Convenience constructor for a resource rule.
	pub fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
		PolicyRule {
			api_groups: Some(api_groups.iter().map(|s| s.to_string()).collect()),
			resources: Some(resources.iter().map(|s| s.to_string()).collect()),
			verbs: verbs.iter().map(|s| s.to_string()).collect(),
			..Default::default()
		}
	}
}

fn object_meta(name: &str, namespace: Option<&str>, created_at: DateTime<Utc>) -> ObjectMeta {
	ObjectMeta {
		name: Some(name.to_string()),
		namespace: namespace.map(str::to_string),
		creation_timestamp: Some(Time(created_at)),
		..Default::default()
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn probe(&self) -> Result<(), K8sError> {
		self.probes.fetch_add(1, Ordering::SeqCst);
		self.enter().map(|_| ())
	}

	async fn list_cluster_roles(&self) -> Result<Vec<ClusterRole>, K8sError> {
		let state = self.enter()?;
		Ok(state.cluster_roles.values().cloned().collect())
	}

	async fn get_cluster_role(&self, name: &str) -> Result<ClusterRole, K8sError> {
		let state = self.enter()?;
		state
			.cluster_roles
			.get(name)
			.cloned()
			.ok_or_else(|| K8sError::NotFound {
				kind: "ClusterRole",
				name: name.to_string(),
			})
	}

	async fn delete_cluster_role(&self, name: &str) -> Result<(), K8sError> {
		let mut state = self.enter()?;
		state
			.cluster_roles
			.remove(name)
			.map(|_| ())
			.ok_or_else(|| K8sError::NotFound {
				kind: "ClusterRole",
				name: name.to_string(),
			})
	}

	async fn list_roles(&self, namespace: &str) -> Result<Vec<Role>, K8sError> {
		let state = self.enter()?;
		Ok(state
			.roles
			.iter()
			.filter(|((ns, _), _)| ns == namespace)
			.map(|(_, role)| role.clone())
			.collect())
	}

	async fn get_role(&self, namespace: &str, name: &str) -> Result<Role, K8sError> {
		let state = self.enter()?;
		state
			.roles
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
			.ok_or_else(|| K8sError::NotFound {
				kind: "Role",
				name: name.to_string(),
			})
	}

	async fn delete_role(&self, namespace: &str, name: &str) -> Result<(), K8sError> {
		let mut state = self.enter()?;
		state
			.roles
			.remove(&(namespace.to_string(), name.to_string()))
			.map(|_| ())
			.ok_or_else(|| K8sError::NotFound {
				kind: "Role",
				name: name.to_string(),
			})
	}

	async fn list_namespaces(&self) -> Result<Vec<Namespace>, K8sError> {
		let state = self.enter()?;
		Ok(state.namespaces.values().cloned().collect())
	}

	async fn count_pods(&self, namespace: &str) -> Result<usize, K8sError> {
		let state = self.enter()?;
		state
			.pod_counts
			.get(namespace)
			.copied()
			.ok_or_else(|| K8sError::ApiError {
				code: 403,
				message: format!("pods is forbidden in namespace {namespace}"),
			})
	}

	async fn list_service_accounts(&self, namespace: &str) -> Result<Vec<ServiceAccount>, K8sError> {
		let state = self.enter()?;
		Ok(state
			.service_accounts
			.iter()
			.filter(|((ns, _), _)| ns == namespace)
			.map(|(_, account)| account.clone())
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn returns_objects_by_namespace() {
		let mock = MockK8sClient::new();
		mock.add_role("dev", "viewer", vec![]);
		mock.add_role("prod", "viewer", vec![]);
		mock.add_role("prod", "editor", vec![]);

		let prod = mock.list_roles("prod").await.unwrap();
		let names: Vec<_> = prod
			.iter()
			.map(|r| r.metadata.name.clone().unwrap())
			.collect();
		assert_eq!(names, vec!["editor", "viewer"]);
	}

	#[tokio::test]
	async fn queued_failures_are_returned_once_in_order() {
		let mock = MockK8sClient::new();
		mock.fail_next(K8sError::Timeout);
		mock.fail_next(K8sError::ApiError {
			code: 403,
			message: "forbidden".to_string(),
		});

		assert_eq!(mock.list_namespaces().await, Err(K8sError::Timeout));
		assert!(matches!(
			mock.list_namespaces().await,
			Err(K8sError::ApiError { code: 403, .. })
		));
		assert!(mock.list_namespaces().await.unwrap().is_empty());
		assert_eq!(mock.call_count(), 3);
	}

	#[tokio::test]
	async fn unreachable_cluster_fails_every_call() {
		let mock = MockK8sClient::new();
		mock.set_unreachable(true);
		let err = mock.probe().await.unwrap_err();
		assert!(err.is_connection_failure());
		assert_eq!(mock.probe_count(), 1);

		mock.set_unreachable(false);
		assert!(mock.probe().await.is_ok());
	}

	#[tokio::test]
	async fn delete_missing_role_is_not_found() {
		let mock = MockK8sClient::new();
		let err = mock.delete_cluster_role("ghost").await.unwrap_err();
		assert_eq!(
			err,
			K8sError::NotFound {
				kind: "ClusterRole",
				name: "ghost".to_string()
			}
		);
	}

	#[tokio::test]
	async fn denied_pod_listing_is_forbidden() {
		let mock = MockK8sClient::new();
		mock.add_namespace("dev", 3);
		mock.add_namespace("secure", 1);
		mock.deny_pod_listing("secure");

		assert_eq!(mock.count_pods("dev").await, Ok(3));
		assert!(matches!(
			mock.count_pods("secure").await,
			Err(K8sError::ApiError { code: 403, .. })
		));
	}

	#[test]
	fn rule_helper_fills_fields() {
		let rule = MockK8sClient::rule(&[""], &["pods"], &["get", "list"]);
		assert_eq!(rule.api_groups, Some(vec!["".to_string()]));
		assert_eq!(rule.resources, Some(vec!["pods".to_string()]));
		assert_eq!(rule.verbs, vec!["get", "list"]);
		assert!(rule.resource_names.is_none());
	}
}

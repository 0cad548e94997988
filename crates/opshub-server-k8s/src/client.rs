// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{ClusterRole, Namespace, Role, ServiceAccount};

/// Trait for K8s client operations against one managed cluster.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the RBAC reads and deletes the platform performs.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Cheap liveness check, run once before a client is cached.
	async fn probe(&self) -> Result<(), K8sError>;

	/// List all cluster-scoped roles.
	async fn list_cluster_roles(&self) -> Result<Vec<ClusterRole>, K8sError>;

	/// Get a cluster role by name.
	async fn get_cluster_role(&self, name: &str) -> Result<ClusterRole, K8sError>;

	/// Delete a cluster role by name.
	async fn delete_cluster_role(&self, name: &str) -> Result<(), K8sError>;

	/// List roles in a namespace.
	async fn list_roles(&self, namespace: &str) -> Result<Vec<Role>, K8sError>;

	/// Get a namespaced role.
	async fn get_role(&self, namespace: &str, name: &str) -> Result<Role, K8sError>;

	/// Delete a namespaced role.
	async fn delete_role(&self, namespace: &str, name: &str) -> Result<(), K8sError>;

	/// List all namespaces.
	async fn list_namespaces(&self) -> Result<Vec<Namespace>, K8sError>;

	/// Count the pods in a namespace.
	async fn count_pods(&self, namespace: &str) -> Result<usize, K8sError>;

	/// List service accounts in a namespace.
	async fn list_service_accounts(&self, namespace: &str) -> Result<Vec<ServiceAccount>, K8sError>;
}

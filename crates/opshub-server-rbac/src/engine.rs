// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The RBAC reconciliation engine.
//!
//! Role and namespace reads go to the live cluster only. Binding operations
//! touch the local store only. Credential users are the one place the two
//! are merged: the cluster decides which service accounts exist, the local
//! records supply provenance where they have it.
//!
//! Bindings that reference a role since deleted from the cluster are left
//! alone. They show up in binding listings and are never repaired here.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use opshub_server_db::{
	BoundUser, ClusterId, CredentialStore, DbError, NewRoleBinding, RoleBinding, RoleBindingStore,
	RoleType, UserId, UserStore,
};
use opshub_server_k8s::K8sError;
use tracing::{debug, info, instrument, warn};

use crate::cache::{ClusterClientCache, ClusterLease};
use crate::context::OperationContext;
use crate::error::{RbacError, Result};
use crate::identity::IdentityMapper;
use crate::types::{
	AvailableUsers, CredentialSource, CredentialUser, NamespaceInfo, RoleRecord,
};

const MAX_NAME_LEN: usize = 255;
const POD_COUNT_CONCURRENCY: usize = 8;
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

pub struct RbacEngine {
	cache: Arc<ClusterClientCache>,
	bindings: Arc<dyn RoleBindingStore>,
	credentials: Arc<dyn CredentialStore>,
	users: Arc<dyn UserStore>,
	identity: IdentityMapper,
	credential_namespace: String,
}

impl RbacEngine {
	pub fn new(
		cache: Arc<ClusterClientCache>,
		bindings: Arc<dyn RoleBindingStore>,
		credentials: Arc<dyn CredentialStore>,
		users: Arc<dyn UserStore>,
		identity: IdentityMapper,
		credential_namespace: impl Into<String>,
	) -> Self {
		Self {
			cache,
			bindings,
			credentials,
			users,
			identity,
			credential_namespace: credential_namespace.into(),
		}
	}

	pub fn cache(&self) -> &Arc<ClusterClientCache> {
		&self.cache
	}

	pub fn identity(&self) -> &IdentityMapper {
		&self.identity
	}

	/// Report the outcome of a cluster call to the cache and attach context
	/// to a failure.
	async fn finish<T>(
		&self,
		lease: &ClusterLease,
		operation: &'static str,
		result: std::result::Result<T, K8sError>,
	) -> Result<T> {
		self.cache.record_outcome(lease, &result).await;
		result.map_err(|e| {
			warn!(cluster_id = %lease.cluster_id(), operation, error = %e, "Cluster API call failed");
			if e.is_connection_failure() {
				RbacError::connection_failed(lease.cluster_id(), e.to_string())
			} else {
				RbacError::cluster_api(lease.cluster_id(), operation, e)
			}
		})
	}

	#[instrument(skip(self, ctx), fields(cluster_id = %cluster_id))]
	pub async fn list_cluster_roles(
		&self,
		ctx: &OperationContext,
		cluster_id: ClusterId,
	) -> Result<Vec<RoleRecord>> {
		const OP: &str = "listClusterRoles";
		ctx.run(OP, async {
			let lease = self.cache.acquire(cluster_id).await?;
			let result = lease.client().list_cluster_roles().await;
			let roles = self.finish(&lease, OP, result).await?;

			let now = Utc::now();
			let records: Vec<_> = roles
				.iter()
				.map(|role| RoleRecord::from_cluster_role(role, now))
				.collect();
			debug!(count = records.len(), "listed cluster roles");
			Ok(records)
		})
		.await
	}

	#[instrument(skip(self, ctx), fields(cluster_id = %cluster_id))]
	pub async fn list_namespace_roles(
		&self,
		ctx: &OperationContext,
		cluster_id: ClusterId,
		namespace: &str,
	) -> Result<Vec<RoleRecord>> {
		const OP: &str = "listNamespaceRoles";
		if namespace.is_empty() {
			return Err(RbacError::InvalidRoleDescriptor(
				"namespace is required to list namespaced roles".to_string(),
			));
		}

		ctx.run(OP, async {
			let lease = self.cache.acquire(cluster_id).await?;
			let result = lease.client().list_roles(namespace).await;
			let roles = self.finish(&lease, OP, result).await?;

			let now = Utc::now();
			let records: Vec<_> = roles
				.iter()
				.map(|role| RoleRecord::from_role(role, namespace, now))
				.collect();
			debug!(count = records.len(), "listed namespace roles");
			Ok(records)
		})
		.await
	}

	/// List namespaces with their phase and pod count.
	///
	/// Pod counts are best effort: a namespace whose pods cannot be listed is
	/// reported with no count rather than failing the whole listing.
	#[instrument(skip(self, ctx), fields(cluster_id = %cluster_id))]
	pub async fn list_namespaces(
		&self,
		ctx: &OperationContext,
		cluster_id: ClusterId,
	) -> Result<Vec<NamespaceInfo>> {
		const OP: &str = "listNamespaces";
		ctx.run(OP, async {
			let lease = self.cache.acquire(cluster_id).await?;
			let result = lease.client().list_namespaces().await;
			let namespaces = self.finish(&lease, OP, result).await?;

			let now = Utc::now();
			let listed: Vec<NamespaceInfo> = namespaces
				.iter()
				.map(|namespace| NamespaceInfo::from_namespace(namespace, now))
				.collect();
			// Each count owns its lease and info so the stream holds no borrows.
			let infos: Vec<NamespaceInfo> = stream::iter(listed)
				.map(|mut info| {
					let lease = lease.clone();
					async move {
						match lease.client().count_pods(&info.name).await {
							Ok(count) => info.pod_count = Some(count),
							Err(e) => {
								debug!(namespace = %info.name, error = %e, "Could not count pods");
							}
						}
						info
					}
				})
				.buffered(POD_COUNT_CONCURRENCY)
				.collect()
				.await;

			debug!(count = infos.len(), "listed namespaces");
			Ok(infos)
		})
		.await
	}

	/// Fetch one role. `None` (or an empty namespace) selects a ClusterRole.
	#[instrument(skip(self, ctx), fields(cluster_id = %cluster_id))]
	pub async fn get_role(
		&self,
		ctx: &OperationContext,
		cluster_id: ClusterId,
		namespace: Option<&str>,
		name: &str,
	) -> Result<RoleRecord> {
		const OP: &str = "getRole";
		validate_name(name)?;
		let namespace = namespace.filter(|ns| !ns.is_empty());

		ctx.run(OP, async {
			let lease = self.cache.acquire(cluster_id).await?;
			let now = Utc::now();
			match namespace {
				None => {
					let result = lease.client().get_cluster_role(name).await;
					let role = self.finish(&lease, OP, result).await?;
					Ok(RoleRecord::from_cluster_role(&role, now))
				}
				Some(ns) => {
					let result = lease.client().get_role(ns, name).await;
					let role = self.finish(&lease, OP, result).await?;
					Ok(RoleRecord::from_role(&role, ns, now))
				}
			}
		})
		.await
	}

	/// Delete a role from the cluster. Local bindings that reference it are
	/// kept.
	#[instrument(skip(self, ctx), fields(cluster_id = %cluster_id))]
	pub async fn delete_role(
		&self,
		ctx: &OperationContext,
		cluster_id: ClusterId,
		namespace: Option<&str>,
		name: &str,
	) -> Result<()> {
		const OP: &str = "deleteRole";
		validate_name(name)?;
		let namespace = namespace.filter(|ns| !ns.is_empty());

		ctx.run(OP, async {
			let lease = self.cache.acquire(cluster_id).await?;
			let result = match namespace {
				None => lease.client().delete_cluster_role(name).await,
				Some(ns) => lease.client().delete_role(ns, name).await,
			};
			self.finish(&lease, OP, result).await?;
			info!(role = %role_label(name, namespace.unwrap_or_default()), "Deleted role");
			Ok(())
		})
		.await
	}

	/// Record that a user should hold a role. The role is not looked up in
	/// the cluster; intent may be recorded before the role exists.
	///
	/// # Errors
	/// `InvalidRoleDescriptor` if the namespace does not match the role
	/// type, `AlreadyBound` if the tuple is already recorded.
	#[instrument(
		skip(self, ctx, binding),
		fields(
			cluster_id = %binding.cluster_id,
			user_id = %binding.user_id,
			role_type = %binding.role_type
		)
	)]
	pub async fn bind_user_role(
		&self,
		ctx: &OperationContext,
		binding: NewRoleBinding,
	) -> Result<RoleBinding> {
		const OP: &str = "bindUserRole";
		validate_descriptor(&binding.role_name, &binding.role_namespace, binding.role_type)?;

		ctx.run(OP, async {
			match self.bindings.create_binding(&binding).await {
				Ok(created) => {
					info!(binding_id = created.id, "Bound user to role");
					Ok(created)
				}
				Err(DbError::Conflict(_)) => {
					debug!("Role already bound");
					Err(RbacError::AlreadyBound {
						cluster_id: binding.cluster_id,
						user_id: binding.user_id.0,
						role: role_label(&binding.role_name, &binding.role_namespace),
					})
				}
				Err(e) => {
					warn!(error = %e, "Failed to record role binding");
					Err(RbacError::storage(OP, e))
				}
			}
		})
		.await
	}

	/// Remove a binding record. No cluster-side grant is touched.
	#[instrument(skip(self, ctx), fields(cluster_id = %cluster_id, user_id = %user_id))]
	pub async fn unbind_user_role(
		&self,
		ctx: &OperationContext,
		cluster_id: ClusterId,
		user_id: UserId,
		role_name: &str,
		role_namespace: &str,
	) -> Result<()> {
		const OP: &str = "unbindUserRole";
		ctx.run(OP, async {
			let deleted = self
				.bindings
				.delete_binding(cluster_id, user_id, role_name, role_namespace)
				.await
				.map_err(|e| RbacError::storage(OP, e))?;

			if !deleted {
				debug!(role_name, role_namespace, "Role was not bound");
				return Err(RbacError::NotBound {
					cluster_id,
					user_id: user_id.0,
					role: role_label(role_name, role_namespace),
				});
			}
			info!(role_name, role_namespace, "Unbound user from role");
			Ok(())
		})
		.await
	}

	#[instrument(skip(self, ctx), fields(cluster_id = %cluster_id))]
	pub async fn list_role_bound_users(
		&self,
		ctx: &OperationContext,
		cluster_id: ClusterId,
		role_name: &str,
		role_namespace: &str,
	) -> Result<Vec<BoundUser>> {
		const OP: &str = "listRoleBoundUsers";
		ctx.run(OP, async {
			self
				.bindings
				.list_bound_users(cluster_id, role_name, role_namespace)
				.await
				.map_err(|e| RbacError::storage(OP, e))
		})
		.await
	}

	#[instrument(skip(self, ctx), fields(cluster_id = %cluster_id, user_id = %user_id))]
	pub async fn list_user_roles_in_cluster(
		&self,
		ctx: &OperationContext,
		cluster_id: ClusterId,
		user_id: UserId,
	) -> Result<Vec<RoleBinding>> {
		const OP: &str = "listUserRolesInCluster";
		ctx.run(OP, async {
			self
				.bindings
				.list_bindings_for_user(cluster_id, user_id)
				.await
				.map_err(|e| RbacError::storage(OP, e))
		})
		.await
	}

	#[instrument(skip(self, ctx), fields(cluster_id = %cluster_id))]
	pub async fn list_cluster_bindings(
		&self,
		ctx: &OperationContext,
		cluster_id: ClusterId,
	) -> Result<Vec<RoleBinding>> {
		const OP: &str = "listClusterBindings";
		ctx.run(OP, async {
			self
				.bindings
				.list_bindings_for_cluster(cluster_id)
				.await
				.map_err(|e| RbacError::storage(OP, e))
		})
		.await
	}

	/// Page through platform users that can be bound. Pages start at 1; a
	/// zero page size selects the default.
	#[instrument(skip(self, ctx, keyword))]
	pub async fn list_available_users(
		&self,
		ctx: &OperationContext,
		keyword: Option<&str>,
		page: u32,
		page_size: u32,
	) -> Result<AvailableUsers> {
		const OP: &str = "listAvailableUsers";
		let page = page.max(1);
		let page_size = match page_size {
			0 => DEFAULT_PAGE_SIZE,
			n => n.min(MAX_PAGE_SIZE),
		};
		let offset = i64::from(page - 1) * i64::from(page_size);

		ctx.run(OP, async {
			let (users, total) = self
				.users
				.search_users(keyword, i64::from(page_size), offset)
				.await
				.map_err(|e| RbacError::storage(OP, e))?;
			Ok(AvailableUsers {
				users,
				total,
				page,
				page_size,
			})
		})
		.await
	}

	/// Platform users that have a service account in the cluster.
	///
	/// Service accounts in the credential namespace that follow the naming
	/// convention and resolve to a live platform user are reported; all
	/// others are skipped. The creation time comes from the platform's
	/// credential record when one exists for that exact account, otherwise
	/// from the service account itself.
	#[instrument(
		skip(self, ctx),
		fields(cluster_id = %cluster_id, caller_user_id = %caller_user_id)
	)]
	pub async fn list_cluster_credential_users(
		&self,
		ctx: &OperationContext,
		cluster_id: ClusterId,
		caller_user_id: UserId,
	) -> Result<Vec<CredentialUser>> {
		const OP: &str = "listClusterCredentialUsers";
		ctx.run(OP, async {
			let lease = self.cache.acquire(cluster_id).await?;
			let result = lease
				.client()
				.list_service_accounts(&self.credential_namespace)
				.await;
			let accounts = self.finish(&lease, OP, result).await?;

			let candidates: Vec<_> = accounts
				.iter()
				.filter_map(|account| {
					let name = account.metadata.name.as_deref()?;
					let username = self.identity.from_service_account_name(name)?;
					Some((account, name, username))
				})
				.collect();
			if candidates.is_empty() {
				return Ok(Vec::new());
			}

			let mut usernames: Vec<String> =
				candidates.iter().map(|(_, _, u)| u.to_string()).collect();
			usernames.sort();
			usernames.dedup();

			let users = self
				.users
				.find_users_by_usernames(&usernames)
				.await
				.map_err(|e| RbacError::storage(OP, e))?;
			let users: HashMap<&str, _> = users.iter().map(|u| (u.username.as_str(), u)).collect();

			let records = self
				.credentials
				.list_credentials_for_cluster(cluster_id)
				.await
				.map_err(|e| RbacError::storage(OP, e))?;
			let records: HashMap<UserId, _> = records.iter().map(|r| (r.user_id, r)).collect();

			let mut merged = Vec::with_capacity(candidates.len());
			for (account, name, username) in candidates {
				let Some(user) = users.get(username) else {
					debug!(service_account = name, "Skipping service account with no platform user");
					continue;
				};

				let record = records
					.get(&user.id)
					.filter(|r| r.service_account_name == name);
				let (created_at, source) = match record {
					Some(record) => (Some(record.created_at), CredentialSource::Platform),
					None => (
						account.metadata.creation_timestamp.as_ref().map(|t| t.0),
						CredentialSource::Cluster,
					),
				};

				merged.push(CredentialUser {
					user_id: user.id,
					username: user.username.clone(),
					real_name: user.real_name.clone(),
					service_account: name.to_string(),
					namespace: account
						.metadata
						.namespace
						.clone()
						.unwrap_or_else(|| self.credential_namespace.clone()),
					created_at,
					source,
				});
			}

			debug!(
				service_accounts = accounts.len(),
				count = merged.len(),
				"listed credential users"
			);
			Ok(merged)
		})
		.await
	}

	/// Tell the engine a cluster's stored connection parameters changed.
	/// Returns whether a cached client was dropped.
	pub async fn cluster_credentials_changed(&self, cluster_id: ClusterId) -> bool {
		self.cache.invalidate(cluster_id).await
	}
}

fn role_label(name: &str, namespace: &str) -> String {
	if namespace.is_empty() {
		name.to_string()
	} else {
		format!("{namespace}/{name}")
	}
}

fn validate_name(name: &str) -> Result<()> {
	if name.is_empty() {
		return Err(RbacError::InvalidRoleDescriptor(
			"role name must not be empty".to_string(),
		));
	}
	if name.len() > MAX_NAME_LEN {
		return Err(RbacError::InvalidRoleDescriptor(format!(
			"role name exceeds {MAX_NAME_LEN} bytes"
		)));
	}
	Ok(())
}

/// A ClusterRole has no namespace; a Role must have one.
fn validate_descriptor(name: &str, namespace: &str, role_type: RoleType) -> Result<()> {
	validate_name(name)?;
	if namespace.len() > MAX_NAME_LEN {
		return Err(RbacError::InvalidRoleDescriptor(format!(
			"role namespace exceeds {MAX_NAME_LEN} bytes"
		)));
	}
	match (role_type, namespace.is_empty()) {
		(RoleType::ClusterRole, false) => Err(RbacError::InvalidRoleDescriptor(format!(
			"ClusterRole {name} must not have a namespace (got {namespace})"
		))),
		(RoleType::Role, true) => Err(RbacError::InvalidRoleDescriptor(format!(
			"Role {name} requires a namespace"
		))),
		_ => Ok(()),
	}
}

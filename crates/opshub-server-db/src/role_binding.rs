// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Role-binding repository.
//!
//! A binding row records that a platform user should hold a Kubernetes role
//! in a managed cluster. Rows are never updated in place: rebinding is a
//! delete followed by a create.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_on_unique, DbError};
use crate::types::{
	format_timestamp, parse_timestamp, BoundUser, ClusterId, NewRoleBinding, RoleBinding, UserId,
};

#[async_trait]
pub trait RoleBindingStore: Send + Sync {
	async fn create_binding(&self, binding: &NewRoleBinding) -> Result<RoleBinding, DbError>;
	async fn delete_binding(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
		role_name: &str,
		role_namespace: &str,
	) -> Result<bool, DbError>;
	async fn list_bindings_for_cluster(&self, cluster_id: ClusterId)
		-> Result<Vec<RoleBinding>, DbError>;
	async fn list_bindings_for_user(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
	) -> Result<Vec<RoleBinding>, DbError>;
	async fn list_bound_users(
		&self,
		cluster_id: ClusterId,
		role_name: &str,
		role_namespace: &str,
	) -> Result<Vec<BoundUser>, DbError>;
}

#[async_trait]
impl RoleBindingStore for RoleBindingRepository {
	async fn create_binding(&self, binding: &NewRoleBinding) -> Result<RoleBinding, DbError> {
		self.create_binding(binding).await
	}

	async fn delete_binding(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
		role_name: &str,
		role_namespace: &str,
	) -> Result<bool, DbError> {
		self
			.delete_binding(cluster_id, user_id, role_name, role_namespace)
			.await
	}

	async fn list_bindings_for_cluster(
		&self,
		cluster_id: ClusterId,
	) -> Result<Vec<RoleBinding>, DbError> {
		self.list_bindings_for_cluster(cluster_id).await
	}

	async fn list_bindings_for_user(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
	) -> Result<Vec<RoleBinding>, DbError> {
		self.list_bindings_for_user(cluster_id, user_id).await
	}

	async fn list_bound_users(
		&self,
		cluster_id: ClusterId,
		role_name: &str,
		role_namespace: &str,
	) -> Result<Vec<BoundUser>, DbError> {
		self
			.list_bound_users(cluster_id, role_name, role_namespace)
			.await
	}
}

/// Repository for role-binding database operations.
#[derive(Clone)]
pub struct RoleBindingRepository {
	pool: SqlitePool,
}

impl RoleBindingRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Record a new binding.
	///
	/// # Errors
	/// `DbError::Conflict` if the (cluster, user, role name, role namespace)
	/// tuple is already bound. The lookup beforehand only produces a friendlier
	/// message; the table's unique constraint rejects a racing duplicate insert
	/// with the same error.
	#[tracing::instrument(
		skip(self, binding),
		fields(
			cluster_id = %binding.cluster_id,
			user_id = %binding.user_id,
			role_name = %binding.role_name,
			role_namespace = %binding.role_namespace
		)
	)]
	pub async fn create_binding(&self, binding: &NewRoleBinding) -> Result<RoleBinding, DbError> {
		let existing = sqlx::query(
			r#"
			SELECT id
			FROM k8s_user_role_bindings
			WHERE cluster_id = ? AND user_id = ? AND role_name = ? AND role_namespace = ?
			"#,
		)
		.bind(binding.cluster_id.0)
		.bind(binding.user_id.0)
		.bind(&binding.role_name)
		.bind(&binding.role_namespace)
		.fetch_optional(&self.pool)
		.await?;

		if existing.is_some() {
			return Err(already_bound(binding));
		}

		self.insert_binding(binding).await
	}

	/// Single-statement insert; a cancelled caller leaves either no row or a
	/// committed one.
	async fn insert_binding(&self, binding: &NewRoleBinding) -> Result<RoleBinding, DbError> {
		let now = Utc::now();
		let now_str = format_timestamp(now);

		let result = sqlx::query(
			r#"
			INSERT INTO k8s_user_role_bindings (
				cluster_id, user_id, role_name, role_namespace, role_type, bound_by, created_at, updated_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(binding.cluster_id.0)
		.bind(binding.user_id.0)
		.bind(&binding.role_name)
		.bind(&binding.role_namespace)
		.bind(binding.role_type.as_str())
		.bind(binding.bound_by.0)
		.bind(&now_str)
		.bind(&now_str)
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, || already_bound(binding).to_string()))?;

		let id = result.last_insert_rowid();
		tracing::info!(binding_id = id, role_type = %binding.role_type, "role binding created");

		Ok(RoleBinding {
			id,
			cluster_id: binding.cluster_id,
			user_id: binding.user_id,
			role_name: binding.role_name.clone(),
			role_namespace: binding.role_namespace.clone(),
			role_type: binding.role_type,
			bound_by: binding.bound_by,
			created_at: parse_timestamp(&now_str, "created_at")?,
			updated_at: parse_timestamp(&now_str, "updated_at")?,
		})
	}

	/// Delete a binding.
	///
	/// # Returns
	/// `true` if a row was deleted, `false` if the tuple was not bound.
	#[tracing::instrument(skip(self), fields(cluster_id = %cluster_id, user_id = %user_id))]
	pub async fn delete_binding(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
		role_name: &str,
		role_namespace: &str,
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			DELETE FROM k8s_user_role_bindings
			WHERE cluster_id = ? AND user_id = ? AND role_name = ? AND role_namespace = ?
			"#,
		)
		.bind(cluster_id.0)
		.bind(user_id.0)
		.bind(role_name)
		.bind(role_namespace)
		.execute(&self.pool)
		.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::info!(role_name, role_namespace, "role binding deleted");
		}
		Ok(deleted)
	}

	/// List all bindings in a cluster, most recent first.
	#[tracing::instrument(skip(self), fields(cluster_id = %cluster_id))]
	pub async fn list_bindings_for_cluster(
		&self,
		cluster_id: ClusterId,
	) -> Result<Vec<RoleBinding>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, cluster_id, user_id, role_name, role_namespace, role_type, bound_by,
			       created_at, updated_at
			FROM k8s_user_role_bindings
			WHERE cluster_id = ?
			ORDER BY created_at DESC, id DESC
			"#,
		)
		.bind(cluster_id.0)
		.fetch_all(&self.pool)
		.await?;

		let bindings = rows
			.iter()
			.map(parse_binding_row)
			.collect::<Result<Vec<_>, _>>()?;
		tracing::debug!(count = bindings.len(), "listed cluster role bindings");
		Ok(bindings)
	}

	/// List a user's bindings in one cluster, most recent first.
	#[tracing::instrument(skip(self), fields(cluster_id = %cluster_id, user_id = %user_id))]
	pub async fn list_bindings_for_user(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
	) -> Result<Vec<RoleBinding>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, cluster_id, user_id, role_name, role_namespace, role_type, bound_by,
			       created_at, updated_at
			FROM k8s_user_role_bindings
			WHERE cluster_id = ? AND user_id = ?
			ORDER BY created_at DESC, id DESC
			"#,
		)
		.bind(cluster_id.0)
		.bind(user_id.0)
		.fetch_all(&self.pool)
		.await?;

		let bindings = rows
			.iter()
			.map(parse_binding_row)
			.collect::<Result<Vec<_>, _>>()?;
		tracing::debug!(count = bindings.len(), "listed user role bindings");
		Ok(bindings)
	}

	/// List the users bound to one role, joined with their profiles.
	///
	/// Bindings whose user row is gone are still returned, without a profile.
	#[tracing::instrument(skip(self), fields(cluster_id = %cluster_id))]
	pub async fn list_bound_users(
		&self,
		cluster_id: ClusterId,
		role_name: &str,
		role_namespace: &str,
	) -> Result<Vec<BoundUser>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT b.user_id AS user_id, u.username AS username, u.real_name AS real_name,
			       b.created_at AS bound_at
			FROM k8s_user_role_bindings AS b
			LEFT JOIN users AS u ON u.id = b.user_id
			WHERE b.cluster_id = ? AND b.role_name = ? AND b.role_namespace = ?
			ORDER BY b.created_at DESC, b.id DESC
			"#,
		)
		.bind(cluster_id.0)
		.bind(role_name)
		.bind(role_namespace)
		.fetch_all(&self.pool)
		.await?;

		let mut users = Vec::with_capacity(rows.len());
		for row in rows {
			let bound_at: String = row.get("bound_at");
			users.push(BoundUser {
				user_id: UserId(row.get("user_id")),
				username: row.get("username"),
				real_name: row.get("real_name"),
				bound_at: parse_timestamp(&bound_at, "bound_at")?,
			});
		}
		tracing::debug!(role_name, role_namespace, count = users.len(), "listed bound users");
		Ok(users)
	}
}

fn already_bound(binding: &NewRoleBinding) -> DbError {
	DbError::Conflict(format!(
		"user {} is already bound to {} {}/{} in cluster {}",
		binding.user_id,
		binding.role_type,
		binding.role_namespace,
		binding.role_name,
		binding.cluster_id
	))
}

fn parse_binding_row(row: &sqlx::sqlite::SqliteRow) -> Result<RoleBinding, DbError> {
	let role_type: String = row.get("role_type");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(RoleBinding {
		id: row.get("id"),
		cluster_id: ClusterId(row.get("cluster_id")),
		user_id: UserId(row.get("user_id")),
		role_name: row.get("role_name"),
		role_namespace: row.get("role_namespace"),
		role_type: role_type.parse()?,
		bound_by: UserId(row.get("bound_by")),
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use crate::types::RoleType;
	use crate::user::UserRepository;

	async fn make_repo() -> (RoleBindingRepository, SqlitePool) {
		let pool = create_test_pool().await.unwrap();
		(RoleBindingRepository::new(pool.clone()), pool)
	}

	fn cluster_role(cluster: i64, user: i64, name: &str) -> NewRoleBinding {
		NewRoleBinding {
			cluster_id: ClusterId(cluster),
			user_id: UserId(user),
			role_name: name.to_string(),
			role_namespace: String::new(),
			role_type: RoleType::ClusterRole,
			bound_by: UserId(1),
		}
	}

	fn namespaced_role(cluster: i64, user: i64, namespace: &str, name: &str) -> NewRoleBinding {
		NewRoleBinding {
			cluster_id: ClusterId(cluster),
			user_id: UserId(user),
			role_name: name.to_string(),
			role_namespace: namespace.to_string(),
			role_type: RoleType::Role,
			bound_by: UserId(1),
		}
	}

	#[tokio::test]
	async fn test_create_and_list_binding() {
		let (repo, _) = make_repo().await;
		let created = repo.create_binding(&cluster_role(1, 7, "view")).await.unwrap();
		assert_eq!(created.role_name, "view");
		assert_eq!(created.role_type, RoleType::ClusterRole);
		assert_eq!(created.created_at, created.updated_at);

		let listed = repo
			.list_bindings_for_user(ClusterId(1), UserId(7))
			.await
			.unwrap();
		assert_eq!(listed, vec![created]);
	}

	#[tokio::test]
	async fn test_duplicate_binding_conflicts() {
		let (repo, _) = make_repo().await;
		repo.create_binding(&cluster_role(1, 7, "view")).await.unwrap();
		let err = repo
			.create_binding(&cluster_role(1, 7, "view"))
			.await
			.unwrap_err();
		assert!(err.is_conflict());
	}

	#[tokio::test]
	async fn test_unique_constraint_rejects_insert_without_precheck() {
		let (repo, pool) = make_repo().await;
		let binding = namespaced_role(1, 7, "dev", "editor");
		repo.insert_binding(&binding).await.unwrap();
		let err = repo.insert_binding(&binding).await.unwrap_err();
		assert!(err.is_conflict(), "got {err:?}");

		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM k8s_user_role_bindings")
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(count, 1);
	}

	#[tokio::test]
	async fn test_concurrent_duplicate_binds_yield_one_row() {
		let (repo, pool) = make_repo().await;
		let binding = namespaced_role(1, 7, "dev", "editor");
		let (a, b) = tokio::join!(repo.create_binding(&binding), repo.create_binding(&binding));

		let outcomes = [a, b];
		assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
		assert!(outcomes
			.iter()
			.filter_map(|r| r.as_ref().err())
			.all(DbError::is_conflict));

		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM k8s_user_role_bindings")
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(count, 1);
	}

	#[tokio::test]
	async fn test_same_role_name_in_other_namespace_is_distinct() {
		let (repo, _) = make_repo().await;
		repo
			.create_binding(&namespaced_role(1, 7, "dev", "editor"))
			.await
			.unwrap();
		repo
			.create_binding(&namespaced_role(1, 7, "prod", "editor"))
			.await
			.unwrap();
		repo
			.create_binding(&namespaced_role(2, 7, "dev", "editor"))
			.await
			.unwrap();

		assert_eq!(
			repo
				.list_bindings_for_cluster(ClusterId(1))
				.await
				.unwrap()
				.len(),
			2
		);
	}

	#[tokio::test]
	async fn test_delete_binding_reports_missing() {
		let (repo, _) = make_repo().await;
		repo.create_binding(&cluster_role(1, 7, "view")).await.unwrap();

		assert!(repo
			.delete_binding(ClusterId(1), UserId(7), "view", "")
			.await
			.unwrap());
		assert!(!repo
			.delete_binding(ClusterId(1), UserId(7), "view", "")
			.await
			.unwrap());
		assert!(!repo
			.delete_binding(ClusterId(1), UserId(8), "never", "")
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn test_lists_are_most_recent_first() {
		let (repo, _) = make_repo().await;
		let first = repo.create_binding(&cluster_role(1, 7, "a")).await.unwrap();
		let second = repo.create_binding(&cluster_role(1, 7, "b")).await.unwrap();
		let third = repo
			.create_binding(&namespaced_role(1, 7, "dev", "c"))
			.await
			.unwrap();

		let ids: Vec<_> = repo
			.list_bindings_for_user(ClusterId(1), UserId(7))
			.await
			.unwrap()
			.into_iter()
			.map(|b| b.id)
			.collect();
		assert_eq!(ids, vec![third.id, second.id, first.id]);
	}

	#[tokio::test]
	async fn test_bound_users_joins_profiles() {
		let (repo, pool) = make_repo().await;
		let users = UserRepository::new(pool);
		let alice = users.create_user("alice", "Alice A", None).await.unwrap();

		repo
			.create_binding(&namespaced_role(1, alice.id.0, "dev", "editor"))
			.await
			.unwrap();
		repo
			.create_binding(&namespaced_role(1, 999, "dev", "editor"))
			.await
			.unwrap();
		repo
			.create_binding(&namespaced_role(1, alice.id.0, "dev", "viewer"))
			.await
			.unwrap();

		let bound = repo
			.list_bound_users(ClusterId(1), "editor", "dev")
			.await
			.unwrap();
		assert_eq!(bound.len(), 2);

		let orphan = bound.iter().find(|u| u.user_id == UserId(999)).unwrap();
		assert!(orphan.username.is_none());
		let known = bound.iter().find(|u| u.user_id == alice.id).unwrap();
		assert_eq!(known.username.as_deref(), Some("alice"));
		assert_eq!(known.real_name.as_deref(), Some("Alice A"));
	}
}

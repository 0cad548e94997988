// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Service-account credential records.
//!
//! A credential row is the platform's memory of a service account it created
//! for a user in a cluster. At most one exists per (cluster, user).

use async_trait::async_trait;
use chrono::Utc;
use opshub_common_secret::SecretString;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_on_unique, DbError};
use crate::types::{format_timestamp, parse_timestamp, ClusterId, CredentialRecord, UserId};

#[async_trait]
pub trait CredentialStore: Send + Sync {
	async fn create_credential(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
		service_account_name: &str,
		token: &SecretString,
	) -> Result<CredentialRecord, DbError>;
	async fn get_credential(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
	) -> Result<Option<CredentialRecord>, DbError>;
	async fn list_credentials_for_cluster(
		&self,
		cluster_id: ClusterId,
	) -> Result<Vec<CredentialRecord>, DbError>;
	async fn delete_credential(&self, cluster_id: ClusterId, user_id: UserId)
		-> Result<bool, DbError>;
}

#[async_trait]
impl CredentialStore for CredentialRepository {
	async fn create_credential(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
		service_account_name: &str,
		token: &SecretString,
	) -> Result<CredentialRecord, DbError> {
		self
			.create_credential(cluster_id, user_id, service_account_name, token)
			.await
	}

	async fn get_credential(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
	) -> Result<Option<CredentialRecord>, DbError> {
		self.get_credential(cluster_id, user_id).await
	}

	async fn list_credentials_for_cluster(
		&self,
		cluster_id: ClusterId,
	) -> Result<Vec<CredentialRecord>, DbError> {
		self.list_credentials_for_cluster(cluster_id).await
	}

	async fn delete_credential(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
	) -> Result<bool, DbError> {
		self.delete_credential(cluster_id, user_id).await
	}
}

#[derive(Clone)]
pub struct CredentialRepository {
	pool: SqlitePool,
}

impl CredentialRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Record a credential.
	///
	/// # Errors
	/// `DbError::Conflict` if the user already has a credential in the cluster.
	#[tracing::instrument(skip(self, token), fields(cluster_id = %cluster_id, user_id = %user_id))]
	pub async fn create_credential(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
		service_account_name: &str,
		token: &SecretString,
	) -> Result<CredentialRecord, DbError> {
		let now = format_timestamp(Utc::now());
		let result = sqlx::query(
			r#"
			INSERT INTO k8s_user_credentials (cluster_id, user_id, service_account, token, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(cluster_id.0)
		.bind(user_id.0)
		.bind(service_account_name)
		.bind(token.expose())
		.bind(&now)
		.execute(&self.pool)
		.await
		.map_err(|e| {
			conflict_on_unique(e, || {
				format!("user {user_id} already has a credential in cluster {cluster_id}")
			})
		})?;

		tracing::info!(service_account = service_account_name, "credential recorded");
		Ok(CredentialRecord {
			id: result.last_insert_rowid(),
			cluster_id,
			user_id,
			service_account_name: service_account_name.to_string(),
			token: token.clone(),
			created_at: parse_timestamp(&now, "created_at")?,
		})
	}

	#[tracing::instrument(skip(self), fields(cluster_id = %cluster_id, user_id = %user_id))]
	pub async fn get_credential(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
	) -> Result<Option<CredentialRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, cluster_id, user_id, service_account, token, created_at
			FROM k8s_user_credentials
			WHERE cluster_id = ? AND user_id = ?
			"#,
		)
		.bind(cluster_id.0)
		.bind(user_id.0)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_credential_row).transpose()
	}

	/// List every credential recorded for a cluster, most recent first.
	#[tracing::instrument(skip(self), fields(cluster_id = %cluster_id))]
	pub async fn list_credentials_for_cluster(
		&self,
		cluster_id: ClusterId,
	) -> Result<Vec<CredentialRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, cluster_id, user_id, service_account, token, created_at
			FROM k8s_user_credentials
			WHERE cluster_id = ?
			ORDER BY created_at DESC, id DESC
			"#,
		)
		.bind(cluster_id.0)
		.fetch_all(&self.pool)
		.await?;

		let records = rows
			.iter()
			.map(parse_credential_row)
			.collect::<Result<Vec<_>, _>>()?;
		tracing::debug!(count = records.len(), "listed credentials");
		Ok(records)
	}

	#[tracing::instrument(skip(self), fields(cluster_id = %cluster_id, user_id = %user_id))]
	pub async fn delete_credential(
		&self,
		cluster_id: ClusterId,
		user_id: UserId,
	) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM k8s_user_credentials WHERE cluster_id = ? AND user_id = ?")
			.bind(cluster_id.0)
			.bind(user_id.0)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}
}

fn parse_credential_row(row: &sqlx::sqlite::SqliteRow) -> Result<CredentialRecord, DbError> {
	let token: String = row.get("token");
	let created_at: String = row.get("created_at");

	Ok(CredentialRecord {
		id: row.get("id"),
		cluster_id: ClusterId(row.get("cluster_id")),
		user_id: UserId(row.get("user_id")),
		service_account_name: row.get("service_account"),
		token: SecretString::new(token),
		created_at: parse_timestamp(&created_at, "created_at")?,
	})
}

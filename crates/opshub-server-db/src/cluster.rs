// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Managed cluster connection parameters.

use async_trait::async_trait;
use chrono::Utc;
use opshub_common_secret::SecretString;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::types::{format_timestamp, parse_timestamp, ClusterId, ClusterRecord};

#[async_trait]
pub trait ClusterStore: Send + Sync {
	async fn get_cluster(&self, id: ClusterId) -> Result<Option<ClusterRecord>, DbError>;
}

#[async_trait]
impl ClusterStore for ClusterRepository {
	async fn get_cluster(&self, id: ClusterId) -> Result<Option<ClusterRecord>, DbError> {
		self.get_cluster(id).await
	}
}

#[derive(Clone)]
pub struct ClusterRepository {
	pool: SqlitePool,
}

impl ClusterRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Register a cluster, or replace the connection parameters of the
	/// cluster with the same name.
	///
	/// Callers holding cached clients for the cluster must invalidate them
	/// when this replaces an existing kubeconfig.
	#[tracing::instrument(skip(self, kubeconfig))]
	pub async fn register_cluster(
		&self,
		name: &str,
		endpoint: Option<&str>,
		kubeconfig: &SecretString,
	) -> Result<ClusterRecord, DbError> {
		let now = format_timestamp(Utc::now());
		let row = sqlx::query(
			r#"
			INSERT INTO k8s_clusters (name, endpoint, kubeconfig, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			ON CONFLICT(name) DO UPDATE SET
				endpoint = excluded.endpoint,
				kubeconfig = excluded.kubeconfig,
				updated_at = excluded.updated_at
			RETURNING id, name, endpoint, kubeconfig, created_at, updated_at
			"#,
		)
		.bind(name)
		.bind(endpoint)
		.bind(kubeconfig.expose())
		.bind(&now)
		.bind(&now)
		.fetch_one(&self.pool)
		.await?;

		let cluster = parse_cluster_row(&row)?;
		tracing::info!(cluster_id = %cluster.id, "cluster registered");
		Ok(cluster)
	}

	#[tracing::instrument(skip(self), fields(cluster_id = %id))]
	pub async fn get_cluster(&self, id: ClusterId) -> Result<Option<ClusterRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, endpoint, kubeconfig, created_at, updated_at
			FROM k8s_clusters
			WHERE id = ?
			"#,
		)
		.bind(id.0)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_cluster_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_clusters(&self) -> Result<Vec<ClusterRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, endpoint, kubeconfig, created_at, updated_at
			FROM k8s_clusters
			ORDER BY name
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_cluster_row).collect()
	}
}

fn parse_cluster_row(row: &sqlx::sqlite::SqliteRow) -> Result<ClusterRecord, DbError> {
	let kubeconfig: String = row.get("kubeconfig");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(ClusterRecord {
		id: ClusterId(row.get("id")),
		name: row.get("name"),
		endpoint: row.get("endpoint"),
		kubeconfig: SecretString::new(kubeconfig),
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schema migrations.

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const MIGRATIONS: &[(&str, &str)] = &[
	(
		"001_create_users",
		include_str!("../migrations/001_create_users.sql"),
	),
	(
		"002_create_k8s_clusters",
		include_str!("../migrations/002_create_k8s_clusters.sql"),
	),
	(
		"003_create_k8s_user_role_bindings",
		include_str!("../migrations/003_create_k8s_user_role_bindings.sql"),
	),
	(
		"004_create_k8s_user_credentials",
		include_str!("../migrations/004_create_k8s_user_credentials.sql"),
	),
];

/// Run all database migrations (001-004).
///
/// # Errors
/// Returns `DbError::Sqlx` if a statement fails.
///
/// # Note
/// Migrations are idempotent - safe to run multiple times.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	for (name, sql) in MIGRATIONS {
		for stmt in sql.split(';').filter(|s| !s.trim().is_empty()) {
			sqlx::query(stmt).execute(pool).await?;
		}
		tracing::debug!(migration = name, "migration applied");
	}
	Ok(())
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Platform user lookups.
//!
//! The RBAC core only reads users; account lifecycle lives elsewhere. The
//! inherent `create_user` and `soft_delete_user` exist for seeding and tests.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, QueryBuilder, Row, Sqlite};

use crate::error::{conflict_on_unique, DbError};
use crate::types::{format_timestamp, PlatformUser, UserId};

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn get_user(&self, id: UserId) -> Result<Option<PlatformUser>, DbError>;
	async fn find_users_by_usernames(
		&self,
		usernames: &[String],
	) -> Result<Vec<PlatformUser>, DbError>;
	async fn search_users(
		&self,
		keyword: Option<&str>,
		limit: i64,
		offset: i64,
	) -> Result<(Vec<PlatformUser>, i64), DbError>;
}

#[async_trait]
impl UserStore for UserRepository {
	async fn get_user(&self, id: UserId) -> Result<Option<PlatformUser>, DbError> {
		self.get_user(id).await
	}

	async fn find_users_by_usernames(
		&self,
		usernames: &[String],
	) -> Result<Vec<PlatformUser>, DbError> {
		self.find_users_by_usernames(usernames).await
	}

	async fn search_users(
		&self,
		keyword: Option<&str>,
		limit: i64,
		offset: i64,
	) -> Result<(Vec<PlatformUser>, i64), DbError> {
		self.search_users(keyword, limit, offset).await
	}
}

#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a user.
	///
	/// # Errors
	/// `DbError::Conflict` if the username is taken.
	#[tracing::instrument(skip(self, real_name, email))]
	pub async fn create_user(
		&self,
		username: &str,
		real_name: &str,
		email: Option<&str>,
	) -> Result<PlatformUser, DbError> {
		let now = format_timestamp(Utc::now());
		let result = sqlx::query(
			r#"
			INSERT INTO users (username, real_name, email, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(username)
		.bind(real_name)
		.bind(email)
		.bind(&now)
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, || format!("username {username} is taken")))?;

		let id = UserId(result.last_insert_rowid());
		tracing::debug!(user_id = %id, "user created");
		Ok(PlatformUser {
			id,
			username: username.to_string(),
			real_name: real_name.to_string(),
			email: email.map(str::to_string),
		})
	}

	/// Mark a user deleted. Deleted users are hidden from every lookup.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn soft_delete_user(&self, id: UserId) -> Result<(), DbError> {
		let result = sqlx::query("UPDATE users SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
			.bind(format_timestamp(Utc::now()))
			.bind(id.0)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user {id}")));
		}
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user(&self, id: UserId) -> Result<Option<PlatformUser>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, username, real_name, email
			FROM users
			WHERE id = ? AND deleted_at IS NULL
			"#,
		)
		.bind(id.0)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.as_ref().map(parse_user_row))
	}

	/// Resolve many usernames in one query. Unknown names are skipped.
	#[tracing::instrument(skip(self, usernames), fields(count = usernames.len()))]
	pub async fn find_users_by_usernames(
		&self,
		usernames: &[String],
	) -> Result<Vec<PlatformUser>, DbError> {
		if usernames.is_empty() {
			return Ok(Vec::new());
		}

		let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
			"SELECT id, username, real_name, email FROM users WHERE deleted_at IS NULL AND username IN (",
		);
		let mut separated = builder.separated(", ");
		for username in usernames {
			separated.push_bind(username);
		}
		separated.push_unseparated(") ORDER BY id");

		let rows = builder.build().fetch_all(&self.pool).await?;
		let users: Vec<_> = rows.iter().map(parse_user_row).collect();
		tracing::debug!(found = users.len(), "resolved usernames");
		Ok(users)
	}

	/// Page through live users, optionally filtered by a keyword matched
	/// against username, real name and email.
	///
	/// # Returns
	/// Tuple of (users, total_count) for pagination.
	#[tracing::instrument(skip(self, keyword), fields(limit, offset))]
	pub async fn search_users(
		&self,
		keyword: Option<&str>,
		limit: i64,
		offset: i64,
	) -> Result<(Vec<PlatformUser>, i64), DbError> {
		let pattern = keyword
			.map(str::trim)
			.filter(|k| !k.is_empty())
			.map(|k| format!("%{k}%"));

		let (rows, total) = match &pattern {
			Some(pattern) => {
				let rows = sqlx::query(
					r#"
					SELECT id, username, real_name, email
					FROM users
					WHERE deleted_at IS NULL
					  AND (username LIKE ? OR real_name LIKE ? OR email LIKE ?)
					ORDER BY id
					LIMIT ? OFFSET ?
					"#,
				)
				.bind(pattern)
				.bind(pattern)
				.bind(pattern)
				.bind(limit)
				.bind(offset)
				.fetch_all(&self.pool)
				.await?;

				let count: (i64,) = sqlx::query_as(
					r#"
					SELECT COUNT(*) FROM users
					WHERE deleted_at IS NULL
					  AND (username LIKE ? OR real_name LIKE ? OR email LIKE ?)
					"#,
				)
				.bind(pattern)
				.bind(pattern)
				.bind(pattern)
				.fetch_one(&self.pool)
				.await?;
				(rows, count.0)
			}
			None => {
				let rows = sqlx::query(
					r#"
					SELECT id, username, real_name, email
					FROM users
					WHERE deleted_at IS NULL
					ORDER BY id
					LIMIT ? OFFSET ?
					"#,
				)
				.bind(limit)
				.bind(offset)
				.fetch_all(&self.pool)
				.await?;

				let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
					.fetch_one(&self.pool)
					.await?;
				(rows, count.0)
			}
		};

		Ok((rows.iter().map(parse_user_row).collect(), total))
	}
}

fn parse_user_row(row: &sqlx::sqlite::SqliteRow) -> PlatformUser {
	PlatformUser {
		id: UserId(row.get("id")),
		username: row.get("username"),
		real_name: row.get("real_name"),
		email: row.get("email"),
	}
}

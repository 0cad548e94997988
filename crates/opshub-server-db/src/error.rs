// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),
}

impl DbError {
	pub fn is_conflict(&self) -> bool {
		matches!(self, DbError::Conflict(_))
	}
}

/// Map a unique-constraint violation to [`DbError::Conflict`], passing every
/// other error through.
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> DbError {
	match err {
		sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => DbError::Conflict(what()),
		other => DbError::Sqlx(other),
	}
}

pub type Result<T> = std::result::Result<T, DbError>;

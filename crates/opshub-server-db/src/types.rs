// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use opshub_common_secret::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// Identifier of a managed cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub i64);

/// Identifier of a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for ClusterId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Kind of Kubernetes role a binding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleType {
	ClusterRole,
	Role,
}

impl RoleType {
	pub fn as_str(&self) -> &'static str {
		match self {
			RoleType::ClusterRole => "ClusterRole",
			RoleType::Role => "Role",
		}
	}
}

impl fmt::Display for RoleType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for RoleType {
	type Err = DbError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"ClusterRole" => Ok(RoleType::ClusterRole),
			"Role" => Ok(RoleType::Role),
			other => Err(DbError::Internal(format!("Invalid role_type: {other}"))),
		}
	}
}

/// A platform user's recorded intent to hold a role in a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBinding {
	pub id: i64,
	pub cluster_id: ClusterId,
	pub user_id: UserId,
	pub role_name: String,
	/// Empty for cluster roles.
	pub role_namespace: String,
	pub role_type: RoleType,
	pub bound_by: UserId,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Fields for a binding that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoleBinding {
	pub cluster_id: ClusterId,
	pub user_id: UserId,
	pub role_name: String,
	pub role_namespace: String,
	pub role_type: RoleType,
	pub bound_by: UserId,
}

/// A binding joined with the bound user's profile. The profile fields are
/// absent when the user row no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundUser {
	pub user_id: UserId,
	pub username: Option<String>,
	pub real_name: Option<String>,
	pub bound_at: DateTime<Utc>,
}

/// The platform's memory of a service account it created for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
	pub id: i64,
	pub cluster_id: ClusterId,
	pub user_id: UserId,
	pub service_account_name: String,
	pub token: SecretString,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformUser {
	pub id: UserId,
	pub username: String,
	pub real_name: String,
	pub email: Option<String>,
}

/// Connection parameters for a managed cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
	pub id: ClusterId,
	pub name: String,
	pub endpoint: Option<String>,
	pub kubeconfig: SecretString,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {field}: {e}")))
}

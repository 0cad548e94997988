// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Mapping between platform usernames and in-cluster service accounts.

use crate::error::RbacError;

const DELIMITER: char = '-';

/// Names platform-managed service accounts `<prefix>-<username>`.
///
/// The prefix may not contain the delimiter, so the first `-` in a service
/// account name always ends the prefix and the remainder is the username,
/// even when the username itself contains dashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMapper {
	prefix: String,
}

impl IdentityMapper {
	pub fn new(prefix: impl Into<String>) -> Result<Self, RbacError> {
		let prefix = prefix.into();
		if prefix.is_empty() {
			return Err(RbacError::InvalidConfig(
				"service account prefix must not be empty".to_string(),
			));
		}
		if prefix.contains(DELIMITER) {
			return Err(RbacError::InvalidConfig(format!(
				"service account prefix '{prefix}' must not contain '{DELIMITER}'"
			)));
		}
		Ok(Self { prefix })
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	pub fn to_service_account_name(&self, username: &str) -> String {
		format!("{}{DELIMITER}{username}", self.prefix)
	}

	/// Recover the username from a service account name, or `None` if the
	/// name does not follow the convention.
	pub fn from_service_account_name<'a>(&self, service_account: &'a str) -> Option<&'a str> {
		let (prefix, username) = service_account.split_once(DELIMITER)?;
		if prefix != self.prefix || username.is_empty() {
			return None;
		}
		Some(username)
	}
}

impl Default for IdentityMapper {
	fn default() -> Self {
		Self {
			prefix: "opshub".to_string(),
		}
	}
}

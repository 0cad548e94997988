// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database layer for OpsHub cluster RBAC records.
//!
//! Repositories for platform users, managed cluster connection parameters,
//! role-binding intent and service-account credential records. Each
//! repository is exposed behind a `*Store` trait so callers can be tested
//! against alternative implementations.

pub mod cluster;
pub mod credential;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod role_binding;
pub mod testing;
pub mod types;
pub mod user;

pub use cluster::{ClusterRepository, ClusterStore};
pub use credential::{CredentialRepository, CredentialStore};
pub use error::{DbError, Result};
pub use migrations::run_migrations;
pub use pool::create_pool;
pub use role_binding::{RoleBindingRepository, RoleBindingStore};
pub use types::{
	BoundUser, ClusterId, ClusterRecord, CredentialRecord, NewRoleBinding, PlatformUser,
	RoleBinding, RoleType, UserId,
};
pub use user::{UserRepository, UserStore};

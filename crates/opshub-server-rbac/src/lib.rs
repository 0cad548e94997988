// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Multi-cluster Kubernetes RBAC core for OpsHub.
//!
//! This crate provides:
//! - [`ClusterClientCache`]: one live API client per managed cluster, built
//!   single-flight, invalidated on credential change or repeated connection
//!   failures, bounded in size and evicted when idle
//! - [`IdentityMapper`]: the `<prefix>-<username>` service-account convention
//! - [`RbacEngine`]: role, namespace and binding operations that merge live
//!   cluster objects with the platform's local records
//! - [`OperationContext`]: cancellation and deadlines for every operation

pub mod cache;
pub mod connector;
pub mod context;
pub mod engine;
pub mod error;
pub mod identity;
pub mod types;

pub use cache::{run_eviction_task, CacheSettings, ClusterClientCache, ClusterLease};
pub use connector::{ClientFactory, KubeClientFactory};
pub use context::OperationContext;
pub use engine::RbacEngine;
pub use error::{RbacError, Result};
pub use identity::IdentityMapper;
pub use types::{
	format_age, AvailableUsers, CredentialSource, CredentialUser, NamespaceInfo, RoleRecord,
	RoleScope, RuleRecord,
};

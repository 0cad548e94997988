// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

pub mod cluster_cache;
pub mod database;
pub mod logging;
pub mod rbac;

pub use cluster_cache::{ClusterCacheConfig, ClusterCacheConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use rbac::{RbacConfig, RbacConfigLayer};

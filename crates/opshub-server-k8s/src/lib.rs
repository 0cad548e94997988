// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s client abstraction for OpsHub cluster RBAC management.
//!
//! This crate provides:
//! - A trait-based K8s client abstraction covering the RBAC, namespace and
//!   service-account verbs the platform needs
//! - Production implementation using the kube crate, built from a kubeconfig
//! - An in-memory mock cluster for tests

mod client;
mod error;
mod kube_client;
mod mock;
mod types;

pub use client::K8sClient;
pub use error::{K8sError, K8sResult};
pub use kube_client::KubeClient;
pub use mock::MockK8sClient;
pub use types::{ClusterRole, ConnectOptions, Namespace, PolicyRule, Role, ServiceAccount};

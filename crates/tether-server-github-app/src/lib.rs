// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! GitHub App installation client for Tether.
//!
//! This crate provides a typed Rust client for GitHub App authentication
//! and the installation-level API surface Tether reconciles against:
//! listing the App's installations, minting installation-scoped access
//! tokens, listing the repositories an installation exposes, and
//! best-effort installation deletion.

pub mod client;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use client::{GithubAppClient, InstallationApi};
pub use config::GithubAppConfig;
pub use error::GithubAppError;
pub use tether_common_http::RetryConfig;
pub use types::{
	InstallationRepositoriesResponse, InstallationToken, RemoteAccount, RemoteInstallation,
	RemoteRepository,
};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Integration lifecycle, installation reconciliation and sweeps.
//!
//! The catalog's truth is split: integration rows live locally, the App
//! installations they depend on live on GitHub, and the two drift
//! independently. This crate owns the machinery that keeps them
//! reconciled:
//!
//! - [`IntegrationService`] - the lifecycle orchestrator; every mutation of
//!   integration rows runs through it and its per-kind [`IntegrationHooks`]
//! - [`sync_all_installations`] - refreshes the local installation mirror
//!   from remote state, never creating rows on its own
//! - [`cleanup_orphaned_github_integrations`] /
//!   [`heal_broken_integrations`] - the orphan and healing sweeps
//! - [`ensure_installation_connected`] - the cross-tenant ownership guard

pub mod error;
pub mod github;
pub mod hooks;
pub mod service;
pub mod static_file;
pub mod store;
pub mod sweep;
pub mod sync;
pub mod tenant;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{AccessCheckError, IntegrationError, Result};
pub use github::GithubHooks;
pub use hooks::{
	HookDecision, HookOutcome, HookRegistry, IntegrationContext, IntegrationHooks,
};
pub use service::IntegrationService;
pub use static_file::StaticFileHooks;
pub use store::{
	InstallationStore, IntegrationStore, SqliteInstallationStore, SqliteIntegrationStore,
};
pub use sweep::{
	cleanup_orphaned_github_integrations, ensure_installation_connected, heal_broken_integrations,
	run_reconciliation_sweep, SweepReport,
};
pub use sync::{
	handle_installation_callback, sync_all_installations, upsert_installation_container,
	OnboardingError,
};
pub use tenant::{TenantResolver, TenantStores};
pub use types::{
	AccessCheckOutcome, ContainerType, GithubMetadata, Installation, InstallationChanges,
	Integration, IntegrationKind, IntegrationPatch, IntegrationStatus, NewInstallation,
	NewIntegration,
};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Per-kind lifecycle hooks.
//!
//! Each integration kind contributes one [`IntegrationHooks`] value. The
//! orchestrator invokes the slots at fixed pipeline points; every gating
//! slot defaults to "allow, no side effect" so a kind only implements what
//! it cares about. `handle_access_check` is the one required slot - every
//! kind must be able to answer "does this integration still have access".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tether_server_db::UnitOfWork;

use crate::error::{AccessCheckError, IntegrationError, Result};
use crate::github::GithubHooks;
use crate::service::IntegrationService;
use crate::static_file::StaticFileHooks;
use crate::store::InstallationStore;
use crate::types::{
	AccessCheckOutcome, Integration, IntegrationKind, IntegrationPatch, NewIntegration,
};
use tether_server_github_app::InstallationApi;

/// Verdict of a gating hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
	/// Continue the pipeline.
	Proceed,
	/// Stop silently: no row touched, surfaced to the caller as a
	/// structured rejection rather than an exception.
	Veto,
}

impl HookDecision {
	pub fn is_veto(&self) -> bool {
		matches!(self, HookDecision::Veto)
	}
}

/// Result of a best-effort post hook.
///
/// Consumed only for logging, never for control flow: a `Failed` after a
/// committed update or a completed delete cannot roll anything back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
	Ok,
	Failed(String),
}

impl HookOutcome {
	pub fn failed(reason: impl Into<String>) -> Self {
		HookOutcome::Failed(reason.into())
	}
}

/// What a hook gets to work with: a handle back to the orchestrator, so
/// hooks can invoke other integration operations, plus the tenant's
/// installation store and the remote API.
pub struct IntegrationContext<'a> {
	service: &'a IntegrationService,
}

impl<'a> IntegrationContext<'a> {
	pub(crate) fn new(service: &'a IntegrationService) -> Self {
		Self { service }
	}

	pub fn service(&self) -> &IntegrationService {
		self.service
	}

	pub fn installations(&self) -> &dyn InstallationStore {
		self.service.installations()
	}

	pub fn api(&self) -> &dyn InstallationApi {
		self.service.api()
	}
}

/// Lifecycle hook slots for one integration kind.
///
/// The transactional pre-update slot is the only one handed a
/// [`UnitOfWork`]; it runs while a database transaction is open and must
/// stay cheap. Everything else runs outside any transaction.
#[async_trait]
pub trait IntegrationHooks: Send + Sync {
	/// Before a new row is inserted. May mutate the candidate's status and
	/// metadata. `Veto` means no row is inserted and no error is raised
	/// beyond the structured rejection.
	async fn pre_create(
		&self,
		_ctx: &IntegrationContext<'_>,
		_candidate: &mut NewIntegration,
	) -> Result<HookDecision> {
		Ok(HookDecision::Proceed)
	}

	/// Before the update transaction opens. `Veto` skips the update
	/// entirely.
	async fn pre_update(
		&self,
		_ctx: &IntegrationContext<'_>,
		_existing: &Integration,
		_patch: &IntegrationPatch,
	) -> Result<HookDecision> {
		Ok(HookDecision::Proceed)
	}

	/// Inside the update transaction, immediately before the column write.
	/// `Veto` rolls the transaction back.
	async fn pre_update_transactional(
		&self,
		_ctx: &IntegrationContext<'_>,
		_uow: &mut UnitOfWork,
		_existing: &Integration,
		_patch: &IntegrationPatch,
	) -> Result<HookDecision> {
		Ok(HookDecision::Proceed)
	}

	/// After a successful commit. Side effects only.
	async fn post_update(
		&self,
		_ctx: &IntegrationContext<'_>,
		_updated: &Integration,
	) -> HookOutcome {
		HookOutcome::Ok
	}

	/// Before deletion. `Veto` rejects the delete.
	async fn pre_delete(
		&self,
		_ctx: &IntegrationContext<'_>,
		_existing: &Integration,
	) -> Result<HookDecision> {
		Ok(HookDecision::Proceed)
	}

	/// After deletion. Side effects only.
	async fn post_delete(
		&self,
		_ctx: &IntegrationContext<'_>,
		_deleted: &Integration,
	) -> HookOutcome {
		HookOutcome::Ok
	}

	/// Answer whether the integration still has access to its external
	/// resource. Required for every kind; must not panic.
	async fn handle_access_check(
		&self,
		ctx: &IntegrationContext<'_>,
		integration: &Integration,
	) -> std::result::Result<AccessCheckOutcome, AccessCheckError>;
}

/// Table of hook implementations keyed by integration kind.
#[derive(Default)]
pub struct HookRegistry {
	hooks: HashMap<IntegrationKind, Arc<dyn IntegrationHooks>>,
}

impl HookRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// The registry with the built-in kinds.
	pub fn standard() -> Self {
		let mut registry = Self::new();
		registry
			.register(IntegrationKind::Github, Arc::new(GithubHooks))
			.expect("github hooks register on a fresh registry");
		registry
			.register(IntegrationKind::StaticFile, Arc::new(StaticFileHooks))
			.expect("static_file hooks register on a fresh registry");
		registry
	}

	/// Register hooks for a kind. Rejected for `Unknown` and for a kind
	/// that already has hooks, so misconfiguration fails here rather than
	/// on some later call path.
	pub fn register(
		&mut self,
		kind: IntegrationKind,
		hooks: Arc<dyn IntegrationHooks>,
	) -> Result<()> {
		if kind == IntegrationKind::Unknown {
			return Err(IntegrationError::Registration(
				"cannot register hooks for the unknown kind".to_string(),
			));
		}
		if self.hooks.contains_key(&kind) {
			return Err(IntegrationError::Registration(format!(
				"hooks already registered for kind {kind}"
			)));
		}
		self.hooks.insert(kind, hooks);
		Ok(())
	}

	pub fn get(&self, kind: IntegrationKind) -> Option<&Arc<dyn IntegrationHooks>> {
		self.hooks.get(&kind)
	}
}

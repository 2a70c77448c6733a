// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared fakes and builders for this crate's tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tether_server_db::{InstallationRepository, IntegrationRepository, UnitOfWork};
use tether_server_github_app::{
	InstallationApi, InstallationToken, RemoteAccount, RemoteInstallation, RemoteRepository,
};

use crate::error::{AccessCheckError, Result};
use crate::hooks::{HookDecision, HookOutcome, HookRegistry, IntegrationContext, IntegrationHooks};
use crate::service::IntegrationService;
use crate::store::{
	InstallationStore, IntegrationStore, SqliteInstallationStore, SqliteIntegrationStore,
};
use crate::types::{
	AccessCheckOutcome, ContainerType, Installation, InstallationChanges, Integration,
	IntegrationKind, IntegrationPatch, IntegrationStatus, NewInstallation, NewIntegration,
};

pub(crate) const FAKE_APP_ID: u64 = 42;

const FAKE_TOKEN_PREFIX: &str = "ghs_fake_";

// =========================================================================
// Fake remote API
// =========================================================================

/// In-memory [`InstallationApi`] with call recording.
///
/// Tokens encode the installation id so `list_repositories` can resolve
/// which installation a token belongs to, the same way the real API scopes
/// a token to one installation.
pub(crate) struct FakeInstallationApi {
	installations: Mutex<Vec<RemoteInstallation>>,
	repos: Mutex<HashMap<i64, Vec<RemoteRepository>>>,
	deny_tokens: bool,
	fail_listing: bool,
	deleted: Mutex<Vec<i64>>,
	list_installations_calls: AtomicU32,
}

impl FakeInstallationApi {
	pub(crate) fn new() -> Self {
		Self {
			installations: Mutex::new(Vec::new()),
			repos: Mutex::new(HashMap::new()),
			deny_tokens: false,
			fail_listing: false,
			deleted: Mutex::new(Vec::new()),
			list_installations_calls: AtomicU32::new(0),
		}
	}

	pub(crate) fn with_installation(self, id: i64, login: &str, target_type: &str) -> Self {
		self.installations.lock().unwrap().push(RemoteInstallation {
			id,
			account: RemoteAccount {
				login: login.to_string(),
				kind: Some(target_type.to_string()),
			},
			target_type: Some(target_type.to_string()),
		});
		self
	}

	pub(crate) fn with_repos(self, installation_id: i64, full_names: &[&str]) -> Self {
		self.repos.lock().unwrap().insert(
			installation_id,
			full_names
				.iter()
				.enumerate()
				.map(|(i, &full_name)| RemoteRepository {
					id: i as i64 + 1,
					name: full_name.rsplit('/').next().unwrap_or(full_name).to_string(),
					full_name: full_name.to_string(),
					private: false,
				})
				.collect(),
		);
		self
	}

	pub(crate) fn deny_tokens(mut self) -> Self {
		self.deny_tokens = true;
		self
	}

	pub(crate) fn fail_listing(mut self) -> Self {
		self.fail_listing = true;
		self
	}

	pub(crate) fn deleted_installations(&self) -> Vec<i64> {
		self.deleted.lock().unwrap().clone()
	}

	pub(crate) fn list_installations_calls(&self) -> u32 {
		self.list_installations_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl InstallationApi for FakeInstallationApi {
	fn app_id(&self) -> u64 {
		FAKE_APP_ID
	}

	async fn list_installations(&self) -> Option<Vec<RemoteInstallation>> {
		self.list_installations_calls.fetch_add(1, Ordering::SeqCst);
		if self.fail_listing {
			return None;
		}
		Some(self.installations.lock().unwrap().clone())
	}

	async fn mint_installation_token(&self, installation_id: i64) -> Option<InstallationToken> {
		if self.deny_tokens {
			return None;
		}
		Some(InstallationToken {
			token: format!("{FAKE_TOKEN_PREFIX}{installation_id}").into(),
			expires_at: None,
		})
	}

	async fn list_repositories(&self, token: &InstallationToken) -> Option<Vec<RemoteRepository>> {
		let installation_id: i64 = token
			.token
			.expose()
			.strip_prefix(FAKE_TOKEN_PREFIX)?
			.parse()
			.ok()?;
		self.repos.lock().unwrap().get(&installation_id).cloned()
	}

	async fn delete_installation(&self, installation_id: i64) -> bool {
		self.deleted.lock().unwrap().push(installation_id);
		true
	}
}

// =========================================================================
// Fake installation store
// =========================================================================

/// In-memory [`InstallationStore`] recording which mutations happened, so
/// tests can assert "create was never called" style properties.
pub(crate) struct FakeInstallationStore {
	rows: Mutex<Vec<Installation>>,
	next_id: AtomicI64,
	create_calls: AtomicU32,
	update_calls: AtomicU32,
	delete_calls: AtomicU32,
}

impl FakeInstallationStore {
	pub(crate) fn new() -> Self {
		Self {
			rows: Mutex::new(Vec::new()),
			next_id: AtomicI64::new(1),
			create_calls: AtomicU32::new(0),
			update_calls: AtomicU32::new(0),
			delete_calls: AtomicU32::new(0),
		}
	}

	/// Insert a row directly, without counting as a create call.
	pub(crate) fn seed(
		&self,
		name: &str,
		container_type: ContainerType,
		installation_id: i64,
		repos: &[&str],
	) {
		let now = Utc::now();
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		self.rows.lock().unwrap().push(Installation {
			id,
			name: name.to_string(),
			container_type,
			installation_id,
			repos: repos.iter().map(|r| r.to_string()).collect(),
			created_at: now,
			updated_at: now,
		});
	}

	pub(crate) fn len(&self) -> usize {
		self.rows.lock().unwrap().len()
	}

	pub(crate) fn create_calls(&self) -> u32 {
		self.create_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn update_calls(&self) -> u32 {
		self.update_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn delete_calls(&self) -> u32 {
		self.delete_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl InstallationStore for FakeInstallationStore {
	async fn list_installations(&self) -> Result<Vec<Installation>> {
		Ok(self.rows.lock().unwrap().clone())
	}

	async fn get_by_name(&self, name: &str) -> Result<Option<Installation>> {
		Ok(
			self
				.rows
				.lock()
				.unwrap()
				.iter()
				.find(|i| i.name == name)
				.cloned(),
		)
	}

	async fn get_by_installation_id(&self, installation_id: i64) -> Result<Option<Installation>> {
		Ok(
			self
				.rows
				.lock()
				.unwrap()
				.iter()
				.find(|i| i.installation_id == installation_id)
				.cloned(),
		)
	}

	async fn create_installation(&self, new: &NewInstallation) -> Result<Installation> {
		self.create_calls.fetch_add(1, Ordering::SeqCst);
		let now = Utc::now();
		let installation = Installation {
			id: self.next_id.fetch_add(1, Ordering::SeqCst),
			name: new.name.clone(),
			container_type: new.container_type,
			installation_id: new.installation_id,
			repos: new.repos.clone(),
			created_at: now,
			updated_at: now,
		};
		self.rows.lock().unwrap().push(installation.clone());
		Ok(installation)
	}

	async fn update_installation(
		&self,
		id: i64,
		changes: &InstallationChanges,
	) -> Result<Installation> {
		self.update_calls.fetch_add(1, Ordering::SeqCst);
		let mut rows = self.rows.lock().unwrap();
		let row = rows
			.iter_mut()
			.find(|i| i.id == id)
			.ok_or(crate::error::IntegrationError::NotFound)?;
		row.container_type = changes.container_type;
		row.installation_id = changes.installation_id;
		row.repos = changes.repos.clone();
		row.updated_at = Utc::now();
		Ok(row.clone())
	}

	async fn delete_installation(&self, id: i64) -> Result<()> {
		self.delete_calls.fetch_add(1, Ordering::SeqCst);
		let mut rows = self.rows.lock().unwrap();
		let before = rows.len();
		rows.retain(|i| i.id != id);
		if rows.len() == before {
			return Err(crate::error::IntegrationError::NotFound);
		}
		Ok(())
	}
}

// =========================================================================
// Recording hooks
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VetoPoint {
	PreCreate,
	PreUpdate,
	PreUpdateTransactional,
	PreDelete,
}

/// Hooks that count their invocations and optionally veto at one point.
pub(crate) struct RecordingHooks {
	calls: Mutex<HashMap<&'static str, u32>>,
	veto_at: Option<VetoPoint>,
	status_on_create: Option<IntegrationStatus>,
	fail_post_update: bool,
}

impl RecordingHooks {
	pub(crate) fn new() -> Self {
		Self {
			calls: Mutex::new(HashMap::new()),
			veto_at: None,
			status_on_create: None,
			fail_post_update: false,
		}
	}

	pub(crate) fn veto_at(mut self, point: VetoPoint) -> Self {
		self.veto_at = Some(point);
		self
	}

	pub(crate) fn set_status_on_create(mut self, status: IntegrationStatus) -> Self {
		self.status_on_create = Some(status);
		self
	}

	pub(crate) fn fail_post_update(mut self) -> Self {
		self.fail_post_update = true;
		self
	}

	pub(crate) fn calls(&self, slot: &str) -> u32 {
		self.calls.lock().unwrap().get(slot).copied().unwrap_or(0)
	}

	fn record(&self, slot: &'static str) {
		*self.calls.lock().unwrap().entry(slot).or_insert(0) += 1;
	}

	fn decision(&self, point: VetoPoint) -> HookDecision {
		if self.veto_at == Some(point) {
			HookDecision::Veto
		} else {
			HookDecision::Proceed
		}
	}
}

#[async_trait]
impl IntegrationHooks for RecordingHooks {
	async fn pre_create(
		&self,
		_ctx: &IntegrationContext<'_>,
		candidate: &mut NewIntegration,
	) -> Result<HookDecision> {
		self.record("pre_create");
		if let Some(status) = self.status_on_create {
			candidate.status = status;
		}
		Ok(self.decision(VetoPoint::PreCreate))
	}

	async fn pre_update(
		&self,
		_ctx: &IntegrationContext<'_>,
		_existing: &Integration,
		_patch: &IntegrationPatch,
	) -> Result<HookDecision> {
		self.record("pre_update");
		Ok(self.decision(VetoPoint::PreUpdate))
	}

	async fn pre_update_transactional(
		&self,
		_ctx: &IntegrationContext<'_>,
		_uow: &mut UnitOfWork,
		_existing: &Integration,
		_patch: &IntegrationPatch,
	) -> Result<HookDecision> {
		self.record("pre_update_transactional");
		Ok(self.decision(VetoPoint::PreUpdateTransactional))
	}

	async fn post_update(
		&self,
		_ctx: &IntegrationContext<'_>,
		_updated: &Integration,
	) -> HookOutcome {
		self.record("post_update");
		if self.fail_post_update {
			HookOutcome::failed("post_update failed on purpose")
		} else {
			HookOutcome::Ok
		}
	}

	async fn pre_delete(
		&self,
		_ctx: &IntegrationContext<'_>,
		_existing: &Integration,
	) -> Result<HookDecision> {
		self.record("pre_delete");
		Ok(self.decision(VetoPoint::PreDelete))
	}

	async fn post_delete(
		&self,
		_ctx: &IntegrationContext<'_>,
		_deleted: &Integration,
	) -> HookOutcome {
		self.record("post_delete");
		HookOutcome::Ok
	}

	async fn handle_access_check(
		&self,
		_ctx: &IntegrationContext<'_>,
		integration: &Integration,
	) -> std::result::Result<AccessCheckOutcome, AccessCheckError> {
		self.record("handle_access_check");
		Ok(AccessCheckOutcome {
			has_access: true,
			status: integration.status,
		})
	}
}

// =========================================================================
// Service builders
// =========================================================================

pub(crate) fn noop_api() -> Arc<FakeInstallationApi> {
	Arc::new(FakeInstallationApi::new())
}

async fn sqlite_stores() -> (Arc<SqliteIntegrationStore>, Arc<SqliteInstallationStore>) {
	let pool = tether_server_db::testing::create_integration_test_pool().await;
	(
		Arc::new(SqliteIntegrationStore::new(IntegrationRepository::new(
			pool.clone(),
		))),
		Arc::new(SqliteInstallationStore::new(InstallationRepository::new(
			pool,
		))),
	)
}

/// A service over in-memory SQLite with ONLY the github kind registered,
/// pointed at the given recording hooks.
pub(crate) async fn service_with_hooks(
	hooks: Arc<RecordingHooks>,
	api: Arc<FakeInstallationApi>,
) -> IntegrationService {
	let (integrations, installations) = sqlite_stores().await;
	let mut registry = HookRegistry::new();
	registry.register(IntegrationKind::Github, hooks).unwrap();
	IntegrationService::new(integrations, installations, api, registry)
}

/// A service over in-memory SQLite with the standard hook registry.
pub(crate) async fn standard_service(api: Arc<FakeInstallationApi>) -> IntegrationService {
	let (integrations, installations) = sqlite_stores().await;
	IntegrationService::new(integrations, installations, api, HookRegistry::standard())
}

/// Alias that reads better in github-centric tests.
pub(crate) async fn github_service(api: Arc<FakeInstallationApi>) -> IntegrationService {
	standard_service(api).await
}

/// Mirror an installation into the tenant's store, as onboarding would.
pub(crate) async fn mirror_installation(
	service: &IntegrationService,
	name: &str,
	installation_id: i64,
) -> Installation {
	service
		.installations()
		.create_installation(&NewInstallation {
			name: name.to_string(),
			container_type: ContainerType::Org,
			installation_id,
			repos: Vec::new(),
		})
		.await
		.unwrap()
}

/// Insert a github integration row directly, bypassing the hooks, to set
/// up arbitrary pre-existing state.
pub(crate) async fn insert_raw_github_integration(
	service: &IntegrationService,
	name: &str,
	status: IntegrationStatus,
	metadata: serde_json::Value,
) -> Integration {
	let candidate = NewIntegration {
		kind: IntegrationKind::Github,
		name: name.to_string(),
		status,
		metadata,
	};
	service.integrations_store().insert(&candidate).await.unwrap()
}

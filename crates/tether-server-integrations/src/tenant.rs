// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tenant-scoped store bundles.
//!
//! Reconciliation code is tenant-agnostic: it works on whatever store
//! handles it is given. A resolver maps "which tenant is this request
//! for" to the tenant's already-scoped stores; everything downstream stays
//! oblivious. Tenant isolation therefore reduces to handing the right
//! bundle to the right request - there is no tenant id threading through
//! the reconciliation logic.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::hooks::HookRegistry;
use crate::service::IntegrationService;
use crate::store::{InstallationStore, IntegrationStore};
use tether_server_github_app::InstallationApi;

/// One tenant's store handles.
#[derive(Clone)]
pub struct TenantStores {
	pub integrations: Arc<dyn IntegrationStore>,
	pub installations: Arc<dyn InstallationStore>,
}

impl TenantStores {
	/// Build the tenant's lifecycle service around these stores.
	pub fn into_service(self, api: Arc<dyn InstallationApi>, registry: HookRegistry) -> IntegrationService {
		IntegrationService::new(self.integrations, self.installations, api, registry)
	}
}

/// Supplies the store bundle for a tenant.
#[async_trait]
pub trait TenantResolver: Send + Sync {
	async fn stores_for(&self, tenant: &str) -> Result<TenantStores>;
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Lifecycle hooks for static-file integrations.
//!
//! Static files live entirely inside the workspace, so there is no remote
//! side to drift from: access checks always pass.

use async_trait::async_trait;
use tracing::warn;

use crate::error::{AccessCheckError, Result};
use crate::hooks::{HookDecision, IntegrationContext, IntegrationHooks};
use crate::types::{AccessCheckOutcome, Integration, IntegrationStatus, NewIntegration};

pub struct StaticFileHooks;

#[async_trait]
impl IntegrationHooks for StaticFileHooks {
	async fn pre_create(
		&self,
		_ctx: &IntegrationContext<'_>,
		candidate: &mut NewIntegration,
	) -> Result<HookDecision> {
		let path = candidate
			.metadata
			.get("path")
			.and_then(|v| v.as_str())
			.unwrap_or_default();
		if path.is_empty() {
			warn!(name = %candidate.name, "static file integration candidate without a path");
			return Ok(HookDecision::Veto);
		}

		candidate.status = IntegrationStatus::Active;
		Ok(HookDecision::Proceed)
	}

	async fn handle_access_check(
		&self,
		_ctx: &IntegrationContext<'_>,
		_integration: &Integration,
	) -> std::result::Result<AccessCheckOutcome, AccessCheckError> {
		Ok(AccessCheckOutcome {
			has_access: true,
			status: IntegrationStatus::Active,
		})
	}
}

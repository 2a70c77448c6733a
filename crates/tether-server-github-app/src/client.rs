// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Client for the GitHub App installation API.
//!
//! Every public method collapses failure to `Option`/`bool` after logging:
//! callers of this client decide retry-vs-give-up from the absence of a
//! result, never from an error type. A `None` from
//! [`GithubAppClient::mint_installation_token`] means "cannot act as this
//! installation right now" - it is NOT evidence the installation was
//! removed. A `None` from [`GithubAppClient::list_repositories`] can mean
//! either a transient failure or that the App was uninstalled; callers
//! distinguish the two only by context.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use tether_common_http::retry;

use crate::config::GithubAppConfig;
use crate::error::GithubAppError;
use crate::jwt::generate_app_jwt;
use crate::types::{
	InstallationRepositoriesResponse, InstallationToken, RemoteInstallation, RemoteRepository,
};

const ACCEPT_HEADER: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "2022-11-28";
const PER_PAGE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The remote operations reconciliation code needs from the App API.
///
/// [`GithubAppClient`] is the production implementation; tests drive the
/// reconciler and hooks with hand-rolled fakes.
#[async_trait]
pub trait InstallationApi: Send + Sync {
	/// The App's numeric id (stamped into integration metadata).
	fn app_id(&self) -> u64;

	/// Enumerate every installation the App is part of. `None` on failure.
	async fn list_installations(&self) -> Option<Vec<RemoteInstallation>>;

	/// Exchange the App JWT for an installation-scoped token. `None` on any
	/// non-success response.
	async fn mint_installation_token(&self, installation_id: i64) -> Option<InstallationToken>;

	/// Enumerate the repositories one installation exposes. `None` means
	/// failure or App uninstalled.
	async fn list_repositories(&self, token: &InstallationToken) -> Option<Vec<RemoteRepository>>;

	/// Best-effort uninstall; "already gone" counts as success.
	async fn delete_installation(&self, installation_id: i64) -> bool;
}

/// HTTP client for the GitHub App installation API.
#[derive(Debug, Clone)]
pub struct GithubAppClient {
	config: GithubAppConfig,
	http_client: reqwest::Client,
}

impl GithubAppClient {
	/// Create a new client for the given App.
	///
	/// # Panics
	///
	/// Panics if the HTTP client cannot be built (should never happen in
	/// practice).
	pub fn new(config: GithubAppConfig) -> Self {
		let http_client = tether_common_http::builder()
			.timeout(REQUEST_TIMEOUT)
			.build()
			.expect("failed to build HTTP client");

		Self {
			config,
			http_client,
		}
	}

	/// The App configuration this client was built with.
	pub fn config(&self) -> &GithubAppConfig {
		&self.config
	}

	/// The App's numeric id.
	pub fn app_id(&self) -> u64 {
		self.config.app_id()
	}

	/// Mint the short-lived App-level JWT.
	///
	/// Only ever used to mint installation tokens, list installations and
	/// delete installations - never to act on repository content.
	fn app_jwt(&self) -> Result<String, GithubAppError> {
		generate_app_jwt(self.config.app_id(), self.config.private_key_pem())
	}

	fn api_url(&self, path: &str) -> String {
		format!(
			"{}/{}",
			self.config.base_url().as_str().trim_end_matches('/'),
			path.trim_start_matches('/')
		)
	}

	/// Map a non-success response to the matching error, consuming the body
	/// for the message.
	async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GithubAppError> {
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		let message = response.text().await.unwrap_or_default();
		Err(match status.as_u16() {
			401 => GithubAppError::Unauthorized,
			403 if message.contains("rate limit") => GithubAppError::RateLimited,
			403 => GithubAppError::Forbidden,
			429 => GithubAppError::RateLimited,
			code => GithubAppError::api_error(code, message),
		})
	}

	async fn list_installations_inner(&self) -> Result<Vec<RemoteInstallation>, GithubAppError> {
		let jwt = self.app_jwt()?;
		let url = self.api_url("app/installations");

		let mut installations: Vec<RemoteInstallation> = Vec::new();
		let mut page = 1u32;
		loop {
			let response = retry(&self.config.retry_config, "list_installations", || async {
				let response = self
					.http_client
					.get(&url)
					.query(&[("per_page", PER_PAGE as u32), ("page", page)])
					.bearer_auth(&jwt)
					.header("Accept", ACCEPT_HEADER)
					.header("X-GitHub-Api-Version", API_VERSION_HEADER)
					.send()
					.await?;
				Self::check_status(response).await
			})
			.await?;

			let page_items: Vec<RemoteInstallation> = response.json().await.map_err(|e| {
				GithubAppError::InvalidResponse(format!("failed to parse installations: {e}"))
			})?;

			let page_len = page_items.len();
			installations.extend(page_items);

			if page_len < PER_PAGE {
				break;
			}
			page += 1;
		}

		debug!(count = installations.len(), "Listed App installations");
		Ok(installations)
	}

	async fn mint_installation_token_inner(
		&self,
		installation_id: i64,
	) -> Result<InstallationToken, GithubAppError> {
		let jwt = self.app_jwt()?;
		let url = self.api_url(&format!(
			"app/installations/{installation_id}/access_tokens"
		));

		let response = retry(&self.config.retry_config, "mint_installation_token", || {
			async {
				let response = self
					.http_client
					.post(&url)
					.bearer_auth(&jwt)
					.header("Accept", ACCEPT_HEADER)
					.header("X-GitHub-Api-Version", API_VERSION_HEADER)
					.send()
					.await?;
				Self::check_status(response).await
			}
		})
		.await?;

		response.json().await.map_err(|e| {
			GithubAppError::InvalidResponse(format!("failed to parse installation token: {e}"))
		})
	}

	async fn list_repositories_inner(
		&self,
		token: &InstallationToken,
	) -> Result<Vec<RemoteRepository>, GithubAppError> {
		let url = self.api_url("installation/repositories");

		let mut repositories: Vec<RemoteRepository> = Vec::new();
		let mut page = 1u32;
		loop {
			let response = retry(&self.config.retry_config, "list_repositories", || async {
				let response = self
					.http_client
					.get(&url)
					.query(&[("per_page", PER_PAGE as u32), ("page", page)])
					.bearer_auth(token.token.expose())
					.header("Accept", ACCEPT_HEADER)
					.header("X-GitHub-Api-Version", API_VERSION_HEADER)
					.send()
					.await?;
				Self::check_status(response).await
			})
			.await?;

			let body: InstallationRepositoriesResponse = response.json().await.map_err(|e| {
				GithubAppError::InvalidResponse(format!("failed to parse repositories: {e}"))
			})?;

			let page_len = body.repositories.len();
			repositories.extend(body.repositories);

			if page_len < PER_PAGE || repositories.len() as i64 >= body.total_count {
				break;
			}
			page += 1;
		}

		debug!(count = repositories.len(), "Listed installation repositories");
		Ok(repositories)
	}

	async fn delete_installation_inner(&self, installation_id: i64) -> Result<(), GithubAppError> {
		let jwt = self.app_jwt()?;
		let url = self.api_url(&format!("app/installations/{installation_id}"));

		let response = self
			.http_client
			.delete(&url)
			.bearer_auth(&jwt)
			.header("Accept", ACCEPT_HEADER)
			.header("X-GitHub-Api-Version", API_VERSION_HEADER)
			.send()
			.await?;

		// Already gone is success: the goal state is "no installation".
		if response.status().as_u16() == 404 {
			return Ok(());
		}

		Self::check_status(response).await?;
		Ok(())
	}

	/// Enumerate every installation the App is part of.
	#[instrument(skip(self), fields(app_id = self.config.app_id()))]
	pub async fn list_installations(&self) -> Option<Vec<RemoteInstallation>> {
		match self.list_installations_inner().await {
			Ok(installations) => Some(installations),
			Err(e) => {
				warn!(error = %e, "failed to list App installations");
				None
			}
		}
	}

	/// Exchange the App JWT for an installation-scoped access token.
	#[instrument(skip(self))]
	pub async fn mint_installation_token(&self, installation_id: i64) -> Option<InstallationToken> {
		match self.mint_installation_token_inner(installation_id).await {
			Ok(token) => Some(token),
			Err(e) => {
				warn!(installation_id, error = %e, "failed to mint installation token");
				None
			}
		}
	}

	/// Enumerate the repositories visible to an installation token.
	#[instrument(skip_all)]
	pub async fn list_repositories(
		&self,
		token: &InstallationToken,
	) -> Option<Vec<RemoteRepository>> {
		match self.list_repositories_inner(token).await {
			Ok(repositories) => Some(repositories),
			Err(e) => {
				warn!(error = %e, "failed to list installation repositories");
				None
			}
		}
	}

	/// Delete an installation, treating "already gone" as success.
	#[instrument(skip(self))]
	pub async fn delete_installation(&self, installation_id: i64) -> bool {
		match self.delete_installation_inner(installation_id).await {
			Ok(()) => true,
			Err(e) => {
				warn!(installation_id, error = %e, "failed to delete installation");
				false
			}
		}
	}
}

#[async_trait]
impl InstallationApi for GithubAppClient {
	fn app_id(&self) -> u64 {
		GithubAppClient::app_id(self)
	}

	async fn list_installations(&self) -> Option<Vec<RemoteInstallation>> {
		GithubAppClient::list_installations(self).await
	}

	async fn mint_installation_token(&self, installation_id: i64) -> Option<InstallationToken> {
		GithubAppClient::mint_installation_token(self, installation_id).await
	}

	async fn list_repositories(&self, token: &InstallationToken) -> Option<Vec<RemoteRepository>> {
		GithubAppClient::list_repositories(self, token).await
	}

	async fn delete_installation(&self, installation_id: i64) -> bool {
		GithubAppClient::delete_installation(self, installation_id).await
	}
}

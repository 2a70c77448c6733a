// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration for the GitHub App client.

use std::env;

use reqwest::Url;
use tether_common_config::{load_secret_env, Secret, SecretString};
use tether_common_http::RetryConfig;
use tracing::warn;

use crate::error::GithubAppError;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const DEFAULT_APP_SLUG: &str = "tether";

/// Configuration for the GitHub App client.
///
/// The App is always an explicit value constructed here and passed into
/// [`crate::GithubAppClient::new`]; nothing in this codebase reads App
/// identity from ambient global state. The private key is stored as
/// [`SecretString`] to prevent accidental logging. Use `.expose()` to
/// access the actual value.
#[derive(Clone)]
pub struct GithubAppConfig {
	/// GitHub App numeric ID
	app_id: u64,

	/// PEM-encoded RSA private key for JWT signing
	private_key_pem: SecretString,

	/// App slug for installation URL generation
	app_slug: String,

	/// Base URL for GitHub API (validated HTTPS, parsed)
	base_url: Url,

	/// HTTP retry configuration
	pub retry_config: RetryConfig,
}

impl std::fmt::Debug for GithubAppConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GithubAppConfig")
			.field("app_id", &self.app_id)
			.field("private_key_pem", &self.private_key_pem)
			.field("app_slug", &self.app_slug)
			.field("base_url", &self.base_url.as_str())
			.field("retry_config", &self.retry_config)
			.finish()
	}
}

impl GithubAppConfig {
	/// Validate and normalize a base URL.
	///
	/// Requirements:
	/// - Must be a valid URL
	/// - Must use HTTPS scheme (security requirement)
	/// - Must have a host
	fn validate_and_normalize_base_url(raw: &str) -> Result<Url, GithubAppError> {
		let url = Url::parse(raw)
			.map_err(|e| GithubAppError::Config(format!("Invalid GitHub base URL '{raw}': {e}")))?;

		if url.scheme() != "https" {
			return Err(GithubAppError::Config(format!(
				"GitHub base URL must use https, got '{}'",
				url.scheme()
			)));
		}

		let host = url
			.host_str()
			.ok_or_else(|| GithubAppError::Config("GitHub base URL must include a host".to_string()))?;

		if host == "localhost" || host == "127.0.0.1" || host == "::1" {
			return Err(GithubAppError::Config(
				"GitHub base URL must not be localhost".to_string(),
			));
		}

		Ok(url)
	}

	/// Create a new configuration with required fields.
	///
	/// Uses the default GitHub API URL (https://api.github.com).
	pub fn new(app_id: u64, private_key_pem: impl Into<String>) -> Self {
		Self {
			app_id,
			private_key_pem: Secret::new(private_key_pem.into()),
			app_slug: DEFAULT_APP_SLUG.to_string(),
			base_url: Url::parse(DEFAULT_BASE_URL).expect("default URL is valid"),
			retry_config: RetryConfig::default(),
		}
	}

	/// Create configuration from environment variables.
	///
	/// Required environment variables:
	/// - `TETHER_SERVER_GITHUB_APP_ID`: GitHub App numeric ID
	/// - `TETHER_SERVER_GITHUB_APP_PRIVATE_KEY`: PEM-encoded RSA private key
	///   (or `_FILE` suffix for file path)
	///
	/// Optional environment variables:
	/// - `TETHER_SERVER_GITHUB_APP_SLUG`: App slug (defaults to "tether")
	/// - `TETHER_SERVER_GITHUB_APP_BASE_URL`: API base URL (defaults to
	///   api.github.com, must be HTTPS)
	pub fn from_env() -> Result<Self, GithubAppError> {
		let app_id_str = env::var("TETHER_SERVER_GITHUB_APP_ID")
			.map_err(|_| GithubAppError::Config("TETHER_SERVER_GITHUB_APP_ID not set".to_string()))?;

		let app_id: u64 = app_id_str.parse().map_err(|_| {
			GithubAppError::Config(format!("Invalid TETHER_SERVER_GITHUB_APP_ID: {app_id_str}"))
		})?;

		let private_key_pem = load_secret_env("TETHER_SERVER_GITHUB_APP_PRIVATE_KEY")
			.map_err(|e| GithubAppError::Config(e.to_string()))?
			.ok_or_else(|| {
				GithubAppError::Config("TETHER_SERVER_GITHUB_APP_PRIVATE_KEY not set".to_string())
			})?;

		if private_key_pem.expose().is_empty() {
			return Err(GithubAppError::Config(
				"TETHER_SERVER_GITHUB_APP_PRIVATE_KEY is empty".to_string(),
			));
		}

		let app_slug =
			env::var("TETHER_SERVER_GITHUB_APP_SLUG").unwrap_or_else(|_| DEFAULT_APP_SLUG.to_string());

		let base_url_raw = env::var("TETHER_SERVER_GITHUB_APP_BASE_URL")
			.unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
		let base_url = Self::validate_and_normalize_base_url(&base_url_raw)?;

		Ok(Self {
			app_id,
			private_key_pem,
			app_slug,
			base_url,
			retry_config: RetryConfig::default(),
		})
	}

	/// Set a custom base URL (for GitHub Enterprise or testing).
	///
	/// The URL must be HTTPS and have a valid host.
	/// If validation fails, logs a warning and keeps the previous value.
	pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
		let url_str = url.into();
		match Self::validate_and_normalize_base_url(&url_str) {
			Ok(validated) => self.base_url = validated,
			Err(e) => {
				warn!(error = %e, url = %url_str, "Invalid base_url in with_base_url, keeping previous value");
			}
		}
		self
	}

	/// Set a custom retry configuration.
	pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
		self.retry_config = config;
		self
	}

	/// Set the app slug.
	pub fn with_app_slug(mut self, slug: impl Into<String>) -> Self {
		self.app_slug = slug.into();
		self
	}

	/// Get the GitHub App ID.
	pub fn app_id(&self) -> u64 {
		self.app_id
	}

	/// Get the private key PEM (for internal JWT generation).
	pub(crate) fn private_key_pem(&self) -> &str {
		self.private_key_pem.expose()
	}

	/// Get the app slug.
	pub fn app_slug(&self) -> &str {
		&self.app_slug
	}

	/// Get the validated base URL.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Get the installation URL users visit to grant the App access to a
	/// new organization or account.
	pub fn installation_url(&self) -> String {
		if self.base_url.as_str().starts_with(DEFAULT_BASE_URL) {
			format!(
				"https://github.com/apps/{}/installations/new",
				self.app_slug
			)
		} else {
			let base = self.base_url.as_str().trim_end_matches("/api/v3");
			format!("{}/apps/{}/installations/new", base, self.app_slug)
		}
	}
}

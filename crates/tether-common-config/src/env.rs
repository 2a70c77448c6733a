// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Environment variable helpers for secrets.
//!
//! Secrets can be supplied either directly (`NAME`) or through a file path
//! (`NAME_FILE`), which is the conventional shape for container secret
//! mounts. Setting both is a configuration error rather than a silent
//! precedence rule.

use std::env;
use std::fs;

use tether_common_secret::SecretString;
use thiserror::Error;

/// Errors that can occur while loading a secret from the environment.
#[derive(Debug, Error)]
pub enum SecretEnvError {
	/// Both `NAME` and `NAME_FILE` are set; refusing to guess which wins.
	#[error("both {var} and {var}_FILE are set; set exactly one")]
	Conflicting { var: String },

	/// The file named by `NAME_FILE` could not be read.
	#[error("failed to read {path} (from {var}_FILE): {source}")]
	FileRead {
		var: String,
		path: String,
		#[source]
		source: std::io::Error,
	},

	/// The environment variable contains invalid UTF-8.
	#[error("{var} is not valid UTF-8")]
	NotUnicode { var: String },
}

/// Error returned by [`require_secret_env`] when the secret is absent.
#[derive(Debug, Error)]
#[error("required secret {0} is not set (set {0} or {0}_FILE)")]
pub struct RequiredSecretError(pub String);

/// Load an optional secret from `var` or `var_FILE`.
///
/// Returns `Ok(None)` when neither variable is set. A value loaded from a
/// file has trailing whitespace trimmed (files written by secret mounts
/// commonly end with a newline).
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	let direct = read_env(var)?;
	let file_path = read_env(&file_var)?;

	match (direct, file_path) {
		(Some(_), Some(_)) => Err(SecretEnvError::Conflicting {
			var: var.to_string(),
		}),
		(Some(value), None) => Ok(Some(SecretString::new(value))),
		(None, Some(path)) => {
			let contents = fs::read_to_string(&path).map_err(|source| SecretEnvError::FileRead {
				var: var.to_string(),
				path,
				source,
			})?;
			Ok(Some(SecretString::new(
				contents.trim_end_matches(['\n', '\r']).to_string(),
			)))
		}
		(None, None) => Ok(None),
	}
}

/// Load a secret that must be present.
pub fn require_secret_env(var: &str) -> Result<SecretString, RequiredSecretError> {
	match load_secret_env(var) {
		Ok(Some(secret)) => Ok(secret),
		_ => Err(RequiredSecretError(var.to_string())),
	}
}

fn read_env(var: &str) -> Result<Option<String>, SecretEnvError> {
	match env::var(var) {
		Ok(value) => Ok(Some(value)),
		Err(env::VarError::NotPresent) => Ok(None),
		Err(env::VarError::NotUnicode(_)) => Err(SecretEnvError::NotUnicode {
			var: var.to_string(),
		}),
	}
}

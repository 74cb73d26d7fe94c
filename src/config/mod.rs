use std::env;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::runner::RunError;

pub const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com/v1";

/// How the credential is presented to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
	/// Azure deployments take the key in an `api-key` header.
	ApiKeyHeader,
	Bearer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
	Azure,
	Compatible,
	OpenAi,
}

impl EndpointKind {
	pub fn auth_style(self) -> AuthStyle {
		match self {
			EndpointKind::Azure => AuthStyle::ApiKeyHeader,
			EndpointKind::Compatible | EndpointKind::OpenAi => AuthStyle::Bearer,
		}
	}
}

/// Everything needed to reach the completion service. Built once at startup.
#[derive(Clone)]
pub struct ApiConfig {
	pub kind: EndpointKind,
	pub completions_url: Url,
	api_key: String,
	pub model_override: Option<String>,
	pub timeout: Option<Duration>,
}

impl fmt::Debug for ApiConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ApiConfig")
			.field("kind", &self.kind)
			.field("completions_url", &self.completions_url.as_str())
			.field("api_key", &"<redacted>")
			.field("model_override", &self.model_override)
			.field("timeout", &self.timeout)
			.finish()
	}
}

fn parse_url(raw: &str) -> Result<Url, RunError> {
	Url::parse(raw).map_err(|e| RunError::UpstreamFailure(format!("invalid endpoint URL {}: {}", raw, e)))
}

impl ApiConfig {
	pub fn from_env() -> Result<Self, RunError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Resolve the endpoint from a variable lookup. Azure wins over an
	/// OpenAI-compatible endpoint, which wins over plain OpenAI.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, RunError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

		let (kind, completions_url, api_key, model_override) =
			if let (Some(key), Some(base), Some(ver)) = (var("AZURE_API_KEY"), var("AZURE_API_BASE"), var("AZURE_API_VERSION")) {
				let base = if base.ends_with('/') { base } else { base + "/" };
				let mut url = parse_url(&format!("{}chat/completions", base))?;
				url.query_pairs_mut().append_pair("api-version", &ver);
				(EndpointKind::Azure, url, key, None)
			} else if let (Some(key), Some(base)) = (var("OAICOMPAT_API_KEY"), var("OAICOMPAT_API_BASE")) {
				let url = parse_url(&format!("{}/chat/completions", base.trim_end_matches('/')))?;
				(EndpointKind::Compatible, url, key, var("OAICOMPAT_MODEL_NAME"))
			} else if let Some(key) = var("OPENAI_API_KEY") {
				let base = var("OPENAI_BASE_URL").unwrap_or_else(|| OPENAI_DEFAULT_BASE.to_string());
				let url = parse_url(&format!("{}/chat/completions", base.trim_end_matches('/')))?;
				(EndpointKind::OpenAi, url, key, None)
			} else {
				return Err(RunError::AuthenticationFailure(
					"no API key configured (set OPENAI_API_KEY, OAICOMPAT_API_KEY/OAICOMPAT_API_BASE or the AZURE_API_* variables)".to_string(),
				));
			};

		let timeout = match var("OPENAI_TIMEOUT_SECONDS") {
			Some(raw) => match raw.trim().parse::<u64>() {
				Ok(secs) => Some(Duration::from_secs(secs)),
				Err(_) => {
					warn!(value = %raw, "ignoring invalid OPENAI_TIMEOUT_SECONDS");
					None
				},
			},
			None => None,
		};

		debug!(kind = ?kind, url = %completions_url, "resolved completion endpoint");
		Ok(ApiConfig { kind, completions_url, api_key, model_override, timeout })
	}

	pub fn api_key(&self) -> &str {
		&self.api_key
	}
}

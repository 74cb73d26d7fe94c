use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_derive::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::{ApiConfig, AuthStyle};
use crate::helpers;
use crate::runner::RunError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
	pub role: Role,
	pub content: String,
}

/// A system message followed by a user message, sent with temperature 0.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
	model: String,
	messages: [Message; 2],
	temperature: f64,
}

impl ChatRequest {
	pub fn new(model: &str, prompt: String, data: String) -> Self {
		ChatRequest {
			model: model.to_string(),
			messages: [
				Message { role: Role::System, content: prompt },
				Message { role: Role::User, content: data },
			],
			temperature: 0.0,
		}
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	pub fn messages(&self) -> &[Message; 2] {
		&self.messages
	}

	pub fn system(&self) -> &str {
		&self.messages[0].content
	}

	pub fn user(&self) -> &str {
		&self.messages[1].content
	}

	pub fn temperature(&self) -> f64 {
		self.temperature
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseMessage {
	pub role: String,
	pub content: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Choice {
	#[serde(default)]
	pub index: u32,
	pub message: ResponseMessage,
	#[serde(default)]
	pub logprobs: Option<serde_json::Value>,
	#[serde(default)]
	pub finish_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Usage {
	pub prompt_tokens: u64,
	pub completion_tokens: u64,
	pub total_tokens: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default)]
	pub model: Option<String>,
	#[serde(default)]
	pub choices: Vec<Choice>,
	#[serde(default)]
	pub usage: Option<Usage>,
}

/// Anything that can turn a chat request into a chat response.
#[async_trait]
pub trait CompletionService: Send + Sync {
	async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, RunError>;
}

#[derive(Deserialize)]
struct ErrorBody {
	error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
	message: String,
}

fn error_message(body: &str) -> String {
	match serde_json::from_str::<ErrorBody>(body) {
		Ok(parsed) => parsed.error.message,
		Err(_) => helpers::snippet(body, 200),
	}
}

/// Map an HTTP status and body onto a response or one of the run errors.
pub fn interpret_response(status: StatusCode, body: &str) -> Result<ChatResponse, RunError> {
	if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
		return Err(RunError::AuthenticationFailure(format!("service returned {}: {}", status, error_message(body))));
	}
	if !status.is_success() {
		return Err(RunError::UpstreamFailure(format!("service returned {}: {}", status, error_message(body))));
	}
	serde_json::from_str::<ChatResponse>(body)
		.map_err(|e| RunError::UpstreamFailure(format!("malformed response: {}", e)))
}

pub struct OpenAiClient {
	config: ApiConfig,
	client: reqwest::Client,
	/// When set, `last_request.json` and `last_response.json` are written here.
	pub dump_dir: Option<PathBuf>,
}

impl OpenAiClient {
	pub fn new(config: ApiConfig) -> Result<Self, RunError> {
		let mut builder = reqwest::Client::builder();
		if let Some(timeout) = config.timeout {
			builder = builder.timeout(timeout);
		}
		let client = builder
			.build()
			.map_err(|e| RunError::UpstreamFailure(format!("cannot build HTTP client: {}", e)))?;
		Ok(Self::with_client(config, client))
	}

	pub fn with_client(config: ApiConfig, client: reqwest::Client) -> Self {
		OpenAiClient { config, client, dump_dir: None }
	}

	fn dump(&self, name: &str, content: &str) -> Result<(), RunError> {
		if let Some(dir) = self.dump_dir.as_ref() {
			let path = dir.join(name);
			helpers::save_text(&path, content)?;
			debug!(path = %path.display(), "wrote debug dump");
		}
		Ok(())
	}
}

#[async_trait]
impl CompletionService for OpenAiClient {
	async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, RunError> {
		let serialised = serde_json::to_string_pretty(request)
			.map_err(|e| RunError::UpstreamFailure(format!("cannot encode request: {}", e)))?;
		self.dump("last_request.json", &serialised)?;
		let req = self.client
			.post(self.config.completions_url.clone())
			.header(CONTENT_TYPE, "application/json");
		let req = match self.config.kind.auth_style() {
			AuthStyle::ApiKeyHeader => req.header("api-key", self.config.api_key()),
			AuthStyle::Bearer => req.bearer_auth(self.config.api_key()),
		};
		let resp = req
			.body(serialised)
			.send()
			.await
			.map_err(|e| RunError::UpstreamFailure(format!("request failed: {}", e)))?;
		let status = resp.status();
		let body = resp
			.text()
			.await
			.map_err(|e| RunError::UpstreamFailure(format!("cannot read response body: {}", e)))?;
		info!(status = %status, bytes = body.len(), "completion service replied");
		self.dump("last_response.json", &body)?;
		let response = interpret_response(status, &body)?;
		if let Some(usage) = response.usage.as_ref() {
			debug!(prompt_tokens = usage.prompt_tokens, completion_tokens = usage.completion_tokens, "token usage");
		}
		Ok(response)
	}
}

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::helpers::{self, HelperError, InputProblem};
use crate::openaiapi::{ChatRequest, ChatResponse, Choice, CompletionService};

pub const DEFAULT_PROMPT_PATH: &str = "openai/prompt.txt";
pub const DEFAULT_DATA_PATH: &str = "openai/data.txt";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Error)]
pub enum RunError {
	#[error("input unavailable: {path}: {problem}", path = path.display())]
	InputUnavailable {
		path: PathBuf,
		#[source]
		problem: InputProblem,
	},
	#[error("authentication failure: {0}")]
	AuthenticationFailure(String),
	#[error("upstream failure: {0}")]
	UpstreamFailure(String),
	#[error("the completion service returned no choices")]
	EmptyResponse,
	#[error("cannot write output: {0}")]
	Output(#[from] io::Error),
	#[error("cannot write debug dump: {0}")]
	Dump(#[from] HelperError),
}

#[derive(Debug, Clone)]
pub struct RunSettings {
	pub prompt_path: PathBuf,
	pub data_path: PathBuf,
	pub model: String,
}

impl Default for RunSettings {
	fn default() -> Self {
		RunSettings {
			prompt_path: PathBuf::from(DEFAULT_PROMPT_PATH),
			data_path: PathBuf::from(DEFAULT_DATA_PATH),
			model: DEFAULT_MODEL.to_string(),
		}
	}
}

fn load_input(path: &Path) -> Result<String, RunError> {
	let text = helpers::read_text(path).map_err(|problem| RunError::InputUnavailable {
		path: path.to_path_buf(),
		problem,
	})?;
	debug!(path = %path.display(), bytes = text.len(), "loaded input");
	Ok(text)
}

/// Read both inputs and build the request. Nothing touches the network here.
pub fn prepare_request(settings: &RunSettings) -> Result<ChatRequest, RunError> {
	let prompt = load_input(&settings.prompt_path)?;
	let data = load_input(&settings.data_path)?;
	Ok(ChatRequest::new(&settings.model, prompt, data))
}

/// Write the request that would be sent, without calling anything.
pub fn preview<W: Write>(settings: &RunSettings, out: &mut W) -> Result<(), RunError> {
	let request = prepare_request(settings)?;
	serde_json::to_writer_pretty(&mut *out, &request).map_err(io::Error::from)?;
	writeln!(out)?;
	out.flush()?;
	Ok(())
}

pub fn first_choice(response: ChatResponse) -> Result<Choice, RunError> {
	debug!(choices = response.choices.len(), "received response");
	response.choices.into_iter().next().ok_or(RunError::EmptyResponse)
}

pub fn render_choice<W: Write>(choice: &Choice, out: &mut W) -> Result<(), RunError> {
	serde_json::to_writer_pretty(&mut *out, choice).map_err(io::Error::from)?;
	writeln!(out)?;
	out.flush()?;
	Ok(())
}

/// One enrichment pass: read prompt and data, ask the service, print the first choice.
pub async fn run<S, W>(service: &S, settings: &RunSettings, out: &mut W) -> Result<(), RunError>
where
	S: CompletionService + ?Sized,
	W: Write,
{
	let request = prepare_request(settings)?;
	info!(
		model = %request.model(),
		temperature = request.temperature(),
		system_bytes = request.system().len(),
		user_bytes = request.user().len(),
		"sending chat completion request"
	);
	let response = service.complete(&request).await?;
	let choice = first_choice(response)?;
	render_choice(&choice, out)
}

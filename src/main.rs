use clap::Parser;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod helpers;
mod openaiapi;
mod runner;


use config::ApiConfig;
use runner::{RunError, RunSettings};

/// Send a system prompt and a batch of data to a chat completion model and
/// print the first choice.
#[derive(Parser)]
struct Cli {
	#[clap(long, default_value = runner::DEFAULT_PROMPT_PATH)]
	/// file holding the system instructions
	prompt: PathBuf,
	#[clap(long, default_value = runner::DEFAULT_DATA_PATH)]
	/// file holding the new data to enrich
	data: PathBuf,
	#[clap(long)]
	/// model name (default gpt-3.5-turbo, or OAICOMPAT_MODEL_NAME when set)
	model: Option<String>,
	#[clap(long, default_value = "false")]
	/// write last_request.json and last_response.json to the current directory
	write_req_resp: bool,
	#[clap(long, default_value = "false")]
	/// print the request that would be sent, do not perform an API call
	no_network: bool,
	#[clap(long, short)]
	verbose: bool,
}

/// Load `.env` and settle the log filter. Runs before the subscriber exists,
/// so the dotenv outcome is handed back to be logged afterwards.
fn load_environment(dotenv_path: Option<&Path>, verbose: bool) -> (String, Result<PathBuf, dotenvy::Error>) {
	let loaded = match dotenv_path {
		Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
		None => dotenvy::dotenv(),
	};
	let directive = if verbose {
		"debug".to_string()
	} else {
		env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "warn".to_string())
	};
	(directive, loaded)
}

fn init_logging(directive: &str) {
	let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.init();
}

fn report_dotenv(loaded: &Result<PathBuf, dotenvy::Error>) {
	match loaded {
		Ok(path) => debug!(path = %path.display(), "loaded environment file"),
		Err(err) if err.not_found() => {},
		Err(err) => warn!(error = %err, "could not load .env file"),
	}
}

/// The preview needs no credential; a broken configuration only costs the model override.
fn preview_config(config: Result<ApiConfig, RunError>) -> Option<ApiConfig> {
	match config {
		Ok(config) => Some(config),
		Err(err) => {
			debug!(error = %err, "no usable endpoint configuration, using the default model");
			None
		},
	}
}

fn pick_model(flag: Option<String>, config: Option<&ApiConfig>) -> String {
	flag
		.or_else(|| config.and_then(|c| c.model_override.clone()))
		.unwrap_or_else(|| runner::DEFAULT_MODEL.to_string())
}

async fn execute(args: Cli) -> Result<(), RunError> {
	let mut settings = RunSettings {
		prompt_path: args.prompt,
		data_path: args.data,
		model: runner::DEFAULT_MODEL.to_string(),
	};

	if args.no_network {
		let config = preview_config(ApiConfig::from_env());
		settings.model = pick_model(args.model, config.as_ref());
		let stdout = io::stdout();
		let mut out = stdout.lock();
		return runner::preview(&settings, &mut out);
	}

	let config = ApiConfig::from_env()?;
	settings.model = pick_model(args.model, Some(&config));
	let mut client = openaiapi::OpenAiClient::new(config)?;
	if args.write_req_resp {
		client.dump_dir = Some(PathBuf::from("."));
	}

	let stdout = io::stdout();
	let mut out = stdout.lock();
	runner::run(&client, &settings, &mut out).await
}

#[tokio::main]
async fn main() -> ExitCode {
	let args = Cli::parse();
	let (directive, dotenv) = load_environment(None, args.verbose);
	init_logging(&directive);
	report_dotenv(&dotenv);

	match execute(args).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("operation failed: {}", e);
			ExitCode::FAILURE
		},
	}
}

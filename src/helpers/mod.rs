use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelperError {
	#[error("IO error: {0}")]
	Io(#[from] io::Error),
}

/// Why an input file could not be used.
#[derive(Debug, Error)]
pub enum InputProblem {
	#[error("{0}")]
	Io(#[from] io::Error),
	#[error("file is empty")]
	Empty,
}

/// Read a whole text file, rejecting files with nothing but whitespace in them.
pub fn read_text(file_path: impl AsRef<Path>) -> Result<String, InputProblem> {
	// fs::read_to_string drops the handle before returning, on every path
	let content = fs::read_to_string(file_path.as_ref())?;
	if content.trim().is_empty() {
		return Err(InputProblem::Empty);
	}
	Ok(content)
}

pub fn save_text(file_path: impl AsRef<Path>, content: &str) -> Result<(), HelperError> {
	let mut file = OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.open(file_path.as_ref())?;
	writeln!(file, "{}", content)?;
	Ok(())
}

/// Shorten a response body for an error message.
pub fn snippet(text: &str, max_chars: usize) -> String {
	let mut chars = text.trim().chars();
	let mut out: String = chars.by_ref().take(max_chars).collect();
	if chars.next().is_some() {
		out.push_str("...");
	}
	out
}

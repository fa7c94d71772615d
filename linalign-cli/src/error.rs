//! Error handling for the linalign CLI

use std::path::PathBuf;
use thiserror::Error;

/// User-facing failures of the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Parsing error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn parse<S: Into<String>>(file: S, message: S) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }
}

/// Error message with hints for the common mistakes.
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Compressed inputs must end in .gz",
                path.display()
            ));
        }
        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your linalign.toml configuration file\n\
                 • Use 'linalign config' to print a sample configuration",
            );
        }
        CliError::Validation { .. } => {
            message.push_str("\n\nSuggestions:\n• Anchors are written QUERY:TARGET with 1-based positions, e.g. --anchor 12:15");
        }
        CliError::Parse { .. } => {}
    }

    message
}

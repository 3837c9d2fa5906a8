use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for pcb-msla operations
#[derive(Error, Diagnostic, Debug)]
pub enum PcbError {
    #[error("Configuration error: {message}")]
    #[diagnostic(code(pcb_msla::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Input not found: {}", path.display())]
    #[diagnostic(
        code(pcb_msla::input),
        help("Check the path; Gerber files usually end in .gbr and drill files in .drl")
    )]
    InputNotFound { path: PathBuf },

    #[error("Parse error: {message}")]
    #[diagnostic(code(pcb_msla::parse))]
    Parse {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("IO error: {0}")]
    #[diagnostic(code(pcb_msla::io))]
    IoError(#[from] std::io::Error),

    #[error("IO error with {}: {message}", path.display())]
    #[diagnostic(code(pcb_msla::io))]
    Io { path: PathBuf, message: String },
}

impl PcbError {
    /// Shorthand for a configuration error without help text.
    pub fn config(message: impl Into<String>) -> Self {
        PcbError::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Shorthand for a parse error without help text.
    pub fn parse(message: impl Into<String>) -> Self {
        PcbError::Parse {
            message: message.into(),
            help: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PcbError>;

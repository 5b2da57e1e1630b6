use std::{error::Error, fmt::Display};

/// Errors of the terminal UI.
#[derive(Debug)]
pub enum GuiError {
    /// The terminal could not be set up, drawn on or read from.
    IOError(std::io::Error),
}

impl Display for GuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuiError::IOError(e) => write!(f, "terminal error: {}", e),
        }
    }
}

impl Error for GuiError {}

impl From<std::io::Error> for GuiError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidTitle(String),
    InvalidFieldPath(String),
    InvalidServerConfig(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidTitle(msg) => write!(f, "invalid title: {msg}"),
            ModelError::InvalidFieldPath(path) => {
                write!(f, "invalid field path: {path}")
            }
            ModelError::InvalidServerConfig(msg) => {
                write!(f, "invalid server config: {msg}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;

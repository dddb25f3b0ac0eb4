//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("invalid configuration: {}", format_errors(.0))]
    Validation(Vec<ConfigError>),
}

impl ConfigError {
    /// Every individual problem, flattening nested validation errors.
    pub fn errors(&self) -> Vec<&ConfigError> {
        match self {
            ConfigError::Validation(errors) => errors.iter().flat_map(|e| e.errors()).collect(),
            other => vec![other],
        }
    }

    /// Names of the offending environment variables.
    pub fn fields(&self) -> Vec<&str> {
        self.errors()
            .into_iter()
            .filter_map(|e| match e {
                ConfigError::MissingField(field) => Some(field.as_str()),
                ConfigError::InvalidValue { field, .. } => Some(field.as_str()),
                ConfigError::Validation(_) => None,
            })
            .collect()
    }
}

fn format_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Converts a stored signed counter into the unsigned domain value.
pub fn non_negative(field: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::invalid(format!("{field} must be non-negative, got {value}")))
}

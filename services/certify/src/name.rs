//! Certificate subject names.

use thiserror::Error;

/// Longest accepted name, in characters.
pub const MAX_NAME_CHARS: usize = 120;

/// Why a submitted name was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name cannot exceed {MAX_NAME_CHARS} characters")]
    TooLong,

    #[error("name cannot contain control characters")]
    ControlCharacter,
}

/// A validated subject name.
///
/// Surrounding whitespace is trimmed on parse. The value is plain text; it
/// must still be escaped when written into HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateName(String);

impl CertificateName {
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NameError::Empty);
        }
        if trimmed.chars().count() > MAX_NAME_CHARS {
            return Err(NameError::TooLong);
        }
        if trimmed.chars().any(char::is_control) {
            return Err(NameError::ControlCharacter);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CertificateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

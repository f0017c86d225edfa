use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("content is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("failed to parse structured document: {message}")]
    Parse { message: String },

    #[error("failed to serialize key '{key}': {message}")]
    Serialize { key: String, message: String },

    #[error("invalid key path '{input}': {message}")]
    InvalidKeyPath { input: String, message: String },
}

impl PatchError {
    pub fn is_parse(&self) -> bool {
        matches!(self, PatchError::Parse { .. })
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("Invalid spring parameters: {0}")]
    InvalidSpring(String),

    #[error("Invalid reveal options: {0}")]
    InvalidReveal(String),

    #[error("Invalid observation window: {0}")]
    InvalidWindow(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Unknown element: {0}")]
    UnknownElement(String),

    #[error("Scene error: {0}")]
    Scene(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors raised while validating a registration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidMapping(_)
                | Error::InvalidSpring(_)
                | Error::InvalidReveal(_)
                | Error::InvalidWindow(_)
                | Error::DuplicateId(_)
                | Error::UnknownElement(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Server-side misconfiguration. Every request fails until it is fixed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot map subject to a known user: {0}")]
    UnmappedSubject(String),

    #[error("Failed to apply subscription transition: {0}")]
    Transition(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Configuration(_) => ErrorCode::ConfigurationError,
            AppError::Unauthorized => ErrorCode::Unauthorized,
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::UnmappedSubject(_) => ErrorCode::UnmappedSubject,
            AppError::Transition(_) => ErrorCode::TransitionError,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    ConfigurationError,
    Unauthorized,
    InvalidInput,
    UnmappedSubject,
    TransitionError,
    DatabaseError,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::UnmappedSubject => "UNMAPPED_SUBJECT",
            ErrorCode::TransitionError => "TRANSITION_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

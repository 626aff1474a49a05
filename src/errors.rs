use rocket::http::Status;
use thiserror::Error;

pub type BlogResult<T> = Result<T, BlogError>;

/// Failure taxonomy shared by every mutating store operation.
#[derive(Debug, Error)]
pub enum BlogError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Authorization error: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlogError {
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::Forbidden(_) => Status::Forbidden,
            Self::Conflict(_) => Status::Conflict,
            Self::Database(_) | Self::Pool(_) | Self::Io(_) => Status::InternalServerError,
        }
    }

    /// Unique-constraint failures surface from SQLite as a generic failure;
    /// callers that race on inserts need to tell them apart.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

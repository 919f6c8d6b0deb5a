use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the failure came from the storage layer (delivery records,
    /// app/webhook registry). These abort a webhook call before dispatch.
    pub fn is_storage(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Pool(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

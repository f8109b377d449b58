//! Common infrastructure: unified errors, result alias, logging

pub mod error;
pub mod logger;

pub use error::{AppError, AppResponse, ok};
pub use logger::init_logger_with_file;

/// Application-level Result type
///
/// Used in HTTP handlers and application logic
pub type AppResult<T> = Result<T, AppError>;

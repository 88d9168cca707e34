pub mod analysis;
pub mod careers;
pub mod health;
pub mod models;
pub mod profile;
pub mod questions;
pub mod recommendations;

use tokio::task::JoinError;

use crate::error::ApiError;

pub(crate) fn join_error(err: JoinError) -> ApiError {
    ApiError::Internal(format!("background task failed: {err}"))
}

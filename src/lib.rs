pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod storage;
pub mod utils;

pub use error::{ApiError, Result};

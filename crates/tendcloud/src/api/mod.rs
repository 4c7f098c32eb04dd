//! API route handlers

pub mod error;
pub mod passes;
pub mod system;

pub use error::ApiError;

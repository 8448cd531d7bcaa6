//! Shared utilities that glue the different domains together.
pub mod buf;
pub mod config;
pub mod error;
pub mod log;

pub use error::{BftCode, BftError, BftResult};

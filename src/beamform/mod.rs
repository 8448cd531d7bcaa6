//! Beam construction over all focus lines.

pub mod service;

pub use service::Transmit;

//! Session state and lifecycle.
//!
//! A [`BeamformingSession`] is an explicit object; the C boundary keeps a
//! single process-wide instance.

pub mod domain;
pub mod service;

pub use domain::{Parameter, SessionState, SystemParameters};
pub use service::BeamformingSession;
